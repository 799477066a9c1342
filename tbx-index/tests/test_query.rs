mod common;

use std::fs;

use pretty_assertions::assert_eq;
use rstest::*;

use tbx_core::TabixError;
use tbx_core::models::IndexFormat;
use tbx_index::tabix::LoadedIndex;
use tbx_index::{Tabix, load_tbj, load_tbk, read_tabix};
use tbx_io::stream::Row;

use common::{CHROMS, Fixture, build_fixture};

#[fixture]
#[once]
fn shared() -> Fixture {
    build_fixture()
}

fn query(tabix: &Tabix, chrom: usize, begin: Option<u64>, end: Option<u64>) -> Vec<Row> {
    tabix
        .iter_range(CHROMS[chrom], begin, end, false)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn positions(rows: &[Row]) -> Vec<u64> {
    rows.iter().map(|r| r.position().unwrap()).collect()
}

#[rstest]
#[case(0, Some(1_375_671), None, Some((1_375_671, 1_395_638)), 1_120)]
#[case(0, Some(1_375_672), None, Some((1_375_685, 1_395_638)), 1_119)]
#[case(0, Some(1_392_519), None, Some((1_392_519, 1_395_638)), 263)]
#[case(0, Some(1_392_520), None, Some((1_392_520, 1_395_638)), 262)]
#[case(0, Some(1_395_638), None, Some((1_395_638, 1_395_638)), 1)]
#[case(0, Some(1_392_520), Some(1_395_638), Some((1_392_520, 1_395_632)), 261)]
#[case(0, Some(1_395_639), None, None, 0)]
#[case(1, Some(189), Some(189), None, 0)]
#[case(1, Some(190), Some(285), Some((190, 190)), 1)]
#[case(1, Some(190), Some(286), Some((190, 190)), 1)]
#[case(1, Some(190), Some(287), Some((190, 286)), 2)]
fn test_query_vectors(
    shared: &Fixture,
    #[values(IndexFormat::Tbj, IndexFormat::Tbk)] format: IndexFormat,
    #[case] chrom: usize,
    #[case] begin: Option<u64>,
    #[case] end: Option<u64>,
    #[case] bounds: Option<(u64, u64)>,
    #[case] count: usize,
) {
    let tabix = Tabix::open(&shared.data, format).unwrap();
    let found = positions(&query(&tabix, chrom, begin, end));

    assert_eq!(found.len(), count);
    assert_eq!(found.first().copied().zip(found.last().copied()), bounds);
    assert_eq!(found, shared.expected(chrom, begin, end));
}

#[rstest]
#[case(0, None, None)]
#[case(0, Some(280), Some(100_000))]
#[case(1, None, Some(5_000))]
#[case(1, Some(9_000), None)]
#[case(2, None, None)]
#[case(2, Some(15_050), Some(15_350))]
fn test_formats_agree(
    shared: &Fixture,
    #[case] chrom: usize,
    #[case] begin: Option<u64>,
    #[case] end: Option<u64>,
) {
    let tbj = Tabix::open(&shared.data, IndexFormat::Tbj).unwrap();
    let tbk = Tabix::open(&shared.data, IndexFormat::Tbk).unwrap();

    let expected = shared.expected(chrom, begin, end);
    assert_eq!(positions(&query(&tbj, chrom, begin, end)), expected);
    assert_eq!(positions(&query(&tbk, chrom, begin, end)), expected);
}

#[rstest]
fn test_rows_as_lines(shared: &Fixture) {
    let tabix = Tabix::open(&shared.data, IndexFormat::Tbj).unwrap();

    let lines: Vec<Row> = tabix
        .iter_range(CHROMS[1], Some(190), Some(287), true)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(
        lines,
        vec![
            Row::Line(common::row(CHROMS[1], 190).trim_end().to_string()),
            Row::Line(common::row(CHROMS[1], 286).trim_end().to_string()),
        ]
    );

    let fields = query(&tabix, 1, Some(190), Some(191));
    assert_eq!(fields[0].fields().len(), 10);
    assert_eq!(fields[0].chrom(), Some(CHROMS[1]));
}

#[rstest]
fn test_chromosomes_and_columns(shared: &Fixture, #[values(IndexFormat::Tbj, IndexFormat::Tbk)] format: IndexFormat) {
    let tabix = Tabix::open(&shared.data, format).unwrap();
    assert_eq!(tabix.chromosomes().unwrap(), CHROMS.map(String::from));
    assert_eq!(tabix.num_columns().unwrap(), 10);
}

#[rstest]
fn test_range_errors(shared: &Fixture, #[values(IndexFormat::Tbj, IndexFormat::Tbk)] format: IndexFormat) {
    let tabix = Tabix::open(&shared.data, format).unwrap();

    let unknown = tabix.iter_range("SL2.50ch12", None, None, false);
    assert!(matches!(unknown, Err(TabixError::Range(_))));

    let inverted = tabix.iter_range(CHROMS[0], Some(500), Some(100), false);
    assert!(matches!(inverted, Err(TabixError::Range(_))));
}

#[rstest]
fn test_not_loaded() {
    let tabix = Tabix::new("missing.vcf.gz", IndexFormat::Tbj);
    assert!(!tabix.is_loaded());
    assert!(matches!(tabix.chromosomes(), Err(TabixError::Unsupported(_))));
}

#[rstest]
fn test_early_close(shared: &Fixture) {
    let tabix = Tabix::open(&shared.data, IndexFormat::Tbk).unwrap();
    let mut iter = tabix.iter_range(CHROMS[0], None, None, false).unwrap();

    let taken: Vec<_> = iter.by_ref().take(3).collect::<Result<_, _>>().unwrap();
    assert_eq!(positions(&taken), vec![280, 880, 1_480]);

    iter.close();
    assert!(iter.is_closed());
    assert!(iter.next().is_none());
}

#[rstest]
fn test_tbi_structure(shared: &Fixture) {
    let index = read_tabix(shared.tbi()).unwrap();

    assert_eq!(index.chromosomes(), CHROMS.map(String::from));
    assert_eq!(index.n_no_coor, Some(0));
    assert_eq!(index.header.meta, '#');
    assert!(index.has_blocks());

    for reference in &index.refs {
        let pseudo: Vec<_> = reference.bins.iter().filter(|b| b.is_pseudo()).collect();
        assert_eq!(pseudo.len(), 1);
        assert!(pseudo[0].chunks.iter().all(|c| c.begin.block.is_none()));

        for bin in reference.bins.iter().filter(|b| !b.is_pseudo()) {
            assert!(bin.chunks.windows(2).all(|w| w[0].begin.real <= w[1].begin.real));
            assert!(bin.chunks.iter().all(|c| c.begin.virtual_offset() < c.end.virtual_offset()));
        }

        if let (Some(first), Some(last)) = (&reference.first_block, &reference.last_block) {
            assert!(first.real <= last.real);
        }
    }

    let ch00 = &index.refs[0];
    assert_eq!(ch00.first_block.as_ref().and_then(|o| o.first_pos()), Some(280));
    assert!(ch00.last_block.as_ref().and_then(|o| o.last_pos()).unwrap() > 1_394_000);
    assert!(ch00.last_block.as_ref().and_then(|o| o.last_pos()).unwrap() <= 1_395_638);
}

#[rstest]
fn test_create_and_reload(
    #[values(IndexFormat::Tbj, IndexFormat::Tbk)] format: IndexFormat,
    #[values(true, false)] compress: bool,
) {
    let fixture = build_fixture();

    let mut created = Tabix::new(&fixture.data, format);
    created.create(true, compress).unwrap();
    assert!(created.index_path().exists());

    let raw = fs::read(created.index_path()).unwrap();
    assert_eq!(raw.starts_with(b"\x1F\x8B"), compress);

    let reloaded = Tabix::open(&fixture.data, format).unwrap();
    assert_eq!(reloaded.index(), created.index());

    match format {
        IndexFormat::Tbj => assert_eq!(
            Some(&LoadedIndex::Tbj(load_tbj(created.index_path()).unwrap())),
            created.index()
        ),
        IndexFormat::Tbk => assert_eq!(
            Some(&LoadedIndex::Tbk(load_tbk(created.index_path()).unwrap())),
            created.index()
        ),
    }

    let found = positions(&query(&reloaded, 0, Some(1_392_520), Some(1_395_638)));
    assert_eq!(found.len(), 261);
}

#[rstest]
fn test_open_by_index_path() {
    let fixture = build_fixture();
    Tabix::new(&fixture.data, IndexFormat::Tbk).create(true, true).unwrap();

    let tbk = format!("{}.tbk", fixture.data.display());
    let tabix = Tabix::open(&tbk, IndexFormat::Tbk).unwrap();
    assert_eq!(tabix.data_path(), fixture.data.as_path());
    assert_eq!(positions(&query(&tabix, 1, Some(190), Some(287))), vec![190, 286]);
}

#[rstest]
fn test_existing_index_is_kept(#[values(IndexFormat::Tbj, IndexFormat::Tbk)] format: IndexFormat) {
    let fixture = build_fixture();
    let mut tabix = Tabix::new(&fixture.data, format);
    fs::write(tabix.index_path(), b"placeholder").unwrap();

    tabix.create(false, true).unwrap();
    assert_eq!(fs::read(tabix.index_path()).unwrap(), b"placeholder");

    tabix.create(true, false).unwrap();
    tabix.save(false, true).unwrap();
    assert_ne!(fs::read(tabix.index_path()).unwrap(), b"placeholder");
}

#[rstest]
fn test_tampered_tbk(#[values(true, false)] compress: bool) {
    let fixture = build_fixture();
    let mut tabix = Tabix::new(&fixture.data, IndexFormat::Tbk);
    tabix.create(true, false).unwrap();

    let path = tabix.index_path().to_path_buf();
    let mut bytes = fs::read(&path).unwrap();
    // last packed delta, ahead of the digest length, digest and trailer
    let at = bytes.len() - 28 - 8 - 64 - 1;
    bytes[at] = bytes[at].wrapping_add(1);

    if compress {
        use std::io::Write;
        let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&bytes).unwrap();
        bytes = encoder.finish().unwrap();
    }
    fs::write(&path, bytes).unwrap();

    assert!(matches!(load_tbk(&path), Err(TabixError::Integrity(_))));
    assert!(matches!(Tabix::open(&fixture.data, IndexFormat::Tbk), Err(TabixError::Integrity(_))));
}

#[rstest]
fn test_without_data_file() {
    let fixture = build_fixture();
    fs::remove_file(&fixture.data).unwrap();

    let index = read_tabix(fixture.tbi()).unwrap();
    assert!(!index.has_blocks());
    assert_eq!(index.refs[0].intvs.len(), 1_395_637 / 16_384 + 1);

    let tabix = Tabix::open(&fixture.data, IndexFormat::Tbj).unwrap();
    let res = tabix.iter_range(CHROMS[0], Some(1_375_671), None, false);
    assert!(matches!(res, Err(TabixError::Unsupported(_))));
}

#[rstest]
fn test_create_default_writes_compressed() {
    let fixture = build_fixture();
    let mut tabix = Tabix::new(&fixture.tbi(), IndexFormat::default());

    tabix.create_default().unwrap();
    assert_eq!(tabix.format(), IndexFormat::Tbj);
    assert!(fs::read(tabix.index_path()).unwrap().starts_with(b"\x1F\x8B"));
}
