#![allow(dead_code)]
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tbx_core::bins::reg2bin;
use tbx_core::consts::{TABIX_MAGIC, TABIX_PSEUDO_BIN};
use tbx_core::models::VirtualOffset;
use tbx_io::bgzf::BgzfWriter;

pub const CHROMS: [&str; 3] = ["SL2.50ch00", "SL2.50ch01", "SL2.50ch02"];

/// Uncompressed bytes per BGZF block of the fixture, small enough for rows
/// to straddle many block boundaries.
pub const FIXTURE_BLOCK: usize = 4096;

const LINEAR_SHIFT: u64 = 14;

pub struct Record {
    pub chrom: usize,
    pub pos: u64,
    pub start: VirtualOffset,
    pub end: VirtualOffset,
}

/// Positions of the fixture rows, per sequence.
pub fn positions() -> Vec<Vec<u64>> {
    let mut ch00: Vec<u64> = (0..2292).map(|k| 280 + k * 600).collect();
    ch00.extend([1_375_671, 1_375_685]);
    ch00.extend((0..855).map(|k| 1_375_686 + k * 19));
    ch00.extend([1_392_519, 1_392_520]);
    ch00.extend((0..259).map(|k| 1_392_521 + k * 12));
    ch00.extend([1_395_632, 1_395_638]);

    let mut ch01 = vec![190, 286];
    ch01.extend((0..200).map(|k| 300 + k * 50));

    let ch02 = (0..300).map(|k| 1_000 + k * 100).collect();

    vec![ch00, ch01, ch02]
}

pub fn row(chrom: &str, pos: u64) -> String {
    format!(
        "{chrom}\t{pos}\t.\tA\tT\t{}\tPASS\tDP={};AF=0.5\tGT:DP\t0/1:{}\n",
        pos % 60,
        pos % 997,
        pos % 31
    )
}

fn header() -> String {
    let mut text = String::from("##fileformat=VCFv4.2\n");
    for chrom in CHROMS {
        text.push_str(&format!("##contig=<ID={chrom}>\n"));
    }
    text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tsample\n");
    text
}

///
/// Write the fixture as BGZF, returning every record with its virtual offsets.
///
pub fn write_data(path: &Path) -> Vec<Record> {
    let mut writer = BgzfWriter::with_block_size(File::create(path).unwrap(), FIXTURE_BLOCK);
    writer.write_all(header().as_bytes()).unwrap();

    let mut records = Vec::new();
    for (chrom, positions) in positions().into_iter().enumerate() {
        for pos in positions {
            let start = writer.virtual_offset();
            writer.write_all(row(CHROMS[chrom], pos).as_bytes()).unwrap();
            let end = writer.virtual_offset();
            records.push(Record { chrom, pos, start, end });
        }
    }

    writer.finish().unwrap();
    records
}

fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u64(out: &mut Vec<u8>, v: u64) {
    out.extend_from_slice(&v.to_le_bytes());
}

///
/// Build the `.tbi` bytes (before compression) for `records`, the way
/// htslib lays them out: merged chunks per bin, a pseudo-bin per
/// reference and a 16 KiB linear index.
///
pub fn tbi_bytes(records: &[Record]) -> Vec<u8> {
    let mut names = Vec::new();
    for chrom in CHROMS {
        names.extend_from_slice(chrom.as_bytes());
        names.push(0);
    }

    let mut out = TABIX_MAGIC.to_vec();
    for v in [CHROMS.len() as i32, 2, 1, 2, 0, '#' as i32, 0, names.len() as i32] {
        put_i32(&mut out, v);
    }
    out.extend_from_slice(&names);

    for chrom in 0..CHROMS.len() {
        let recs: Vec<&Record> = records.iter().filter(|r| r.chrom == chrom).collect();

        let mut bins: BTreeMap<u32, Vec<(u64, u64)>> = BTreeMap::new();
        let mut linear: Vec<Option<u64>> = Vec::new();

        for r in &recs {
            let (beg, end) = (r.pos - 1, r.pos);
            let chunks = bins.entry(reg2bin(beg, end)).or_default();
            match chunks.last_mut() {
                Some(last) if last.1 == r.start.as_u64() => last.1 = r.end.as_u64(),
                _ => chunks.push((r.start.as_u64(), r.end.as_u64())),
            }

            let window = (beg >> LINEAR_SHIFT) as usize;
            if linear.len() <= window {
                linear.resize(window + 1, None);
            }
            linear[window].get_or_insert(r.start.as_u64());
        }

        let first = recs[0].start.as_u64();
        let last = recs[recs.len() - 1].end.as_u64();
        let mut prev = first;
        let linear: Vec<u64> = linear
            .into_iter()
            .map(|o| {
                prev = o.unwrap_or(prev);
                prev
            })
            .collect();

        put_i32(&mut out, bins.len() as i32 + 1);
        for (bin, chunks) in &bins {
            out.extend_from_slice(&bin.to_le_bytes());
            put_i32(&mut out, chunks.len() as i32);
            for (b, e) in chunks {
                put_u64(&mut out, *b);
                put_u64(&mut out, *e);
            }
        }

        // pseudo-bin: span of the reference, then mapped/unmapped counts
        out.extend_from_slice(&TABIX_PSEUDO_BIN.to_le_bytes());
        put_i32(&mut out, 2);
        put_u64(&mut out, first);
        put_u64(&mut out, last);
        put_u64(&mut out, recs.len() as u64);
        put_u64(&mut out, 0);

        put_i32(&mut out, linear.len() as i32);
        for offset in linear {
            put_u64(&mut out, offset);
        }
    }

    // n_no_coor
    put_u64(&mut out, 0);
    out
}

pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub data: PathBuf,
    pub records: Vec<Record>,
}

impl Fixture {
    pub fn tbi(&self) -> PathBuf {
        PathBuf::from(format!("{}.tbi", self.data.display()))
    }

    /// Expected positions of `chrom` in `[begin, end)`.
    pub fn expected(&self, chrom: usize, begin: Option<u64>, end: Option<u64>) -> Vec<u64> {
        self.records
            .iter()
            .filter(|r| r.chrom == chrom)
            .map(|r| r.pos)
            .filter(|&p| begin.is_none_or(|b| p >= b) && end.is_none_or(|e| p < e))
            .collect()
    }
}

/// Data file and its `.tbi` in a fresh temporary directory.
pub fn build_fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("annotated_tomato_150.SL2.50ch00-01-02.vcf.gz");
    let records = write_data(&data);

    let tbi = PathBuf::from(format!("{}.tbi", data.display()));
    let mut writer = BgzfWriter::new(File::create(&tbi).unwrap());
    writer.write_all(&tbi_bytes(&records)).unwrap();
    writer.finish().unwrap();

    Fixture { dir, data, records }
}
