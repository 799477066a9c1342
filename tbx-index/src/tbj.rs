//! Persisted, coordinate-enriched tabix index (`.tbj`).
//!
//! A JSON document holding the tabix header, every reference with its bins,
//! chunks and linear index, each offset annotated with the block it points
//! into. Written pretty-printed, optionally gzip-compressed.
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use tbx_core::consts::{GZIP_MAGIC, TBJ_FORMAT_NAME, TBJ_FORMAT_VER};
use tbx_core::models::{Header, Reference};
use tbx_core::utils::get_dynamic_reader;
use tbx_core::{Result, TabixError};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabixIndex {
    #[serde(flatten)]
    pub header: Header,
    pub refs: Vec<Reference>,
    pub n_no_coor: Option<u64>,
    #[serde(rename = "__format_name__", default)]
    pub format_name: String,
    #[serde(rename = "__format_ver__", default)]
    pub format_ver: u32,
}

impl TabixIndex {
    pub fn new(header: Header, refs: Vec<Reference>, n_no_coor: Option<u64>) -> Self {
        Self {
            header,
            refs,
            n_no_coor,
            format_name: TBJ_FORMAT_NAME.to_string(),
            format_ver: TBJ_FORMAT_VER,
        }
    }

    pub fn chromosomes(&self) -> &[String] {
        &self.header.names
    }

    pub fn reference(&self, chrom: &str) -> Option<&Reference> {
        self.refs.iter().find(|r| r.ref_name == chrom)
    }

    /// Column count of the first reference with resolved blocks.
    pub fn num_columns(&self) -> Option<usize> {
        self.refs.iter().find_map(Reference::num_cols)
    }

    /// True when the offsets carry block metadata, i.e. the data file was
    /// present when the index was decoded.
    pub fn has_blocks(&self) -> bool {
        self.refs
            .iter()
            .flat_map(|r| r.intvs.iter())
            .any(|o| o.block.is_some())
    }

    fn check_format(&self) -> Result<()> {
        if self.format_name != TBJ_FORMAT_NAME {
            return Err(TabixError::Format(format!(
                "format name {:?}, expected {TBJ_FORMAT_NAME:?}",
                self.format_name
            )));
        }
        if self.format_ver != TBJ_FORMAT_VER {
            return Err(TabixError::Format(format!(
                "format version {}, expected {TBJ_FORMAT_VER}",
                self.format_ver
            )));
        }
        Ok(())
    }
}

///
/// Write the index as JSON, refreshing its format tags first.
///
/// # Arguments
///
/// - index: the index to write
/// - path: output file, usually `<data>.tbj`
/// - compress: gzip the document
///
pub fn save_tbj<P: AsRef<Path>>(index: &mut TabixIndex, path: P, compress: bool) -> Result<()> {
    let path = path.as_ref();
    index.format_name = TBJ_FORMAT_NAME.to_string();
    index.format_ver = TBJ_FORMAT_VER;

    info!("saving {}", path.display());
    let file = BufWriter::new(File::create(path)?);

    if compress {
        debug!("compressing");
        let mut encoder = GzEncoder::new(file, Compression::default());
        serde_json::to_writer_pretty(&mut encoder, index)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        serde_json::to_writer_pretty(&mut file, index)?;
        file.flush()?;
    }

    Ok(())
}

///
/// Load a `.tbj` written by [`save_tbj`], compressed or not.
///
pub fn load_tbj<P: AsRef<Path>>(path: P) -> Result<TabixIndex> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    let mut first = [0u8; 2];
    let n = file.read(&mut first)?;
    drop(file);

    let compressed = match &first[..n] {
        [b'{', ..] => false,
        magic if magic == GZIP_MAGIC => true,
        other => {
            return Err(TabixError::Format(format!(
                "{} is neither JSON nor gzip, starts with {other:02x?}",
                path.display()
            )));
        }
    };

    info!(
        "loading {} as {}",
        path.display(),
        if compressed { "compressed json" } else { "json" }
    );

    let index: TabixIndex = serde_json::from_reader(get_dynamic_reader(path)?)?;

    index.check_format()?;
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};
    use tbx_core::models::{Bin, BlockInfo, Chunk, ResolvedOffset, TabixFormat, VirtualOffset};

    #[fixture]
    fn index() -> TabixIndex {
        let block = BlockInfo {
            block_len: Some(4000),
            block_size: 65280,
            bin_pos: Some(190),
            first_pos: Some(190),
            last_pos: Some(9000),
            chrom: None,
            num_cols: 10,
            num_rows: 300,
        };
        let begin = ResolvedOffset::new(VirtualOffset::new(0, 12), Some(block.clone())).with_chunk(0, 0);
        let end = ResolvedOffset::new(VirtualOffset::new(4000, 80), Some(block.clone())).with_chunk(0, 0);

        let mut reference = Reference::new(0, "SL2.50ch00".to_string());
        reference.bins.push(Bin {
            bin_n: 0,
            bin: 4681,
            chunks: vec![Chunk { begin: begin.clone(), end: end.clone() }],
        });
        reference.bins_begin = Some(begin.clone());
        reference.bins_end = Some(end.clone());
        reference.first_block = Some(begin.clone());
        reference.last_block = Some(end);
        reference.intvs = vec![begin];

        let header = Header {
            n_ref: 1,
            format: TabixFormat::Vcf,
            col_seq: 1,
            col_beg: 2,
            col_end: 0,
            meta: '#',
            skip: 0,
            l_nm: 11,
            names: vec!["SL2.50ch00".to_string()],
        };

        TabixIndex::new(header, vec![reference], None)
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_save_load_round_trip(mut index: TabixIndex, #[case] compress: bool) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("calls.vcf.gz.tbj");

        save_tbj(&mut index, &path, compress).unwrap();
        let loaded = load_tbj(&path).unwrap();

        assert_eq!(loaded, index);
        assert_eq!(loaded.num_columns(), Some(10));
        assert!(loaded.has_blocks());
    }

    #[rstest]
    fn test_json_layout(mut index: TabixIndex) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("calls.vcf.gz.tbj");
        save_tbj(&mut index, &path, false).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["__format_name__"], "TBJ");
        assert_eq!(value["__format_ver__"], 5);
        assert_eq!(value["format"], 2);
        assert_eq!(value["meta"], "#");
        assert_eq!(value["names"][0], "SL2.50ch00");
        assert!(value["n_no_coor"].is_null());
        assert_eq!(value["refs"][0]["intvs"][0]["real"], 0);
        assert_eq!(value["refs"][0]["intvs"][0]["bytes"], 12);
    }

    #[rstest]
    fn test_load_rejects_other_version(mut index: TabixIndex) {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("calls.vcf.gz.tbj");
        save_tbj(&mut index, &path, false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap().replace("\"__format_ver__\": 5", "\"__format_ver__\": 4");
        std::fs::write(&path, text).unwrap();

        assert!(matches!(load_tbj(&path), Err(TabixError::Format(_))));
    }

    #[rstest]
    fn test_load_rejects_binary() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("calls.vcf.gz.tbj");
        std::fs::write(&path, b"TBI\x01").unwrap();

        assert!(matches!(load_tbj(&path), Err(TabixError::Format(_))));
    }
}
