use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;

use crate::consts::{GZIP_MAGIC, TABIX_EXTENSION, TBJ_EXTENSION, TBK_EXTENSION};
use crate::errors::Result;
use crate::models::IndexFormat;

///
/// Paths of a data file and of every index derived from it.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub data: PathBuf,
    pub tbi: PathBuf,
    pub tbj: PathBuf,
    pub tbk: PathBuf,
}

impl IndexPaths {
    pub fn index(&self, format: IndexFormat) -> &Path {
        match format {
            IndexFormat::Tbj => &self.tbj,
            IndexFormat::Tbk => &self.tbk,
        }
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

///
/// Get the data file and index file names for a path that names either the
/// data file itself or one of its indexes.
///
/// # Arguments
///
/// - path: `X.vcf.gz`, `X.vcf.gz.tbi`, `X.vcf.gz.tbj` or `X.vcf.gz.tbk`
///
pub fn get_filenames<P: AsRef<Path>>(path: P) -> IndexPaths {
    let path = path.as_ref();
    let as_str = path.to_string_lossy();

    let data = [TABIX_EXTENSION, TBJ_EXTENSION, TBK_EXTENSION]
        .iter()
        .find_map(|ext| as_str.strip_suffix(ext))
        .map(PathBuf::from)
        .unwrap_or_else(|| path.to_path_buf());

    IndexPaths {
        tbi: with_suffix(&data, TABIX_EXTENSION),
        tbj: with_suffix(&data, TBJ_EXTENSION),
        tbk: with_suffix(&data, TBK_EXTENSION),
        data,
    }
}

/// Check the first two bytes of a file for the gzip magic.
pub fn is_gzipped<P: AsRef<Path>>(path: P) -> Result<bool> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 2];
    let n = file.read(&mut magic)?;
    Ok(n == 2 && &magic == GZIP_MAGIC)
}

///
/// Get a reader for either a gzip'd (including BGZF) or plain file. The
/// decision is made on the magic bytes, not the extension.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let gzipped = is_gzipped(path)?;
    let file = File::open(path)?;

    let reader: Box<dyn BufRead> = match gzipped {
        true => Box::new(BufReader::new(MultiGzDecoder::new(file))),
        false => Box::new(BufReader::new(file)),
    };

    Ok(reader)
}
