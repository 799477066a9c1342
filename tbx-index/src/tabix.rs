//! The `Tabix` handle: load or build an index, persist it, query it.
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::{info, warn};

use tbx_core::consts::{DEFAULT_COMMENT_CHAR, TabixDefaults};
use tbx_core::models::IndexFormat;
use tbx_core::utils::{IndexPaths, get_filenames};
use tbx_core::{Result, TabixError};
use tbx_io::stream::{RangeIter, RangeQuery};

use crate::query::{tbj_start, tbk_start};
use crate::tbi::read_tabix;
use crate::tbj::{TabixIndex, load_tbj, save_tbj};
use crate::tbk::{CompactScan, load_tbk, save_tbk, scan_bgzf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedIndex {
    Tbj(TabixIndex),
    Tbk(CompactScan),
}

///
/// Index handle for one BGZF data file.
///
/// The handle starts empty; [`Tabix::load`] reads the persisted index or
/// builds it in memory, [`Tabix::create`] builds and writes it.
///
#[derive(Debug)]
pub struct Tabix {
    paths: IndexPaths,
    format: IndexFormat,
    index: Option<LoadedIndex>,
}

impl Tabix {
    ///
    /// # Arguments
    ///
    /// - path: the data file, or any of its `.tbi`, `.tbj`, `.tbk` files
    /// - format: which persisted index to work with
    ///
    pub fn new<P: AsRef<Path>>(path: P, format: IndexFormat) -> Self {
        Self {
            paths: get_filenames(path),
            format,
            index: None,
        }
    }

    /// Create a handle and load its index.
    pub fn open<P: AsRef<Path>>(path: P, format: IndexFormat) -> Result<Self> {
        let mut tabix = Self::new(path, format);
        tabix.load()?;
        Ok(tabix)
    }

    pub fn format(&self) -> IndexFormat {
        self.format
    }

    pub fn data_path(&self) -> &Path {
        &self.paths.data
    }

    pub fn index_path(&self) -> &Path {
        self.paths.index(self.format)
    }

    pub fn index(&self) -> Option<&LoadedIndex> {
        self.index.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.index.is_some()
    }

    ///
    /// Load the persisted index if it exists, otherwise build it in memory
    /// without writing it.
    ///
    pub fn load(&mut self) -> Result<()> {
        let index_path = self.index_path();
        let index = if index_path.exists() {
            match self.format {
                IndexFormat::Tbj => LoadedIndex::Tbj(load_tbj(index_path)?),
                IndexFormat::Tbk => LoadedIndex::Tbk(load_tbk(index_path)?),
            }
        } else {
            info!("{} does not exist, building in memory", index_path.display());
            self.build()?
        };
        self.index = Some(index);
        Ok(())
    }

    fn build(&self) -> Result<LoadedIndex> {
        match self.format {
            IndexFormat::Tbj => Ok(LoadedIndex::Tbj(read_tabix(&self.paths.data)?)),
            IndexFormat::Tbk => {
                info!("scanning {}", self.paths.data.display());
                let mut reader = BufReader::new(File::open(&self.paths.data)?);
                Ok(LoadedIndex::Tbk(scan_bgzf(&mut reader, DEFAULT_COMMENT_CHAR)?))
            }
        }
    }

    ///
    /// Build the index from the `.tbi` (TBJ) or a scan of the data file
    /// (TBK) and write it.
    ///
    /// # Arguments
    ///
    /// - overwrite: replace an existing index file
    /// - compress: gzip the index file
    ///
    pub fn create(&mut self, overwrite: bool, compress: bool) -> Result<()> {
        if self.index_path().exists() && !overwrite {
            info!("{} exists, keeping it", self.index_path().display());
            return Ok(());
        }
        self.index = Some(self.build()?);
        self.save(overwrite, compress)
    }

    /// [`Tabix::create`] with the default overwrite and compression policy.
    pub fn create_default(&mut self) -> Result<()> {
        self.create(TabixDefaults::OVERWRITE, TabixDefaults::COMPRESS)
    }

    ///
    /// Write the loaded index. Keeps an existing file unless `overwrite`.
    ///
    pub fn save(&mut self, overwrite: bool, compress: bool) -> Result<()> {
        let path = self.paths.index(self.format).to_path_buf();
        if path.exists() && !overwrite {
            warn!("{} exists and overwrite is off, not saving", path.display());
            return Ok(());
        }

        match self.index.as_mut() {
            Some(LoadedIndex::Tbj(index)) => save_tbj(index, &path, compress),
            Some(LoadedIndex::Tbk(scan)) => save_tbk(scan, &path, compress),
            None => Err(TabixError::Unsupported("no index loaded, nothing to save".to_string())),
        }
    }

    fn loaded(&self) -> Result<&LoadedIndex> {
        self.index
            .as_ref()
            .ok_or_else(|| TabixError::Unsupported("index not loaded, call load() first".to_string()))
    }

    pub fn chromosomes(&self) -> Result<&[String]> {
        Ok(match self.loaded()? {
            LoadedIndex::Tbj(index) => index.chromosomes(),
            LoadedIndex::Tbk(scan) => scan.chromosomes(),
        })
    }

    pub fn num_columns(&self) -> Result<usize> {
        match self.loaded()? {
            LoadedIndex::Tbj(index) => index.num_columns().ok_or_else(|| {
                TabixError::Unsupported("index has no resolved blocks to count columns from".to_string())
            }),
            LoadedIndex::Tbk(scan) => Ok(scan.num_cols),
        }
    }

    ///
    /// Stream the rows of `chrom` with `begin <= position < end`.
    ///
    /// # Arguments
    ///
    /// - chrom: sequence name
    /// - begin: first position to yield, from the start of the sequence if `None`
    /// - end: stop before this position, to the end of the sequence if `None`
    /// - as_line: yield raw lines instead of split columns
    ///
    pub fn iter_range(
        &self,
        chrom: &str,
        begin: Option<u64>,
        end: Option<u64>,
        as_line: bool,
    ) -> Result<RangeIter> {
        if let (Some(b), Some(e)) = (begin, end) {
            if b > e {
                return Err(TabixError::Range(format!("begin {b} is after end {e}")));
            }
        }

        let (start, meta) = match self.loaded()? {
            LoadedIndex::Tbj(index) => {
                let reference = index
                    .reference(chrom)
                    .ok_or_else(|| TabixError::Range(format!("unknown chromosome {chrom:?}")))?;
                (tbj_start(reference, begin)?, index.header.meta)
            }
            LoadedIndex::Tbk(scan) => {
                let idx = scan
                    .chrom_index(chrom)
                    .ok_or_else(|| TabixError::Range(format!("unknown chromosome {chrom:?}")))?;
                (tbk_start(scan, idx, begin)?, DEFAULT_COMMENT_CHAR)
            }
        };

        let query = RangeQuery {
            chrom: Some(chrom.to_string()),
            begin,
            end,
            as_line,
            meta,
        };
        RangeIter::open(&self.paths.data, start, query)
    }
}
