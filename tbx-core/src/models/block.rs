use serde::{Deserialize, Serialize};

///
/// Genomic coordinates recovered from the rows of one decompressed block.
///
/// All positions are `None` when the block does not hold enough usable rows.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockPositions {
    /// Position of the row starting at the requested byte offset.
    pub bin_pos: Option<u64>,
    pub first_pos: Option<u64>,
    pub last_pos: Option<u64>,
    pub chrom: Option<String>,
    pub num_cols: usize,
    pub num_rows: usize,
}

impl BlockPositions {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.first_pos.is_none()
    }
}

///
/// Resolved description of the BGZF block a virtual offset points into.
///
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Compressed length of the block. `None` for the end-of-file marker.
    pub block_len: Option<u64>,
    /// Decompressed length of the block.
    pub block_size: usize,
    pub bin_pos: Option<u64>,
    pub first_pos: Option<u64>,
    pub last_pos: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrom: Option<String>,
    pub num_cols: usize,
    pub num_rows: usize,
}

impl BlockInfo {
    pub fn new(block_len: u64, block_size: usize, positions: BlockPositions) -> Self {
        Self {
            block_len: Some(block_len),
            block_size,
            bin_pos: positions.bin_pos,
            first_pos: positions.first_pos,
            last_pos: positions.last_pos,
            chrom: positions.chrom,
            num_cols: positions.num_cols,
            num_rows: positions.num_rows,
        }
    }

    pub fn eof() -> Self {
        Self::default()
    }

    pub fn is_eof(&self) -> bool {
        self.block_len.is_none()
    }

    pub fn has_positions(&self) -> bool {
        self.first_pos.is_some() && self.last_pos.is_some()
    }
}
