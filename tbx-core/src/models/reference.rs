use serde::{Deserialize, Serialize};

use super::block::BlockInfo;
use super::virtual_offset::VirtualOffset;
use crate::bins::is_regular_bin;

///
/// A virtual offset read from the index, annotated with the block it points
/// into. `block` is `None` when the index was decoded without its data file.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedOffset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_n: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_n: Option<usize>,
    pub real: u64,
    pub bytes: u16,
    pub block: Option<BlockInfo>,
}

impl ResolvedOffset {
    pub fn new(offset: VirtualOffset, block: Option<BlockInfo>) -> Self {
        Self {
            bin_n: None,
            chunk_n: None,
            real: offset.real(),
            bytes: offset.bytes(),
            block,
        }
    }

    pub fn with_chunk(mut self, bin_n: usize, chunk_n: usize) -> Self {
        self.bin_n = Some(bin_n);
        self.chunk_n = Some(chunk_n);
        self
    }

    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.real, self.bytes)
    }

    pub fn block_len(&self) -> Option<u64> {
        self.block.as_ref().and_then(|b| b.block_len)
    }

    pub fn first_pos(&self) -> Option<u64> {
        self.block.as_ref().and_then(|b| b.first_pos)
    }

    pub fn last_pos(&self) -> Option<u64> {
        self.block.as_ref().and_then(|b| b.last_pos)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub begin: ResolvedOffset,
    pub end: ResolvedOffset,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bin {
    pub bin_n: usize,
    pub bin: u32,
    pub chunks: Vec<Chunk>,
}

impl Bin {
    /// htslib stores mapped/unmapped counts in a pseudo-bin; its "chunks" are not offsets.
    pub fn is_pseudo(&self) -> bool {
        !is_regular_bin(self.bin)
    }
}

///
/// Index data of one reference sequence (chromosome).
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub ref_n: usize,
    pub ref_name: String,
    pub bins: Vec<Bin>,
    /// Chunk start with the smallest first position.
    pub bins_begin: Option<ResolvedOffset>,
    /// Chunk end with the largest last position.
    pub bins_end: Option<ResolvedOffset>,
    pub first_block: Option<ResolvedOffset>,
    /// `bins_end` refined by scanning the blocks that follow it.
    pub last_block: Option<ResolvedOffset>,
    /// Linear index, one entry per 16 KiB window.
    pub intvs: Vec<ResolvedOffset>,
}

impl Reference {
    pub fn new(ref_n: usize, ref_name: String) -> Self {
        Self {
            ref_n,
            ref_name,
            bins: Vec::new(),
            bins_begin: None,
            bins_end: None,
            first_block: None,
            last_block: None,
            intvs: Vec::new(),
        }
    }

    /// Number of columns of the rows of this reference, if any block was resolved.
    pub fn num_cols(&self) -> Option<usize> {
        self.first_block
            .iter()
            .chain(self.intvs.iter())
            .filter_map(|o| o.block.as_ref())
            .find(|b| b.has_positions())
            .map(|b| b.num_cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn resolved(real: u64, first: Option<u64>) -> ResolvedOffset {
        let block = BlockInfo {
            block_len: Some(100),
            block_size: 1000,
            bin_pos: first,
            first_pos: first,
            last_pos: first.map(|p| p + 10),
            chrom: None,
            num_cols: 8,
            num_rows: 10,
        };
        ResolvedOffset::new(VirtualOffset::new(real, 0), Some(block))
    }

    #[rstest]
    fn test_resolved_offset_accessors() {
        let offset = resolved(42, Some(7));
        assert_eq!(offset.virtual_offset(), VirtualOffset::new(42, 0));
        assert_eq!(offset.block_len(), Some(100));
        assert_eq!(offset.first_pos(), Some(7));
        assert_eq!(offset.last_pos(), Some(17));
    }

    #[rstest]
    fn test_num_cols_skips_unresolved() {
        let mut reference = Reference::new(0, "chr1".to_string());
        reference.intvs.push(resolved(0, None));
        reference.intvs.push(resolved(100, Some(5)));
        assert_eq!(reference.num_cols(), Some(8));
    }

    #[rstest]
    fn test_bin_edges() {
        let bin = Bin {
            bin_n: 0,
            bin: 4681,
            chunks: vec![
                Chunk { begin: resolved(0, Some(1)), end: resolved(100, Some(2)) },
                Chunk { begin: resolved(200, Some(3)), end: resolved(300, Some(4)) },
            ],
        };
        assert!(!bin.is_pseudo());
        assert_eq!(bin.chunks.first().map(|c| c.begin.real), Some(0));
        assert_eq!(bin.chunks.last().map(|c| c.end.real), Some(300));
    }
}
