use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::consts::TABIX_BLOCK_BYTES_MASK;

///
/// BGZF virtual file offset: the upper 48 bits hold the file offset of a
/// compressed block, the lower 16 bits the byte offset inside the
/// decompressed block.
///
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualOffset(u64);

impl VirtualOffset {
    pub const fn new(real: u64, bytes: u16) -> Self {
        Self((real << 16) | bytes as u64)
    }

    /// File offset of the start of the BGZF block.
    pub const fn real(self) -> u64 {
        self.0 >> 16
    }

    /// Offset inside the decompressed block.
    pub const fn bytes(self) -> u16 {
        (self.0 & TABIX_BLOCK_BYTES_MASK) as u16
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for VirtualOffset {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<VirtualOffset> for u64 {
    fn from(offset: VirtualOffset) -> Self {
        offset.0
    }
}

impl Display for VirtualOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.real(), self.bytes())
    }
}
