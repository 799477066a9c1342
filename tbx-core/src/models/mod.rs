pub mod block;
pub mod format;
pub mod header;
pub mod reference;
pub mod virtual_offset;

// re-export for cleaner imports
pub use self::block::{BlockInfo, BlockPositions};
pub use self::format::IndexFormat;
pub use self::header::{Header, TabixFormat};
pub use self::reference::{Bin, Chunk, Reference, ResolvedOffset};
pub use self::virtual_offset::VirtualOffset;
