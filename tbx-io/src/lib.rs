//! # BGZF reading and writing for tbx
//!
//! Block level access to BGZF compressed, position sorted tab-delimited files:
//!
//! - [`bgzf`]: decode single blocks by file offset, write BGZF files.
//! - [`block`]: resolve the genomic positions covered by one block.
//! - [`stream`]: stream the rows of a sequence range starting from a virtual offset.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use tbx_io::block::get_pos;
//!
//! let mut file = File::open("calls.vcf.gz").unwrap();
//! let info = get_pos(&mut file, 0, 0, None, '#').unwrap();
//! println!("{:?} {:?}", info.first_pos, info.last_pos);
//! ```
pub mod bgzf;
pub mod block;
pub mod stream;

pub use bgzf::{Block, BgzfWriter, get_block, read_header};
pub use block::{get_pos, parse_block};
pub use stream::{RangeIter, RangeQuery, Row};
