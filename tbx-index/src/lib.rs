//! # Tabix indexes and range queries
//!
//! Decodes htslib `.tbi` files, annotates every virtual offset with the
//! genomic positions of the block it points into, and persists the result
//! either as a JSON document (`.tbj`) or as a compact binary scan of every
//! BGZF block (`.tbk`). The [`Tabix`] handle ties both together and answers
//! range queries.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tbx_core::models::IndexFormat;
//! use tbx_index::Tabix;
//!
//! let tabix = Tabix::open("calls.vcf.gz", IndexFormat::Tbj).unwrap();
//! for row in tabix.iter_range("chr1", Some(1_000), Some(2_000), true).unwrap() {
//!     println!("{}", row.unwrap().into_line());
//! }
//! ```
pub mod query;
pub mod tabix;
pub mod tbi;
pub mod tbj;
pub mod tbk;

pub use tabix::Tabix;
pub use tbi::read_tabix;
pub use tbj::{TabixIndex, load_tbj, save_tbj};
pub use tbk::{CompactScan, load_tbk, save_tbk, scan_bgzf};
