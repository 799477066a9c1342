//! # Core types for tabix-indexed genomic files.
//!
//! Shared data model (virtual offsets, header, references, bins, chunks and
//! resolved block descriptions), the error taxonomy, the UCSC binning scheme
//! and small file helpers used by the other `tbx` crates.
//!
pub mod bins;
pub mod consts;
pub mod errors;
pub mod models;
pub mod utils;

pub use errors::{Result, TabixError};
