//! UCSC binning scheme as used by tabix.
//!
//! Coordinates are zero-based and half-open: `[beg, end)`. The arithmetic is
//! done on signed integers so that degenerate ranges (`end <= beg`) behave
//! exactly like the reference C functions.

use crate::consts::TABIX_MAX_BIN;

/// Bin number of the smallest bin fully containing `[beg, end)`.
pub fn reg2bin(beg: u64, end: u64) -> u32 {
    let beg = beg as i64;
    let end = end as i64 - 1;

    if beg >> 14 == end >> 14 {
        return (((1 << 15) - 1) / 7 + (beg >> 14)) as u32;
    }
    if beg >> 17 == end >> 17 {
        return (((1 << 12) - 1) / 7 + (beg >> 17)) as u32;
    }
    if beg >> 20 == end >> 20 {
        return (((1 << 9) - 1) / 7 + (beg >> 20)) as u32;
    }
    if beg >> 23 == end >> 23 {
        return (((1 << 6) - 1) / 7 + (beg >> 23)) as u32;
    }
    if beg >> 26 == end >> 26 {
        return (((1 << 3) - 1) / 7 + (beg >> 26)) as u32;
    }
    0
}

/// All bins that may overlap `[beg, end)`. Bin 0 is always first.
pub fn reg2bins(beg: u64, end: u64) -> Vec<u32> {
    let beg = beg as i64;
    let end = end as i64 - 1;

    let mut bins = vec![0u32];

    for (offset, shift) in [(1i64, 26), (9, 23), (73, 20), (585, 17), (4681, 14)] {
        let first = offset + (beg >> shift);
        let last = offset + (end >> shift);
        bins.extend((first..=last).map(|k| k as u32));
    }

    bins
}

/// Whether `bin` is a regular bin of the scheme (the htslib pseudo-bin is not).
pub fn is_regular_bin(bin: u32) -> bool {
    bin <= TABIX_MAX_BIN
}
