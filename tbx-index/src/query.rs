//! Start-block location for range queries.
//!
//! Both index forms only answer "where should streaming start"; the rows
//! themselves are filtered while streaming (see [`tbx_io::stream`]).
use log::debug;

use tbx_core::models::{Reference, VirtualOffset};
use tbx_core::{Result, TabixError};

use crate::tbk::CompactScan;

///
/// Pick the linear index entry to start a query of `reference` at.
///
/// Entries are searched by the first position of their block: the greatest
/// entry not after `begin` wins, an exact match first. When `begin` precedes
/// every resolved entry, or is not given, the reference's first linear index
/// entry is used.
///
pub fn tbj_start(reference: &Reference, begin: Option<u64>) -> Result<VirtualOffset> {
    if reference.intvs.iter().all(|e| e.block.is_none()) {
        return Err(TabixError::Unsupported(format!(
            "index of {} has no block positions, it was built without its data file",
            reference.ref_name
        )));
    }

    let entries: Vec<_> = reference
        .intvs
        .iter()
        .filter_map(|e| e.first_pos().map(|p| (p, e)))
        .collect();

    let fallback = || {
        reference
            .intvs
            .first()
            .map(|e| VirtualOffset::new(e.real, 0))
            .ok_or_else(|| TabixError::Unsupported(format!("{} has no linear index", reference.ref_name)))
    };

    let Some(begin) = begin else {
        return fallback();
    };

    let idx = entries.partition_point(|(p, _)| *p < begin);
    let chosen = match entries.get(idx) {
        Some((p, e)) if *p == begin => Some(*e),
        _ if idx > 0 => Some(entries[idx - 1].1),
        _ => None,
    };

    match chosen {
        Some(entry) => {
            debug!(
                "{} begin {begin} :: linear entry real {} first_pos {:?}",
                reference.ref_name,
                entry.real,
                entry.first_pos()
            );
            Ok(VirtualOffset::new(entry.real, 0))
        }
        None => fallback(),
    }
}

///
/// Pick the block to start a query of sequence `chrom_idx` at.
///
/// `begin` is bisected over the first positions of the sequence's blocks.
/// When the first block already starts after `begin`, the rows may sit in
/// the last block of the previous sequence, so that block is used instead.
///
pub fn tbk_start(scan: &CompactScan, chrom_idx: usize, begin: Option<u64>) -> Result<VirtualOffset> {
    let chrom = scan
        .chroms
        .get(chrom_idx)
        .ok_or_else(|| TabixError::Range(format!("no sequence number {chrom_idx}")))?;
    let firsts = &scan.first_positions[chrom_idx];
    let reals = &scan.real_positions[chrom_idx];

    if firsts.is_empty() {
        return Err(TabixError::Range(format!("{chrom} has no indexed blocks")));
    }

    let Some(begin) = begin else {
        return Ok(match chrom_idx {
            0 => VirtualOffset::new(0, 0),
            _ => previous_last_block(scan, chrom_idx).unwrap_or(VirtualOffset::new(reals[0], 0)),
        });
    };

    let mut idx = firsts.partition_point(|&p| p < begin).min(firsts.len() - 1);
    if firsts[idx] > begin && idx > 0 {
        idx -= 1;
    }

    if firsts[idx] <= begin {
        debug!("{chrom} begin {begin} :: block {idx} real {} first_pos {}", reals[idx], firsts[idx]);
        return Ok(VirtualOffset::new(reals[idx], 0));
    }

    match previous_last_block(scan, chrom_idx) {
        Some(offset) => {
            debug!("{chrom} begin {begin} precedes its first block, starting at {offset}");
            Ok(offset)
        }
        None => Err(TabixError::Range(format!(
            "begin {begin} precedes the first record of {chrom} at {}",
            firsts[0]
        ))),
    }
}

fn previous_last_block(scan: &CompactScan, chrom_idx: usize) -> Option<VirtualOffset> {
    let prev = chrom_idx.checked_sub(1)?;
    scan.real_positions[prev].last().map(|&real| VirtualOffset::new(real, 0))
}
