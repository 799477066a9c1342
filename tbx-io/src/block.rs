//! Block position resolver.
//!
//! Recovers the genomic coordinates held by one decompressed BGZF block. A
//! block may start and end in the middle of a line, so rows that do not have
//! the column count of the second row are dropped before any position is read.
use std::io::{Read, Seek};

use log::{debug, trace};

use tbx_core::models::{BlockInfo, BlockPositions};
use tbx_core::{Result, TabixError};

use crate::bgzf::{Block, get_block};

/// Fewest rows a block must keep for its positions to be trusted.
const MIN_ROWS: usize = 3;

fn parse_position(cols: &[&str]) -> Result<u64> {
    let raw = cols.get(1).copied().unwrap_or_default();
    raw.parse::<u64>().map_err(|e| {
        TabixError::Parse(format!(
            "invalid position {raw:?} on {:?} :: {e}",
            cols.first().copied().unwrap_or_default()
        ))
    })
}

///
/// Derive first, last and bin positions from the text of one block.
///
/// # Arguments
///
/// - data: decompressed block
/// - bytes_pos: offset of the row the virtual offset points at
/// - chrom: keep only rows of this sequence
/// - meta: comment leader, lines starting with it are ignored
///
pub fn parse_block(data: &[u8], bytes_pos: usize, chrom: Option<&str>, meta: char) -> Result<BlockPositions> {
    let text = String::from_utf8_lossy(data);

    let rows: Vec<Vec<&str>> = text
        .split('\n')
        .filter(|line| !line.is_empty() && !line.starts_with(meta))
        .map(|line| line.split('\t').collect())
        .collect();

    if rows.len() < MIN_ROWS {
        debug!("num_rows {} < {MIN_ROWS}", rows.len());
        return Ok(BlockPositions::empty());
    }

    // the first line may be the tail of a row cut at the block start
    let num_cols = rows[1].len();

    let rows: Vec<Vec<&str>> = rows
        .into_iter()
        .filter(|row| row.len() == num_cols)
        .filter(|row| chrom.is_none_or(|c| row[0] == c))
        .collect();

    let mut num_rows = rows.len();
    if num_rows < MIN_ROWS {
        debug!("num_rows {num_rows} < {MIN_ROWS} :: chrom {chrom:?}");
        return Ok(BlockPositions::empty());
    }

    let mut first = &rows[0];
    if first.len() != rows[1].len() || first[0] != rows[1][0] {
        first = &rows[1];
        num_rows -= 1;
    }

    if first.len() < 2 {
        return Ok(BlockPositions::empty());
    }
    let first_pos = parse_position(first)?;

    // walk back from the tail to the last row past the first one
    let mut last = &rows[0];
    for row in rows.iter().rev() {
        last = row;
        if row.len() >= 2 && row[0] == first[0] && !row[1].is_empty() {
            if parse_position(row)? > first_pos {
                break;
            }
        } else {
            num_rows -= 1;
        }
    }

    if first.len() < last.len() {
        debug!("first row has {} columns, last row {}", first.len(), last.len());
        return Ok(BlockPositions::empty());
    }

    let last_pos = parse_position(last)?;

    let bin_pos = match data.get(bytes_pos..) {
        Some(rest) if !rest.is_empty() => {
            let line = rest.split(|&b| b == b'\n').next().unwrap_or_default();
            let line = String::from_utf8_lossy(line);
            let cols: Vec<&str> = line.split('\t').collect();
            if cols.len() == first.len() {
                Some(parse_position(&cols)?)
            } else {
                trace!("row at {bytes_pos} has {} columns, expected {}", cols.len(), first.len());
                None
            }
        }
        _ => None,
    };

    Ok(BlockPositions {
        bin_pos,
        first_pos: Some(first_pos),
        last_pos: Some(last_pos),
        chrom: Some(first[0].to_string()),
        num_cols: first.len(),
        num_rows,
    })
}

///
/// Decode the block at `real` and resolve its positions.
///
/// Returns [`BlockInfo::eof`] when `real` points at the end-of-file marker.
///
pub fn get_pos<R: Read + Seek>(
    reader: &mut R,
    real: u64,
    bytes: u16,
    chrom: Option<&str>,
    meta: char,
) -> Result<BlockInfo> {
    match get_block(reader, real, None)? {
        Block::Eof => Ok(BlockInfo::eof()),
        Block::Data { data, block_len } => {
            let positions = parse_block(&data, bytes as usize, chrom, meta)?;
            trace!(
                "real {real} bytes {bytes} block_len {block_len} first {:?} last {:?} rows {}",
                positions.first_pos, positions.last_pos, positions.num_rows
            );
            Ok(BlockInfo::new(block_len, data.len(), positions))
        }
    }
}
