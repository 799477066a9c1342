//! Streaming of the rows of a position-sorted BGZF file.
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use log::{debug, trace};

use tbx_core::consts::DEFAULT_COMMENT_CHAR;
use tbx_core::models::VirtualOffset;
use tbx_core::{Result, TabixError};

use crate::bgzf::{Block, get_block};

/// A matching row, either as the raw line or split on tabs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Line(String),
    Fields(Vec<String>),
}

impl Row {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Row::Line(line) => line.split('\t').collect(),
            Row::Fields(fields) => fields.iter().map(String::as_str).collect(),
        }
    }

    pub fn chrom(&self) -> Option<&str> {
        match self {
            Row::Line(line) => line.split('\t').next(),
            Row::Fields(fields) => fields.first().map(String::as_str),
        }
    }

    pub fn position(&self) -> Option<u64> {
        let raw = match self {
            Row::Line(line) => line.split('\t').nth(1),
            Row::Fields(fields) => fields.get(1).map(String::as_str),
        };
        raw.and_then(|p| p.parse().ok())
    }

    pub fn into_line(self) -> String {
        match self {
            Row::Line(line) => line,
            Row::Fields(fields) => fields.join("\t"),
        }
    }
}

/// Which rows a [`RangeIter`] yields. Positions are filtered as `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeQuery {
    pub chrom: Option<String>,
    pub begin: Option<u64>,
    pub end: Option<u64>,
    pub as_line: bool,
    pub meta: char,
}

impl Default for RangeQuery {
    fn default() -> Self {
        Self {
            chrom: None,
            begin: None,
            end: None,
            as_line: false,
            meta: DEFAULT_COMMENT_CHAR,
        }
    }
}

///
/// Single-pass iterator over the rows matching a [`RangeQuery`], reading one
/// BGZF block at a time from a starting virtual offset.
///
/// Iteration ends at the first row at or past `end`, at a block without rows
/// of the queried sequence, or at the end of the file. The reader is dropped as
/// soon as iteration ends or [`RangeIter::close`] is called.
///
pub struct RangeIter<R: Read + Seek = BufReader<File>> {
    reader: Option<R>,
    real: u64,
    bytes: u16,
    query: RangeQuery,
    carry: Vec<u8>,
    pending: VecDeque<Row>,
    block_n: usize,
    matched_any: bool,
    skipped_leading: bool,
    done: bool,
}

impl RangeIter<BufReader<File>> {
    /// Open `path` and stream from `start`.
    pub fn open<P: AsRef<Path>>(path: P, start: VirtualOffset, query: RangeQuery) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Ok(Self::new(BufReader::new(file), start, query))
    }
}

impl<R: Read + Seek> RangeIter<R> {
    pub fn new(reader: R, start: VirtualOffset, query: RangeQuery) -> Self {
        debug!(
            "streaming from {start} :: chrom {:?} begin {:?} end {:?} as_line {}",
            query.chrom, query.begin, query.end, query.as_line
        );
        Self {
            reader: Some(reader),
            real: start.real(),
            bytes: start.bytes(),
            query,
            carry: Vec::new(),
            pending: VecDeque::new(),
            block_n: 0,
            matched_any: false,
            skipped_leading: false,
            done: false,
        }
    }

    /// Stop iterating and release the underlying reader.
    pub fn close(&mut self) {
        self.reader = None;
        self.pending.clear();
        self.carry.clear();
        self.done = true;
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }

    fn read_block(&mut self) -> Result<()> {
        let Some(reader) = self.reader.as_mut() else {
            self.done = true;
            return Ok(());
        };

        let data = match get_block(reader, self.real, None)? {
            Block::Eof => {
                self.done = true;
                // last row of a file without a trailing newline
                let tail = std::mem::take(&mut self.carry);
                if !tail.is_empty() {
                    let text = decode(tail, self.real)?;
                    self.filter_lines(vec![text.as_str()])?;
                }
                return Ok(());
            }
            Block::Data { data, block_len } => {
                self.real += block_len;
                data
            }
        };

        let first = self.block_n == 0;
        self.block_n += 1;

        let skip = if first { self.bytes as usize } else { 0 };
        if skip > data.len() {
            return Err(TabixError::Integrity(format!(
                "virtual offset points past the block end :: bytes {skip} block_size {}",
                data.len()
            )));
        }

        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(&data[skip..]);

        match buf.iter().rposition(|&b| b == b'\n') {
            Some(i) => {
                self.carry = buf.split_off(i + 1);
                buf.truncate(i);
            }
            None => {
                trace!("block {} has no complete line", self.block_n);
                self.carry = buf;
                return Ok(());
            }
        }

        let text = decode(buf, self.real)?;
        let meta = self.query.meta;
        let mut lines: Vec<&str> = text
            .split('\n')
            .filter(|line| !line.is_empty() && !line.starts_with(meta))
            .collect();

        // a block start may cut a row in two
        if first && skip == 0 && lines.len() >= 2 && columns(lines[0]) != columns(lines[1]) {
            trace!("dropping leading fragment {:?}", lines[0]);
            lines.remove(0);
        }

        self.filter_lines(lines)
    }

    fn filter_lines(&mut self, lines: Vec<&str>) -> Result<()> {
        let mut matched = 0;

        for line in lines {
            let mut cols = line.split('\t');
            let chrom = cols.next().unwrap_or_default();
            if self.query.chrom.as_deref().is_some_and(|c| c != chrom) {
                continue;
            }
            matched += 1;

            if self.query.begin.is_some() || self.query.end.is_some() {
                let raw = cols.next().unwrap_or_default();
                let pos: u64 = raw.parse().map_err(|e| {
                    TabixError::Parse(format!("invalid position {raw:?} on {chrom} :: {e}"))
                })?;

                if self.query.begin.is_some_and(|b| pos < b) {
                    continue;
                }
                if self.query.end.is_some_and(|e| pos >= e) {
                    trace!("pos {pos} >= end {:?}", self.query.end);
                    self.done = true;
                    break;
                }
            }

            let row = if self.query.as_line {
                Row::Line(line.to_string())
            } else {
                Row::Fields(line.split('\t').map(str::to_string).collect())
            };
            self.pending.push_back(row);
        }

        if matched > 0 {
            self.matched_any = true;
        } else if self.matched_any || self.skipped_leading {
            debug!("block {} has no rows of {:?}, stopping", self.block_n, self.query.chrom);
            self.done = true;
        } else {
            trace!("leading block {} has no rows of {:?}", self.block_n, self.query.chrom);
            self.skipped_leading = true;
        }

        Ok(())
    }
}

fn columns(line: &str) -> usize {
    line.split('\t').count()
}

fn decode(buf: Vec<u8>, real: u64) -> Result<String> {
    String::from_utf8(buf)
        .map_err(|e| TabixError::Parse(format!("rows before block {real} are not UTF-8 :: {e}")))
}

impl<R: Read + Seek> Iterator for RangeIter<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.pending.pop_front() {
                return Some(Ok(row));
            }
            if self.done {
                self.close();
                return None;
            }
            if let Err(e) = self.read_block() {
                self.close();
                return Some(Err(e));
            }
        }
    }
}
