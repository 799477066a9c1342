//! BGZF block codec.
//!
//! A BGZF file is a series of gzip members. Each member carries a `BC` extra
//! subfield whose payload is the total compressed size of the member minus one,
//! so a block can be located, read and inflated on its own.
use std::io::{self, Read, Seek, SeekFrom, Write};

use flate2::Compression;
use flate2::Crc;
use flate2::read::GzDecoder;
use flate2::write::DeflateEncoder;
use log::{debug, warn};

use tbx_core::consts::{BGZF_EOF, GZIP_MAGIC};
use tbx_core::models::VirtualOffset;
use tbx_core::{Result, TabixError};

const FEXTRA: u8 = 4;
const DEFLATE: u8 = 8;

/// Uncompressed bytes per block written by [`BgzfWriter`], as in htslib.
pub const MAX_BLOCK_DATA: usize = 0xff00;

/// One decoded BGZF block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Data { data: Vec<u8>, block_len: u64 },
    /// End-of-file marker, or no further block at the requested position.
    Eof,
}

impl Block {
    pub fn is_eof(&self) -> bool {
        matches!(self, Block::Eof)
    }
}

/// Read exactly `buf.len()` bytes, or fewer if the reader runs dry.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

///
/// Read the gzip header of the block starting at `pos` and return the total
/// compressed length of the block. Returns `None` when `pos` is at the end of
/// the file. The reader is left positioned at `pos`.
///
pub fn read_header<R: Read + Seek>(reader: &mut R, pos: u64) -> Result<Option<u64>> {
    reader.seek(SeekFrom::Start(pos))?;

    let mut magic = [0u8; 2];
    match read_full(reader, &mut magic)? {
        0 => return Ok(None),
        2 => {}
        n => {
            return Err(TabixError::Integrity(format!(
                "truncated gzip header at {pos}: read {n} of 2 magic bytes"
            )));
        }
    }

    if &magic != GZIP_MAGIC {
        return Err(TabixError::Format(format!(
            "not a gzipped block at {pos}: magic {magic:02x?}"
        )));
    }

    // method, flags, mtime (4), xfl, os
    let mut fixed = [0u8; 8];
    if read_full(reader, &mut fixed)? != fixed.len() {
        return Err(TabixError::Integrity(format!("truncated gzip header at {pos}")));
    }

    let (method, flags) = (fixed[0], fixed[1]);
    if method != DEFLATE {
        return Err(TabixError::Format(format!(
            "unknown compression method {method} at {pos}"
        )));
    }

    if flags & FEXTRA == 0 {
        return Err(TabixError::Format(format!(
            "gzip member at {pos} has no extra field, not BGZF"
        )));
    }

    let mut xlen = [0u8; 2];
    if read_full(reader, &mut xlen)? != xlen.len() {
        return Err(TabixError::Integrity(format!("truncated extra field at {pos}")));
    }
    let mut extra = vec![0u8; u16::from_le_bytes(xlen) as usize];
    if read_full(reader, &mut extra)? != extra.len() {
        return Err(TabixError::Integrity(format!("truncated extra field at {pos}")));
    }

    reader.seek(SeekFrom::Start(pos))?;

    // walk the subfields: SI1 SI2 SLEN(u16) payload
    let mut i = 0;
    while i + 4 <= extra.len() {
        let slen = u16::from_le_bytes([extra[i + 2], extra[i + 3]]) as usize;
        let payload = &extra[i + 4..extra.len().min(i + 4 + slen)];

        if &extra[i..i + 2] == b"BC" {
            if payload.len() != 2 {
                return Err(TabixError::Format(format!(
                    "malformed BC subfield at {pos}: {} payload bytes",
                    payload.len()
                )));
            }
            let bsize = u16::from_le_bytes([payload[0], payload[1]]) as u64;
            return Ok(Some(bsize + 1));
        }

        i += 4 + slen;
    }

    Err(TabixError::Format(format!("no BC subfield in block at {pos}")))
}

///
/// Read and inflate the block starting at `pos`.
///
/// # Arguments
///
/// - reader: the compressed data file
/// - pos: file offset of the block start
/// - block_len: compressed length, when already known from a previous read
///
pub fn get_block<R: Read + Seek>(reader: &mut R, pos: u64, block_len: Option<u64>) -> Result<Block> {
    let block_len = match block_len {
        Some(len) => len,
        None => match read_header(reader, pos)? {
            Some(len) => len,
            None => {
                warn!("no block at {pos}, file ends without a BGZF EOF marker");
                return Ok(Block::Eof);
            }
        },
    };

    if block_len == 0 {
        return Err(TabixError::Format(format!("block length is zero at {pos}")));
    }

    reader.seek(SeekFrom::Start(pos))?;
    let mut raw = vec![0u8; block_len as usize];
    let read = read_full(reader, &mut raw)?;
    if read as u64 != block_len {
        return Err(TabixError::Integrity(format!(
            "block data has wrong size :: real_pos {pos} block_len {block_len} read {read}"
        )));
    }

    if raw == BGZF_EOF {
        debug!("EOF marker at {pos}");
        return Ok(Block::Eof);
    }

    let mut data = Vec::new();
    GzDecoder::new(raw.as_slice())
        .read_to_end(&mut data)
        .map_err(|e| TabixError::Integrity(format!("cannot inflate block at {pos}: {e}")))?;

    if data.is_empty() {
        return Err(TabixError::Integrity(format!(
            "block has size zero :: real_pos {pos} block_len {block_len}"
        )));
    }

    Ok(Block::Data { data, block_len })
}

///
/// Writes BGZF blocks, keeping track of the virtual offset of the next byte.
///
pub struct BgzfWriter<W: Write> {
    inner: W,
    buf: Vec<u8>,
    block_data: usize,
    /// Compressed bytes written so far, i.e. the file offset of the next block.
    position: u64,
}

impl<W: Write> BgzfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self::with_block_size(inner, MAX_BLOCK_DATA)
    }

    /// Writer emitting blocks of at most `block_data` uncompressed bytes.
    pub fn with_block_size(inner: W, block_data: usize) -> Self {
        let block_data = block_data.clamp(1, MAX_BLOCK_DATA);
        Self {
            inner,
            buf: Vec::with_capacity(block_data),
            block_data,
            position: 0,
        }
    }

    /// Virtual offset the next written byte will get.
    pub fn virtual_offset(&self) -> VirtualOffset {
        VirtualOffset::new(self.position, self.buf.len() as u16)
    }

    fn compress_block(data: &[u8]) -> io::Result<Vec<u8>> {
        let mut deflate = DeflateEncoder::new(Vec::new(), Compression::default());
        deflate.write_all(data)?;
        let deflated = deflate.finish()?;

        let mut crc = Crc::new();
        crc.update(data);

        let mut block = Vec::with_capacity(deflated.len() + 26);
        block.extend_from_slice(&[0x1f, 0x8b, DEFLATE, FEXTRA, 0, 0, 0, 0, 0, 0xff]);
        block.extend_from_slice(&6u16.to_le_bytes());
        block.extend_from_slice(b"BC");
        block.extend_from_slice(&2u16.to_le_bytes());
        let bsize_pos = block.len();
        block.extend_from_slice(&0u16.to_le_bytes());
        block.extend_from_slice(&deflated);
        block.extend_from_slice(&crc.sum().to_le_bytes());
        block.extend_from_slice(&(data.len() as u32).to_le_bytes());

        let bsize = u16::try_from(block.len() - 1).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidData, "compressed block exceeds 64 KiB")
        })?;
        block[bsize_pos..bsize_pos + 2].copy_from_slice(&bsize.to_le_bytes());

        Ok(block)
    }

    fn flush_block(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let take = self.buf.len().min(self.block_data);
        let block = Self::compress_block(&self.buf[..take])?;
        self.inner.write_all(&block)?;
        self.position += block.len() as u64;
        self.buf.drain(..take);
        Ok(())
    }

    /// Flush the pending block, append the EOF marker and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        while !self.buf.is_empty() {
            self.flush_block()?;
        }
        self.inner.write_all(&BGZF_EOF)?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for BgzfWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        while self.buf.len() >= self.block_data {
            self.flush_block()?;
        }
        Ok(buf.len())
    }

    /// Only flushes the inner writer; a partial block stays buffered so
    /// virtual offsets handed out earlier remain valid.
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
