//! Compact block scan (`.tbk`).
//!
//! One linear pass over every BGZF block of the data file records, per
//! sequence, the real offset, first and last position and row count of each
//! block. The arrays are stored delta encoded with the narrowest integer type
//! that fits, a running-sum checksum per array and a SHA-256 digest over the
//! whole payload.
use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use tbx_core::consts::{GZIP_MAGIC, TBK_EOF, TBK_FORMAT_NAME, TBK_FORMAT_VER};
use tbx_core::{Result, TabixError};
use tbx_io::block::get_pos;

/// Hex encoded SHA-256.
const DIGEST_HEX_LEN: usize = 64;

/// Order in which the position arrays are stored.
const FIELDS: [&str; 4] = ["realPositions", "firstPositions", "lastPositions", "numberRows"];

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TbkHeader {
    chroms: Vec<String>,
    num_cols: usize,
    chrom_sizes: Vec<usize>,
    chrom_length: usize,
}

///
/// Per-sequence block arrays of a BGZF file. Entry `i` of every array of a
/// sequence describes the same block.
///
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CompactScan {
    pub chroms: Vec<String>,
    pub num_cols: usize,
    pub chrom_sizes: Vec<usize>,
    pub chrom_length: usize,
    pub real_positions: Vec<Vec<u64>>,
    pub first_positions: Vec<Vec<u64>>,
    pub last_positions: Vec<Vec<u64>>,
    pub number_rows: Vec<Vec<u64>>,
}

impl CompactScan {
    pub fn chromosomes(&self) -> &[String] {
        &self.chroms
    }

    pub fn chrom_index(&self, chrom: &str) -> Option<usize> {
        self.chroms.iter().position(|c| c == chrom)
    }

    fn push_chrom(&mut self, chrom: String) {
        self.chroms.push(chrom);
        self.real_positions.push(Vec::new());
        self.first_positions.push(Vec::new());
        self.last_positions.push(Vec::new());
        self.number_rows.push(Vec::new());
    }

    fn fields(&self) -> [&Vec<Vec<u64>>; 4] {
        [&self.real_positions, &self.first_positions, &self.last_positions, &self.number_rows]
    }

    fn header(&self) -> TbkHeader {
        TbkHeader {
            chroms: self.chroms.clone(),
            num_cols: self.num_cols,
            chrom_sizes: self.chrom_sizes.clone(),
            chrom_length: self.chrom_length,
        }
    }
}

///
/// Visit every block of a BGZF file and record its positions.
///
/// Blocks that hold too few rows to be resolved (header-only blocks, for
/// instance) are skipped.
///
/// # Arguments
///
/// - reader: the BGZF data file
/// - meta: comment leader
///
pub fn scan_bgzf<R: Read + Seek>(reader: &mut R, meta: char) -> Result<CompactScan> {
    let mut scan = CompactScan::default();
    let mut real = 0;
    let mut e = 0;

    loop {
        let info = get_pos(reader, real, 0, None, meta)?;
        let Some(block_len) = info.block_len else {
            break;
        };

        match (info.chrom, info.first_pos, info.last_pos) {
            (Some(chrom), Some(first), Some(last)) => {
                if scan.chroms.last() != Some(&chrom) {
                    if scan.chroms.contains(&chrom) {
                        return Err(TabixError::Format(format!(
                            "{chrom} appears again at {real}, file is not sorted by sequence"
                        )));
                    }
                    debug!("block {e} at {real} starts {chrom}");
                    scan.push_chrom(chrom);
                }
                if scan.num_cols == 0 {
                    scan.num_cols = info.num_cols;
                }

                let i = scan.chroms.len() - 1;
                scan.real_positions[i].push(real);
                scan.first_positions[i].push(first);
                scan.last_positions[i].push(last);
                scan.number_rows[i].push(info.num_rows as u64);

                trace!(
                    "block {e} real {real} first {first} last {last} block_len {block_len} block_size {} rows {}",
                    info.block_size, info.num_rows
                );
            }
            _ => debug!("block {e} at {real} has no positions, skipping"),
        }

        real += block_len;
        e += 1;
    }

    scan.chrom_sizes = scan.real_positions.iter().map(Vec::len).collect();
    scan.chrom_length = scan.chrom_sizes.iter().sum();

    info!("scanned {e} blocks, {} sequences, {} indexed blocks", scan.chroms.len(), scan.chrom_length);
    Ok(scan)
}

/// Type codes of the packed deltas, narrowest first.
fn type_code(deltas: &[i64]) -> u8 {
    let min = deltas.iter().copied().min().unwrap_or(0);
    let max = deltas.iter().copied().max().unwrap_or(0);

    if min >= 0 {
        match max {
            m if m <= u8::MAX as i64 => b'B',
            m if m <= u16::MAX as i64 => b'H',
            m if m <= u32::MAX as i64 => b'L',
            _ => b'Q',
        }
    } else if min >= i8::MIN as i64 && max <= i8::MAX as i64 {
        b'b'
    } else if min >= i16::MIN as i64 && max <= i16::MAX as i64 {
        b'h'
    } else if min >= i32::MIN as i64 && max <= i32::MAX as i64 {
        b'l'
    } else {
        b'q'
    }
}

fn width(code: u8) -> Result<usize> {
    match code {
        b'b' | b'B' => Ok(1),
        b'h' | b'H' => Ok(2),
        b'l' | b'L' => Ok(4),
        b'q' | b'Q' => Ok(8),
        other => Err(TabixError::Format(format!("unknown type code {:?}", other as char))),
    }
}

fn to_deltas(values: &[u64]) -> Vec<i64> {
    let mut prev = 0i64;
    values
        .iter()
        .map(|&v| {
            let v = v as i64;
            let delta = v.wrapping_sub(prev);
            prev = v;
            delta
        })
        .collect()
}

fn write_values(out: &mut Vec<u8>, code: u8, deltas: &[i64]) -> Result<()> {
    for &d in deltas {
        match code {
            b'b' => out.write_i8(d as i8)?,
            b'B' => out.write_u8(d as u8)?,
            b'h' => out.write_i16::<LittleEndian>(d as i16)?,
            b'H' => out.write_u16::<LittleEndian>(d as u16)?,
            b'l' => out.write_i32::<LittleEndian>(d as i32)?,
            b'L' => out.write_u32::<LittleEndian>(d as u32)?,
            b'q' => out.write_i64::<LittleEndian>(d)?,
            _ => out.write_u64::<LittleEndian>(d as u64)?,
        }
    }
    Ok(())
}

///
/// Serialize a scan to the uncompressed `.tbk` layout.
///
pub fn encode_tbk(scan: &CompactScan) -> Result<Vec<u8>> {
    let header = serde_json::to_string(&scan.header())?;

    let mut out = Vec::new();
    out.write_i64::<LittleEndian>(TBK_FORMAT_NAME.len() as i64)?;
    out.extend_from_slice(TBK_FORMAT_NAME.as_bytes());
    out.write_i64::<LittleEndian>(TBK_FORMAT_VER)?;
    out.write_i64::<LittleEndian>(header.len() as i64)?;
    out.extend_from_slice(header.as_bytes());

    for (name, field) in FIELDS.iter().zip(scan.fields()) {
        debug!("writing {name} - {}", scan.chrom_length);
        for values in field {
            let deltas = to_deltas(values);
            let checksum = deltas.iter().fold(0i64, |acc, d| acc.wrapping_add(*d));
            let code = type_code(&deltas);

            out.write_i64::<LittleEndian>(checksum)?;
            out.write_u8(code)?;
            write_values(&mut out, code, &deltas)?;
        }
    }

    let mut hasher = Sha256::new();
    hasher.update(&out);
    // the digest also covers its own length prefix
    let digest_len = DIGEST_HEX_LEN;
    let mut len_bytes = Vec::with_capacity(8);
    len_bytes.write_i64::<LittleEndian>(digest_len as i64)?;
    hasher.update(&len_bytes);
    let digest = format!("{:x}", hasher.finalize());

    out.extend_from_slice(&len_bytes);
    out.extend_from_slice(digest.as_bytes());
    out.extend_from_slice(&TBK_EOF);

    info!("digest {digest}");
    Ok(out)
}

/// Cursor over `.tbk` bytes feeding everything it reads to the digest.
struct TbkReader<'a> {
    buf: &'a [u8],
    pos: usize,
    hasher: Sha256,
}

impl<'a> TbkReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, hasher: Sha256::new() }
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len()).ok_or_else(|| {
            TabixError::Integrity(format!(
                "file truncated reading {what} :: need {n} bytes at {} of {}",
                self.pos,
                self.buf.len()
            ))
        })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        self.hasher.update(bytes);
        Ok(bytes)
    }

    /// Bytes after the digest length are not part of the digest.
    fn take_unhashed(&mut self, n: usize, what: &str) -> Result<&'a [u8]> {
        let hasher = self.hasher.clone();
        let bytes = self.take(n, what)?;
        self.hasher = hasher;
        Ok(bytes)
    }

    fn read_i64(&mut self, what: &str) -> Result<i64> {
        let mut bytes = self.take(8, what)?;
        Ok(bytes.read_i64::<LittleEndian>()?)
    }

    fn read_len(&mut self, what: &str) -> Result<usize> {
        let n = self.read_i64(what)?;
        usize::try_from(n).map_err(|_| TabixError::Format(format!("{what} = {n} is negative")))
    }

    fn read_deltas(&mut self, count: usize, what: &str) -> Result<(i64, Vec<i64>)> {
        let checksum = self.read_i64(what)?;
        let code = self.take(1, what)?[0];
        let size = width(code)?;
        let mut raw = self.take(count.saturating_mul(size), what)?;

        let mut deltas = Vec::with_capacity(count);
        for _ in 0..count {
            let d = match code {
                b'b' => raw.read_i8()? as i64,
                b'B' => raw.read_u8()? as i64,
                b'h' => raw.read_i16::<LittleEndian>()? as i64,
                b'H' => raw.read_u16::<LittleEndian>()? as i64,
                b'l' => raw.read_i32::<LittleEndian>()? as i64,
                b'L' => raw.read_u32::<LittleEndian>()? as i64,
                b'q' => raw.read_i64::<LittleEndian>()?,
                _ => raw.read_u64::<LittleEndian>()? as i64,
            };
            deltas.push(d);
        }
        Ok((checksum, deltas))
    }
}

///
/// Rebuild the values of one array, checking them against the stored sum.
///
/// A stored checksum of zero is accepted for any content: writers that do
/// not compute the sum leave it at zero.
///
fn from_deltas(checksum: i64, deltas: &[i64], what: &str) -> Result<Vec<u64>> {
    let sum = deltas.iter().fold(0i64, |acc, d| acc.wrapping_add(*d));
    if checksum != 0 && sum != checksum {
        return Err(TabixError::Integrity(format!(
            "checksum mismatch in {what} :: stored {checksum} computed {sum}"
        )));
    }

    let mut acc = 0i64;
    deltas
        .iter()
        .map(|d| {
            acc = acc.wrapping_add(*d);
            u64::try_from(acc).map_err(|_| {
                TabixError::Integrity(format!("negative value {acc} in {what}"))
            })
        })
        .collect()
}

///
/// Parse uncompressed `.tbk` bytes. The digest is verified before any
/// array is rebuilt.
///
pub fn decode_tbk(bytes: &[u8]) -> Result<CompactScan> {
    let mut reader = TbkReader::new(bytes);

    let name_len = reader.read_len("format name length")?;
    if name_len != TBK_FORMAT_NAME.len() {
        return Err(TabixError::Format(format!(
            "format name length {name_len}, expected {}",
            TBK_FORMAT_NAME.len()
        )));
    }
    let name = reader.take(name_len, "format name")?;
    if name != TBK_FORMAT_NAME.as_bytes() {
        return Err(TabixError::Format(format!(
            "format name {:?}, expected {TBK_FORMAT_NAME:?}",
            String::from_utf8_lossy(name)
        )));
    }
    let version = reader.read_i64("format version")?;
    if version != TBK_FORMAT_VER {
        return Err(TabixError::Format(format!(
            "format version {version}, expected {TBK_FORMAT_VER}"
        )));
    }

    let header_len = reader.read_len("header length")?;
    let header: TbkHeader = serde_json::from_slice(reader.take(header_len, "header")?)?;
    debug!("header {header:?}");

    if header.chrom_sizes.len() != header.chroms.len() {
        return Err(TabixError::Format(format!(
            "{} sequences but {} sizes",
            header.chroms.len(),
            header.chrom_sizes.len()
        )));
    }

    let mut raw = Vec::with_capacity(FIELDS.len());
    for name in FIELDS {
        let mut arrays = Vec::with_capacity(header.chroms.len());
        for (chrom, &size) in header.chroms.iter().zip(&header.chrom_sizes) {
            arrays.push(reader.read_deltas(size, &format!("{name} of {chrom}"))?);
        }
        raw.push(arrays);
    }

    let digest_len = reader.read_len("digest length")?;
    if digest_len != DIGEST_HEX_LEN {
        return Err(TabixError::Format(format!(
            "digest length {digest_len}, expected {DIGEST_HEX_LEN}"
        )));
    }
    let computed = format!("{:x}", reader.hasher.clone().finalize());
    let stored = reader.take_unhashed(digest_len, "digest")?;
    if stored != computed.as_bytes() {
        return Err(TabixError::Integrity(format!(
            "digest mismatch :: stored {} computed {computed}",
            String::from_utf8_lossy(stored)
        )));
    }
    debug!("digest {computed}");

    let trailer = reader.take_unhashed(TBK_EOF.len(), "end of file marker")?;
    if trailer != TBK_EOF {
        return Err(TabixError::Integrity("missing end of file marker".to_string()));
    }
    if reader.pos != bytes.len() {
        return Err(TabixError::Integrity(format!(
            "{} unexpected bytes after the end of file marker",
            bytes.len() - reader.pos
        )));
    }

    let mut arrays = Vec::with_capacity(FIELDS.len());
    for (name, field) in FIELDS.iter().zip(raw) {
        let values = field
            .iter()
            .zip(&header.chroms)
            .map(|((checksum, deltas), chrom)| from_deltas(*checksum, deltas, &format!("{name} of {chrom}")))
            .collect::<Result<Vec<_>>>()?;
        arrays.push(values);
    }

    let mut arrays = arrays.into_iter();
    let mut next = || arrays.next().unwrap_or_default();

    Ok(CompactScan {
        chrom_length: header.chrom_length,
        real_positions: next(),
        first_positions: next(),
        last_positions: next(),
        number_rows: next(),
        chroms: header.chroms,
        num_cols: header.num_cols,
        chrom_sizes: header.chrom_sizes,
    })
}

///
/// Write a scan to `path`, optionally gzip-compressed.
///
pub fn save_tbk<P: AsRef<Path>>(scan: &CompactScan, path: P, compress: bool) -> Result<()> {
    let path = path.as_ref();
    info!("saving {}", path.display());

    let bytes = encode_tbk(scan)?;
    let file = File::create(path)?;

    if compress {
        debug!("compressing");
        let mut encoder = GzEncoder::new(file, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut file = file;
        file.write_all(&bytes)?;
        file.flush()?;
    }

    Ok(())
}

///
/// Load a `.tbk`, detecting gzip compression from its first bytes.
///
pub fn load_tbk<P: AsRef<Path>>(path: P) -> Result<CompactScan> {
    let path = path.as_ref();
    let mut raw = Vec::new();
    BufReader::new(File::open(path)?).read_to_end(&mut raw)?;

    let name_at = 8..8 + TBK_FORMAT_NAME.len();
    let bytes = if raw.starts_with(GZIP_MAGIC) {
        info!("loading {} as compressed {TBK_FORMAT_NAME}", path.display());
        let mut bytes = Vec::new();
        MultiGzDecoder::new(raw.as_slice())
            .read_to_end(&mut bytes)
            .map_err(|e| TabixError::Integrity(format!("cannot decompress {}: {e}", path.display())))?;
        bytes
    } else if raw.get(name_at.clone()) == Some(TBK_FORMAT_NAME.as_bytes()) {
        info!("loading {} as {TBK_FORMAT_NAME}", path.display());
        raw
    } else {
        return Err(TabixError::Format(format!(
            "{} is not a {TBK_FORMAT_NAME} file: expected gzip magic or {TBK_FORMAT_NAME:?} at bytes {name_at:?}",
            path.display()
        )));
    };

    decode_tbk(&bytes)
}
