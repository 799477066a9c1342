//! htslib `.tbi` decoding.
//!
//! The index is BGZF compressed. Every chunk and linear index offset is
//! resolved against the data file to learn the positions of the block it
//! points into; without the data file the offsets are kept unresolved.
use std::fs::File;
use std::io::{self, BufReader, Read, Seek};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::MultiGzDecoder;
use fxhash::FxHashMap;
use log::{debug, info, trace, warn};

use tbx_core::bins::is_regular_bin;
use tbx_core::consts::{TABIX_MAGIC, TABIX_PSEUDO_BIN};
use tbx_core::models::{Bin, BlockInfo, Chunk, Header, Reference, ResolvedOffset, TabixFormat, VirtualOffset};
use tbx_core::utils::get_filenames;
use tbx_core::{Result, TabixError};
use tbx_io::block::get_pos;

use crate::tbj::TabixIndex;

fn truncated(what: &str) -> impl FnOnce(io::Error) -> TabixError + '_ {
    move |e| match e.kind() {
        io::ErrorKind::UnexpectedEof => TabixError::Integrity(format!("index truncated while reading {what}")),
        _ => TabixError::Io(e),
    }
}

fn read_i32<R: Read>(fhd: &mut R, what: &str) -> Result<i32> {
    fhd.read_i32::<LittleEndian>().map_err(truncated(what))
}

fn read_count<R: Read>(fhd: &mut R, what: &str) -> Result<usize> {
    let n = read_i32(fhd, what)?;
    usize::try_from(n).map_err(|_| TabixError::Format(format!("{what} = {n} is negative")))
}

///
/// Resolves virtual offsets of one reference against the data file,
/// remembering every offset it has already looked up.
///
struct PositionResolver<D: Read + Seek> {
    data: Option<D>,
    meta: char,
    memo: FxHashMap<u64, Option<BlockInfo>>,
}

impl<D: Read + Seek> PositionResolver<D> {
    fn new(data: Option<D>, meta: char) -> Self {
        Self {
            data,
            meta,
            memo: FxHashMap::default(),
        }
    }

    /// Start a new reference; cached lookups were filtered on the previous name.
    fn reset(&mut self) {
        self.memo.clear();
    }

    fn has_data(&self) -> bool {
        self.data.is_some()
    }

    fn resolve(&mut self, offset: VirtualOffset, chrom: &str) -> Result<ResolvedOffset> {
        if let Some(hit) = self.memo.get(&offset.as_u64()) {
            return Ok(ResolvedOffset::new(offset, hit.clone()));
        }

        let block = self.lookup(offset.real(), offset.bytes(), chrom)?;
        self.memo.insert(offset.as_u64(), block.clone());
        Ok(ResolvedOffset::new(offset, block))
    }

    fn lookup(&mut self, real: u64, bytes: u16, chrom: &str) -> Result<Option<BlockInfo>> {
        match self.data.as_mut() {
            Some(data) => Ok(Some(get_pos(data, real, bytes, Some(chrom), self.meta)?)),
            None => Ok(None),
        }
    }
}

/// Chunk start with the smallest first position, or the smallest real
/// offset when no chunk start could be resolved.
fn pick_bins_begin(bins: &[Bin]) -> Option<ResolvedOffset> {
    let begins = || bins.iter().filter(|b| !b.is_pseudo()).flat_map(|b| b.chunks.iter().map(|c| &c.begin));

    let mut best: Option<(u64, &ResolvedOffset)> = None;
    for offset in begins() {
        if let Some(pos) = offset.first_pos() {
            if best.is_none_or(|(p, _)| pos < p) {
                best = Some((pos, offset));
            }
        }
    }
    if best.is_none() {
        for offset in begins() {
            if best.is_none_or(|(r, _)| offset.real < r) {
                best = Some((offset.real, offset));
            }
        }
    }
    best.map(|(_, o)| o.clone())
}

/// Chunk end with the largest last position, or the largest real offset
/// when no chunk end could be resolved.
fn pick_bins_end(bins: &[Bin]) -> Option<ResolvedOffset> {
    let ends = || bins.iter().filter(|b| !b.is_pseudo()).flat_map(|b| b.chunks.iter().map(|c| &c.end));

    let mut best: Option<(u64, &ResolvedOffset)> = None;
    for offset in ends() {
        if let Some(pos) = offset.last_pos() {
            if best.is_none_or(|(p, _)| pos > p) {
                best = Some((pos, offset));
            }
        }
    }
    if best.is_none() {
        for offset in ends() {
            if best.is_none_or(|(r, _)| offset.real > r) {
                best = Some((offset.real, offset));
            }
        }
    }
    best.map(|(_, o)| o.clone())
}

///
/// Walk the blocks following `bins_end` while they still hold rows of
/// `chrom`. The bins of a reference may end before its true last block.
///
fn scan_tail<D: Read + Seek>(
    data: &mut D,
    bins_end: &ResolvedOffset,
    chrom: &str,
    meta: char,
) -> Result<Option<ResolvedOffset>> {
    let mut block_len = bins_end.block_len();
    let mut last_pos = bins_end.last_pos();
    let mut real = bins_end.real + block_len.unwrap_or(0);
    let mut last_block = None;
    let mut e = 0;

    while let (Some(len), Some(pos)) = (block_len, last_pos) {
        if len == 0 || pos == 0 {
            break;
        }

        let info = get_pos(data, real, 0, Some(chrom), meta)?;
        block_len = info.block_len;
        last_pos = info.last_pos;

        if let (Some(len), Some(pos)) = (block_len, last_pos) {
            if len > 0 && pos > 0 {
                debug!("TAIL {e} chrom {chrom} real {real} first_pos {:?} last_pos {pos} block_len {len}", info.first_pos);
                last_block = Some(ResolvedOffset::new(VirtualOffset::new(real, 0), Some(info)));
            }
        }

        real += block_len.unwrap_or(0);
        e += 1;
    }

    Ok(last_block)
}

fn read_header<R: Read>(fhd: &mut R) -> Result<Header> {
    let mut magic = [0u8; 4];
    fhd.read_exact(&mut magic).map_err(truncated("magic"))?;
    if &magic != TABIX_MAGIC {
        return Err(TabixError::Format(format!("invalid magic: {magic:02x?}")));
    }

    debug!("magic    Magic string                                 char[4]  TBI\\1");

    let n_ref = read_i32(fhd, "n_ref")?;
    let format = read_i32(fhd, "format")?;
    let col_seq = read_i32(fhd, "col_seq")?;
    let col_beg = read_i32(fhd, "col_beg")?;
    let col_end = read_i32(fhd, "col_end")?;
    let meta = read_i32(fhd, "meta")?;
    let skip = read_i32(fhd, "skip")?;
    let l_nm = read_i32(fhd, "l_nm")?;

    debug!("n_ref    # sequences                                  int32_t  {n_ref:>15}");
    debug!("format   Format (0: generic; 1: SAM; 2: VCF)          int32_t  {format:>15}");
    debug!("col_seq  Column for the sequence name                 int32_t  {col_seq:>15}");
    debug!("col_beg  Column for the start of a region             int32_t  {col_beg:>15}");
    debug!("col_end  Column for the end of a region               int32_t  {col_end:>15}");
    debug!("meta     Leading character for comment lines          int32_t  {meta:>15}");
    debug!("skip     # lines to skip at the beginning             int32_t  {skip:>15}");
    debug!("l_nm     Length of concatenated sequence names        int32_t  {l_nm:>15}");

    Header::validate_fields(n_ref, col_seq, col_beg, col_end, meta, skip, l_nm)?;
    let format = TabixFormat::try_from(format)?;

    let mut raw_names = vec![0u8; l_nm as usize];
    fhd.read_exact(&mut raw_names).map_err(truncated("names"))?;
    let names = Header::decode_names(n_ref, &raw_names)?;

    debug!("names    Concatenated names, each zero terminated     char[l_nm] [{}]", names.len());
    for name in &names {
        debug!("  - {name}");
    }

    Ok(Header {
        n_ref,
        format,
        col_seq,
        col_beg,
        col_end,
        // validated to [1, 256)
        meta: char::from(meta as u8),
        skip,
        l_nm,
        names,
    })
}

fn read_bin<R: Read, D: Read + Seek>(
    fhd: &mut R,
    resolver: &mut PositionResolver<D>,
    bin_n: usize,
    chrom: &str,
) -> Result<Bin> {
    let bin = fhd.read_u32::<LittleEndian>().map_err(truncated("bin"))?;
    let n_chunk = read_count(fhd, "n_chunk")?;

    debug!("    bin_n {}", bin_n + 1);
    debug!("      bin      Distinct bin number                    uint32_t {bin:>15}");
    debug!("      n_chunk  # chunks                               int32_t  {n_chunk:>15}");

    if bin > TABIX_PSEUDO_BIN {
        return Err(TabixError::Format(format!("bin number {bin} above {TABIX_PSEUDO_BIN}")));
    }

    let mut offsets = Vec::with_capacity(n_chunk * 2);
    for _ in 0..n_chunk * 2 {
        offsets.push(VirtualOffset::from(fhd.read_u64::<LittleEndian>().map_err(truncated("chunk"))?));
    }

    let mut chunks = Vec::with_capacity(n_chunk);
    for (chunk_n, pair) in offsets.chunks_exact(2).enumerate() {
        let (begin, end) = (pair[0], pair[1]);

        if !is_regular_bin(bin) {
            // counts of mapped/unmapped records, not file offsets
            chunks.push(Chunk {
                begin: ResolvedOffset::new(begin, None).with_chunk(bin_n, chunk_n),
                end: ResolvedOffset::new(end, None).with_chunk(bin_n, chunk_n),
            });
            continue;
        }

        if begin >= end || begin.real() > end.real() {
            return Err(TabixError::Format(format!(
                "chunk {chunk_n} of bin {bin} does not advance: begin {begin} end {end}"
            )));
        }

        let begin = resolver.resolve(begin, chrom)?.with_chunk(bin_n, chunk_n);
        let end = resolver.resolve(end, chrom)?.with_chunk(bin_n, chunk_n);

        trace!(
            "        chunk_n {} begin {}:{} first {:?} bin {:?} end {}:{} last {:?} block_len {:?}",
            chunk_n + 1,
            begin.real,
            begin.bytes,
            begin.first_pos(),
            begin.block.as_ref().and_then(|b| b.bin_pos),
            end.real,
            end.bytes,
            end.last_pos(),
            end.block_len()
        );

        chunks.push(Chunk { begin, end });
    }

    Ok(Bin { bin_n, bin, chunks })
}

fn read_reference<R: Read, D: Read + Seek>(
    fhd: &mut R,
    resolver: &mut PositionResolver<D>,
    ref_n: usize,
    name: &str,
) -> Result<Reference> {
    resolver.reset();
    let mut reference = Reference::new(ref_n, name.to_string());

    let n_bin = read_count(fhd, "n_bin")?;
    debug!("  ref_n {} ({name})", ref_n + 1);
    debug!("  n_bin    # distinct bins (for the binning index)    int32_t  {n_bin:>15}");

    for bin_n in 0..n_bin {
        reference.bins.push(read_bin(fhd, resolver, bin_n, name)?);
    }

    reference.bins_begin = pick_bins_begin(&reference.bins);
    reference.bins_end = pick_bins_end(&reference.bins);
    reference.first_block = reference.bins_begin.clone();
    reference.last_block = reference.bins_end.clone();

    if let (Some(data), Some(bins_end)) = (resolver.data.as_mut(), reference.bins_end.as_ref()) {
        if let Some(tail) = scan_tail(data, bins_end, name, resolver.meta)? {
            reference.last_block = Some(tail);
        }
    }

    let n_intv = read_count(fhd, "n_intv")?;
    debug!("  n_intv   # 16kb intervals (for the linear index)    int32_t  {n_intv:>15}");

    for intv_n in 0..n_intv {
        let ioff = VirtualOffset::from(fhd.read_u64::<LittleEndian>().map_err(truncated("linear index"))?);
        let entry = resolver.resolve(ioff, name)?;
        trace!(
            "    ioff {} real {} bytes {} block_len {:?} first {:?} last {:?}",
            intv_n + 1,
            entry.real,
            entry.bytes,
            entry.block_len(),
            entry.first_pos(),
            entry.last_pos()
        );
        reference.intvs.push(entry);
    }

    Ok(reference)
}

///
/// Decode a tabix index from any reader over the `.tbi` bytes.
///
/// # Arguments
///
/// - tbi: reader over the compressed `.tbi`
/// - data: the data file, when available, used to resolve every offset
///
pub fn read_tabix_from<R: Read, D: Read + Seek>(tbi: R, data: Option<D>) -> Result<TabixIndex> {
    let mut fhd = MultiGzDecoder::new(tbi);
    let header = read_header(&mut fhd)?;

    let mut resolver = PositionResolver::new(data, header.meta);
    if !resolver.has_data() {
        warn!("data file not available, offsets are kept without positions");
    }

    let mut refs = Vec::with_capacity(header.names.len());
    for (ref_n, name) in header.names.iter().enumerate() {
        refs.push(read_reference(&mut fhd, &mut resolver, ref_n, name)?);
    }

    let n_no_coor = match fhd.read_u64::<LittleEndian>() {
        Ok(n) => Some(n),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => None,
        Err(e) => return Err(e.into()),
    };
    debug!("n_no_coor (optional) # unmapped reads without coordinates set {n_no_coor:?}");

    Ok(TabixIndex::new(header, refs, n_no_coor))
}

///
/// Decode `<data>.tbi`, resolving offsets against `<data>` if it exists.
///
/// # Arguments
///
/// - path: the data file or its `.tbi`
///
pub fn read_tabix<P: AsRef<Path>>(path: P) -> Result<TabixIndex> {
    let paths = get_filenames(path);
    info!("reading {}", paths.tbi.display());

    let tbi = BufReader::new(File::open(&paths.tbi)?);
    let data = if paths.data.exists() {
        Some(BufReader::new(File::open(&paths.data)?))
    } else {
        warn!("{} does not exist", paths.data.display());
        None
    };

    let index = read_tabix_from(tbi, data)?;
    debug!("finished reading {}", paths.tbi.display());
    Ok(index)
}
