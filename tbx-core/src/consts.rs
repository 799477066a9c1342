pub const GZIP_MAGIC: &[u8; 2] = b"\x1F\x8B";

pub const TABIX_FORMAT_NAME: &str = "TBI";
pub const TABIX_EXTENSION: &str = ".tbi";
pub const TABIX_MAGIC: &[u8; 4] = b"TBI\x01";
pub const TABIX_BLOCK_BYTES_MASK: u64 = 0xFFFF;

/// Largest regular bin number of the UCSC binning scheme, `((1 << 18) - 1) / 7`.
pub const TABIX_MAX_BIN: u32 = ((1 << 18) - 1) / 7;
/// htslib writes a metadata pseudo-bin right after the last regular bin.
pub const TABIX_PSEUDO_BIN: u32 = TABIX_MAX_BIN + 1;

pub const TBJ_FORMAT_NAME: &str = "TBJ";
pub const TBJ_FORMAT_VER: u32 = 5;
pub const TBJ_EXTENSION: &str = ".tbj";

pub const TBK_FORMAT_NAME: &str = "TBK";
pub const TBK_FORMAT_VER: i64 = 1;
pub const TBK_EXTENSION: &str = ".tbk";

/// samtools format specs: https://samtools.github.io/hts-specs/SAMv1.pdf
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Trailer of a `.tbk` file.
pub const TBK_EOF: [u8; 28] = BGZF_EOF;

pub const DEFAULT_COMMENT_CHAR: char = '#';

pub struct TabixDefaults;

impl TabixDefaults {
    pub const OVERWRITE: bool = true;
    pub const COMPRESS: bool = true;
}
