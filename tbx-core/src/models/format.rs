use std::fmt::{self, Display};
use std::str::FromStr;

use crate::consts::{TBJ_EXTENSION, TBJ_FORMAT_NAME, TBK_EXTENSION, TBK_FORMAT_NAME};

/// Persisted index flavours.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IndexFormat {
    /// Coordinate-enriched JSON derived from a `.tbi`.
    #[default]
    Tbj,
    /// Compact binary index built by scanning every block of the data file.
    Tbk,
}

impl IndexFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            IndexFormat::Tbj => TBJ_EXTENSION,
            IndexFormat::Tbk => TBK_EXTENSION,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IndexFormat::Tbj => TBJ_FORMAT_NAME,
            IndexFormat::Tbk => TBK_FORMAT_NAME,
        }
    }
}

impl FromStr for IndexFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tbj" => Ok(IndexFormat::Tbj),
            "tbk" => Ok(IndexFormat::Tbk),
            _ => Err(format!("Invalid index format: {s}. Valid options are TBJ or TBK")),
        }
    }
}

impl Display for IndexFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
