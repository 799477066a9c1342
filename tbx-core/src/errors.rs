use thiserror::Error;

#[derive(Error, Debug)]
pub enum TabixError {
    /// Bad magic, unsupported format code or malformed BGZF extra field.
    #[error("Invalid format: {0}")]
    Format(String),

    /// Length, checksum or digest mismatch. The file is corrupted or truncated.
    #[error("Integrity check failed: {0}")]
    Integrity(String),

    /// Non-numeric position column.
    #[error("Error parsing position: {0}")]
    Parse(String),

    /// Unknown chromosome or inverted query range.
    #[error("Invalid range: {0}")]
    Range(String),

    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, TabixError>;
