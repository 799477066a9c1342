use serde::{Deserialize, Serialize};

use crate::errors::{Result, TabixError};

/// File format code stored in a tabix header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum TabixFormat {
    Sam = 1,
    Vcf = 2,
}

impl TryFrom<i32> for TabixFormat {
    type Error = TabixError;

    fn try_from(code: i32) -> Result<Self> {
        match code {
            1 => Ok(TabixFormat::Sam),
            2 => Ok(TabixFormat::Vcf),
            _ => Err(TabixError::Format(format!(
                "unsupported format code {code}, expected 1 (SAM) or 2 (VCF)"
            ))),
        }
    }
}

impl From<TabixFormat> for i32 {
    fn from(format: TabixFormat) -> Self {
        format as i32
    }
}

///
/// Fixed part of a `.tbi` file plus the decoded sequence names.
///
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub n_ref: i32,
    pub format: TabixFormat,
    pub col_seq: i32,
    pub col_beg: i32,
    pub col_end: i32,
    pub meta: char,
    pub skip: i32,
    pub l_nm: i32,
    pub names: Vec<String>,
}

fn check_range(name: &str, value: i32, min: i32, max_exclusive: i32) -> Result<()> {
    if value < min || value >= max_exclusive {
        return Err(TabixError::Format(format!(
            "{name} = {value} outside of [{min}, {max_exclusive})"
        )));
    }
    Ok(())
}

impl Header {
    ///
    /// Check the raw header fields against the ranges tabix allows.
    ///
    pub fn validate_fields(
        n_ref: i32,
        col_seq: i32,
        col_beg: i32,
        col_end: i32,
        meta: i32,
        skip: i32,
        l_nm: i32,
    ) -> Result<()> {
        check_range("n_ref", n_ref, 1, i32::MAX)?;
        check_range("col_seq", col_seq, 0, 10)?;
        check_range("col_beg", col_beg, 0, 10)?;
        check_range("col_end", col_end, 0, 10)?;
        check_range("meta", meta, 1, 256)?;
        check_range("skip", skip, 0, 1 << 20)?;
        check_range("l_nm", l_nm, 1, 1 << 20)?;
        Ok(())
    }

    /// Split the NUL-terminated name block and check it against `n_ref`.
    pub fn decode_names(n_ref: i32, raw: &[u8]) -> Result<Vec<String>> {
        let names = raw
            .split(|&b| b == 0)
            .filter(|n| !n.is_empty())
            .map(|n| {
                String::from_utf8(n.to_vec())
                    .map_err(|e| TabixError::Format(format!("sequence name is not UTF-8: {e}")))
            })
            .collect::<Result<Vec<String>>>()?;

        if names.len() != n_ref as usize {
            return Err(TabixError::Format(format!(
                "name block holds {} names but n_ref is {}",
                names.len(),
                n_ref
            )));
        }

        Ok(names)
    }
}
