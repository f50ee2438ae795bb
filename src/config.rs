use std::path::PathBuf;

use crate::error::{Result, ScanError};

pub const DEFAULT_BLOCK_SIZE: u64 = 4 * 1024 * 1024;
pub const DEFAULT_PATTERNS: &[u8] = &[0x00];

/// Everything a scan needs besides the device itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub block_size: u64,
    /// One write pass and one read pass per entry, in order.
    pub patterns: Vec<u8>,
    /// Per-block CSV export is disabled when `None`.
    pub outfile_prefix: Option<PathBuf>,
    pub verbosity: u8,
    pub direct_io: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            patterns: DEFAULT_PATTERNS.to_vec(),
            outfile_prefix: None,
            verbosity: 0,
            direct_io: false,
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(ScanError::Config("block size must be greater than 0".to_string()));
        }
        if usize::try_from(self.block_size).is_err() {
            return Err(ScanError::Config(format!("block size {} too large", self.block_size)));
        }
        if self.patterns.is_empty() {
            return Err(ScanError::Config("at least one pattern is required".to_string()));
        }
        Ok(())
    }
}

pub fn parse_size_with_suffix(s: &str) -> std::result::Result<u64, String> {
    let s_trimmed = s.trim();
    if s_trimmed.is_empty() { return Err("Input string is empty".to_string()); }
    let first_non_digit_idx = s_trimmed.find(|c: char| !c.is_ascii_digit());
    let (num_str_candidate, suffix_candidate_orig) = match first_non_digit_idx {
        Some(idx) => {
            if idx == 0 { return Err(format!("Invalid format: missing numeric value in '{}'", s_trimmed)); }
            s_trimmed.split_at(idx)
        }
        None => (s_trimmed, ""),
    };
    let num = num_str_candidate.parse::<u64>().map_err(|_| format!("Invalid number: '{}' in '{}'", num_str_candidate, s_trimmed))?;
    let suffix = suffix_candidate_orig.trim_start().to_uppercase();
    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        "T" | "TB" | "TIB" => 1024 * 1024 * 1024 * 1024,
        _ => return Err(format!("Unknown or misplaced size suffix: '{}' in '{}'", suffix_candidate_orig, s_trimmed)),
    };
    num.checked_mul(multiplier).ok_or_else(|| format!("Size too large: '{}'", s_trimmed))
}

/// Comma-separated hexadecimal bytes, e.g. `55,aa,00,ff`.
pub fn parse_patterns(s: &str) -> std::result::Result<Vec<u8>, String> {
    let patterns = s
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            let digits = p.strip_prefix("0x").or_else(|| p.strip_prefix("0X")).unwrap_or(p);
            u8::from_str_radix(digits, 16).map_err(|_| format!("Invalid pattern byte: '{}'", p))
        })
        .collect::<std::result::Result<Vec<u8>, String>>()?;
    if patterns.is_empty() {
        return Err(format!("No pattern given in '{}'", s));
    }
    Ok(patterns)
}
