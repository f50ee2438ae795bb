use std::io;
use std::path::PathBuf;

use crate::plan::Direction;

/// Conditions that abort the whole run.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("invalid device '{path}': {reason}")]
    InvalidDevice { path: String, reason: String },

    #[error("error opening '{path}' for {direction} ({source})")]
    DeviceOpen {
        path: String,
        direction: Direction,
        #[source]
        source: io::Error,
    },

    #[error("error while writing block data to '{}' ({source})", .path.display())]
    OutputFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// A single block failed. Counted and reported, never fatal.
#[derive(Debug, thiserror::Error)]
pub enum BlockFault {
    #[error("{direction} error: {source}")]
    Io {
        direction: Direction,
        #[source]
        source: io::Error,
    },

    #[error("data error: expected {expected:#04x} and got {actual:#04x} at byte {offset}")]
    Mismatch { offset: usize, expected: u8, actual: u8 },
}

pub type Result<T> = std::result::Result<T, ScanError>;
