//! Partitioning of a device into fixed-size blocks.

use crate::error::{Result, ScanError};

/// Block layout of one device, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGeometry {
    size_bytes: u64,
    block_size: u64,
    num_blocks: u64,
}

impl BlockGeometry {
    /// `label` only feeds the error message.
    pub fn new(label: &str, size_bytes: u64, block_size: u64) -> Result<Self> {
        if size_bytes == 0 {
            return Err(ScanError::InvalidDevice {
                path: label.to_string(),
                reason: "cannot determine size".to_string(),
            });
        }
        if block_size == 0 {
            return Err(ScanError::InvalidDevice {
                path: label.to_string(),
                reason: "block size must be greater than 0".to_string(),
            });
        }
        Ok(Self {
            size_bytes,
            block_size,
            num_blocks: size_bytes.div_ceil(block_size),
        })
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    /// Bytes covered by `num_blocks` full blocks, i.e. the size rounded up.
    pub fn bytes_per_pass(&self) -> u64 {
        self.num_blocks * self.block_size
    }

    /// Byte offset of block `index`.
    pub fn offset(&self, index: u64) -> u64 {
        index * self.block_size
    }

    /// Number of bytes transferred for block `index`. Only the last block may be short.
    pub fn access_len(&self, index: u64) -> usize {
        let tail = self.size_bytes % self.block_size;
        if index + 1 == self.num_blocks && tail != 0 {
            tail as usize
        } else {
            self.block_size as usize
        }
    }
}

/// Largest power of two dividing `n` (0 for 0).
pub fn largest_power_of_two_factor(n: u64) -> u64 {
    if n == 0 {
        0
    } else {
        1 << n.trailing_zeros()
    }
}
