//! Index-dependent block content for write/verify passes.
//!
//! Every block starts with eight bytes holding `pattern ^ index_byte[k]` for
//! the little-endian bytes of the block index, and the remainder is filled
//! with the pattern byte. A read that lands on the wrong block therefore
//! fails verification even though the fill bytes match.

/// Length of the index-encoding prefix.
pub const INDEX_PREFIX_LEN: usize = 8;

pub fn index_prefix(pattern: u8, index: u64) -> [u8; INDEX_PREFIX_LEN] {
    index.to_le_bytes().map(|b| pattern ^ b)
}

/// Overwrite the whole of `buffer` with the content expected for block `index`.
pub fn fill_block(buffer: &mut [u8], pattern: u8, index: u64) {
    buffer.fill(pattern);
    stamp_index(buffer, pattern, index);
}

/// Rewrite only the index prefix. The rest of `buffer` must already hold
/// `pattern`, as left by [`fill_block`].
pub fn stamp_index(buffer: &mut [u8], pattern: u8, index: u64) {
    let prefix = index_prefix(pattern, index);
    let n = buffer.len().min(INDEX_PREFIX_LEN);
    buffer[..n].copy_from_slice(&prefix[..n]);
}

/// First differing byte as `(offset, expected, actual)`.
pub fn first_mismatch(expected: &[u8], actual: &[u8]) -> Option<(usize, u8, u8)> {
    expected
        .iter()
        .zip(actual)
        .position(|(e, a)| e != a)
        .map(|i| (i, expected[i], actual[i]))
}
