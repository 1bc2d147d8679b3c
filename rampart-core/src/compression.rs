//! LZ4 compression for audit trails.
//!
//! The backup store and restore engine keep bounded audit logs of every
//! capture and apply pass; entries are compressed so a busy workspace's
//! history stays cheap to hold.

use crate::error::{RampartError, RampartResult};

/// Compress raw bytes using LZ4.
pub fn compress_lz4(data: &[u8]) -> Vec<u8> {
    lz4_flex::compress_prepend_size(data)
}

/// Decompress LZ4-compressed bytes.
pub fn decompress_lz4(data: &[u8]) -> RampartResult<Vec<u8>> {
    lz4_flex::decompress_size_prepended(data)
        .map_err(|e| RampartError::Decompression(format!("LZ4 decompress: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lz4_roundtrip() {
        let data = b"workspace=ws1 containers=42 roles=7 taken_at=1700000000";
        let compressed = compress_lz4(data);
        let back = decompress_lz4(&compressed).unwrap();
        assert_eq!(data.as_slice(), back.as_slice());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(decompress_lz4(&[0xff, 0x01, 0x02]).is_err());
    }
}
