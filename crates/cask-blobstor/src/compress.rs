//! Transparent zstd payload compression.
//!
//! Compression is applied above the sub-storages, so every kind stores the
//! same bytes. Reads sniff the zstd magic, which keeps mixed stores (written
//! with compression toggled on and off over time) readable either way.

use cask_types::Address;

use crate::error::{BlobError, BlobResult};

/// zstd frame magic number, little-endian on disk.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression level; matches the pack-file writer's default.
const LEVEL: i32 = 3;

/// Compress a payload for storage.
pub fn compress(data: &[u8]) -> BlobResult<Vec<u8>> {
    Ok(zstd::encode_all(data, LEVEL)?)
}

/// Undo storage compression if the stored bytes carry the zstd magic.
pub fn decompress(address: &Address, data: Vec<u8>) -> BlobResult<Vec<u8>> {
    if data.len() < ZSTD_MAGIC.len() || data[..4] != ZSTD_MAGIC {
        return Ok(data);
    }
    zstd::decode_all(data.as_slice()).map_err(|_| BlobError::Decompression(*address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cask_types::{ContainerId, ObjectId};

    fn test_address() -> Address {
        Address::new(ContainerId::from_bytes(b"c"), ObjectId::from_bytes(b"o"))
    }

    #[test]
    fn roundtrip() {
        let payload = b"compressible compressible compressible".to_vec();
        let stored = compress(&payload).unwrap();
        let restored = decompress(&test_address(), stored).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn uncompressed_passes_through() {
        let payload = b"plain bytes".to_vec();
        let restored = decompress(&test_address(), payload.clone()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn truncated_frame_is_an_error() {
        let payload = b"some payload that compresses".to_vec();
        let mut stored = compress(&payload).unwrap();
        stored.truncate(6);
        let result = decompress(&test_address(), stored);
        assert!(matches!(result, Err(BlobError::Decompression(_))));
    }
}
