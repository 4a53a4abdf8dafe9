use serde::{Deserialize, Serialize};

/// Supported checksum algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChecksumAlgorithm {
    /// BLAKE3 payload digest.
    Blake3,
    /// Homomorphic digest (Tillich-Zemor family); computed by callers,
    /// opaque to the engine.
    HomomorphicTz,
}

/// A payload checksum: algorithm plus digest bytes.
///
/// The engine stores checksums verbatim and never recomputes or verifies
/// them; they travel with the header for callers that do.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksum {
    /// The digest algorithm.
    pub algorithm: ChecksumAlgorithm,
    /// The digest bytes.
    pub value: Vec<u8>,
}

impl Checksum {
    /// Compute a BLAKE3 checksum over the given payload.
    pub fn blake3(payload: &[u8]) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::Blake3,
            value: blake3::hash(payload).as_bytes().to_vec(),
        }
    }

    /// Wrap a caller-computed homomorphic digest.
    pub fn homomorphic(value: Vec<u8>) -> Self {
        Self {
            algorithm: ChecksumAlgorithm::HomomorphicTz,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_is_deterministic() {
        let a = Checksum::blake3(b"payload");
        let b = Checksum::blake3(b"payload");
        assert_eq!(a, b);
        assert_eq!(a.value.len(), 32);
    }

    #[test]
    fn different_payloads_differ() {
        assert_ne!(Checksum::blake3(b"a"), Checksum::blake3(b"b"));
    }
}
