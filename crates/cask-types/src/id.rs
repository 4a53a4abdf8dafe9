use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

macro_rules! content_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// Compute an id from raw bytes (BLAKE3).
            pub fn from_bytes(data: &[u8]) -> Self {
                Self(*blake3::hash(data).as_bytes())
            }

            /// Create an id from a pre-computed 32-byte hash.
            pub fn from_hash(hash: [u8; 32]) -> Self {
                Self(hash)
            }

            /// The null id (all zeros). Represents "no id".
            pub const fn null() -> Self {
                Self([0u8; 32])
            }

            /// Returns `true` if this is the null id.
            pub fn is_null(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// The raw 32-byte hash.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            /// Hex-encoded string representation.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Short hex representation (first 8 characters).
            pub fn short_hex(&self) -> String {
                hex::encode(&self.0[..4])
            }

            /// Parse from a hex string.
            pub fn from_hex(s: &str) -> Result<Self, TypeError> {
                let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
                if bytes.len() != 32 {
                    return Err(TypeError::InvalidLength {
                        expected: 32,
                        actual: bytes.len(),
                    });
                }
                let mut arr = [0u8; 32];
                arr.copy_from_slice(&bytes);
                Ok(Self(arr))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.short_hex())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl From<$name> for [u8; 32] {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

content_id! {
    /// Identifier of a storage container.
    ///
    /// Containers group objects under one namespace; the container id is part
    /// of every [`Address`](crate::Address) and prefixes all index keys.
    ContainerId
}

content_id! {
    /// Content-addressed identifier of a single object within a container.
    ///
    /// Computed by callers as the BLAKE3 hash of the object's content; the
    /// engine treats it as opaque.
    ObjectId
}

content_id! {
    /// Identifier of the user owning an object.
    OwnerId
}

/// Opaque identifier of a shard.
///
/// Assigned at shard construction and stable for the shard's process
/// lifetime. The engine uses it as the routing tie-break domain and as the
/// bookkeeping key for pools and error counters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(Uuid);

impl ShardId {
    /// Generate a fresh shard id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    /// The raw identifier bytes, used as the rendezvous-hash tie-break key.
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardId({})", self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_bytes_is_deterministic() {
        let data = b"hello world";
        let id1 = ObjectId::from_bytes(data);
        let id2 = ObjectId::from_bytes(data);
        assert_eq!(id1, id2);
    }

    #[test]
    fn different_data_produces_different_ids() {
        let id1 = ObjectId::from_bytes(b"hello");
        let id2 = ObjectId::from_bytes(b"world");
        assert_ne!(id1, id2);
    }

    #[test]
    fn null_is_all_zeros() {
        let null = ContainerId::null();
        assert!(null.is_null());
        assert_eq!(null.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn hex_roundtrip() {
        let id = ObjectId::from_bytes(b"test");
        let hex = id.to_hex();
        let parsed = ObjectId::from_hex(&hex).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn from_hex_rejects_bad_length() {
        let result = ObjectId::from_hex("abcd");
        assert!(matches!(result, Err(TypeError::InvalidLength { .. })));
    }

    #[test]
    fn display_is_full_hex() {
        let id = ContainerId::from_bytes(b"test");
        let display = format!("{id}");
        assert_eq!(display.len(), 64);
        assert_eq!(display, id.to_hex());
    }

    #[test]
    fn serde_roundtrip() {
        let id = ObjectId::from_bytes(b"serde test");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ObjectId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn ordering_is_consistent() {
        let id1 = ObjectId::from_hash([0; 32]);
        let id2 = ObjectId::from_hash([1; 32]);
        assert!(id1 < id2);
    }

    #[test]
    fn shard_ids_are_unique() {
        let a = ShardId::generate();
        let b = ShardId::generate();
        assert_ne!(a, b);
    }
}
