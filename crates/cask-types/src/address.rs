use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::{ContainerId, ObjectId};

/// The universal storage key: `(ContainerId, ObjectId)`.
///
/// Immutable and globally unique. Used for storage, routing, and indexing
/// throughout the engine.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    /// The container holding the object.
    pub container: ContainerId,
    /// The object within the container.
    pub object: ObjectId,
}

impl Address {
    /// Create an address from its parts.
    pub fn new(container: ContainerId, object: ObjectId) -> Self {
        Self { container, object }
    }

    /// The 64-byte key form: container bytes followed by object bytes.
    ///
    /// Index keys and routing weights are derived from this form.
    pub fn to_key_bytes(&self) -> [u8; 64] {
        let mut key = [0u8; 64];
        key[..32].copy_from_slice(self.container.as_bytes());
        key[32..].copy_from_slice(self.object.as_bytes());
        key
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Address({}/{})",
            self.container.short_hex(),
            self.object.short_hex()
        )
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.object)
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cnr, obj) = s
            .split_once('/')
            .ok_or_else(|| TypeError::InvalidAddress(s.to_string()))?;
        Ok(Self {
            container: ContainerId::from_hex(cnr)?,
            object: ObjectId::from_hex(obj)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_address() -> Address {
        Address::new(
            ContainerId::from_bytes(b"container"),
            ObjectId::from_bytes(b"object"),
        )
    }

    #[test]
    fn display_parse_roundtrip() {
        let addr = test_address();
        let s = addr.to_string();
        let parsed: Address = s.parse().unwrap();
        assert_eq!(addr, parsed);
    }

    #[test]
    fn parse_rejects_missing_separator() {
        let result = "deadbeef".parse::<Address>();
        assert!(matches!(result, Err(TypeError::InvalidAddress(_))));
    }

    #[test]
    fn key_bytes_concatenates_parts() {
        let addr = test_address();
        let key = addr.to_key_bytes();
        assert_eq!(&key[..32], addr.container.as_bytes());
        assert_eq!(&key[32..], addr.object.as_bytes());
    }

    #[test]
    fn addresses_with_same_parts_are_equal() {
        assert_eq!(test_address(), test_address());
    }

    #[test]
    fn serde_roundtrip() {
        let addr = test_address();
        let json = serde_json::to_string(&addr).unwrap();
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, parsed);
    }
}
