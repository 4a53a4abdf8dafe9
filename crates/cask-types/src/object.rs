use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::attribute::{Attribute, EXPIRATION_EPOCH};
use crate::checksum::Checksum;
use crate::id::OwnerId;
use crate::split::SplitHeader;

/// The kind of a stored object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    /// Ordinary payload-carrying object.
    Regular,
    /// An object representing the removal of other objects.
    Tombstone,
    /// An object protecting other objects from removal.
    Lock,
}

/// Metadata of a stored object, independent of its payload bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    /// Object kind.
    pub object_type: ObjectType,
    /// Owner of the object.
    pub owner: OwnerId,
    /// Format version the object was created with.
    pub version: u32,
    /// Payload length in bytes.
    pub payload_size: u64,
    /// Checksum of the payload.
    pub payload_checksum: Checksum,
    /// Optional homomorphic payload digest.
    pub homomorphic_checksum: Option<Checksum>,
    /// User and system attributes.
    pub attributes: Vec<Attribute>,
    /// Split linkage, present on parts of a split object.
    pub split: Option<SplitHeader>,
}

impl ObjectHeader {
    /// The expiration epoch from the well-known attribute, if present and
    /// parsable. Unparsable values are treated as absent.
    pub fn expiration_epoch(&self) -> Option<u64> {
        self.attributes
            .iter()
            .find(|a| a.key == EXPIRATION_EPOCH)
            .and_then(|a| a.value.parse().ok())
    }

    /// Look up an attribute value by key.
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// An immutable content-addressed entity: address, header, payload.
///
/// The engine does not verify that the object id matches a hash of the
/// content; that contract belongs to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Object {
    /// The object's address.
    pub address: Address,
    /// The object's metadata.
    pub header: ObjectHeader,
    /// The payload bytes.
    pub payload: Vec<u8>,
}

impl Object {
    /// Create an object, filling in the payload size and checksum.
    pub fn new(address: Address, mut header: ObjectHeader, payload: Vec<u8>) -> Self {
        header.payload_size = payload.len() as u64;
        header.payload_checksum = Checksum::blake3(&payload);
        Self {
            address,
            header,
            payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{ContainerId, ObjectId};

    fn test_header() -> ObjectHeader {
        ObjectHeader {
            object_type: ObjectType::Regular,
            owner: OwnerId::from_bytes(b"owner"),
            version: 1,
            payload_size: 0,
            payload_checksum: Checksum::blake3(b""),
            homomorphic_checksum: None,
            attributes: Vec::new(),
            split: None,
        }
    }

    #[test]
    fn new_fills_size_and_checksum() {
        let addr = Address::new(
            ContainerId::from_bytes(b"cnr"),
            ObjectId::from_bytes(b"obj"),
        );
        let obj = Object::new(addr, test_header(), b"hello".to_vec());
        assert_eq!(obj.header.payload_size, 5);
        assert_eq!(obj.header.payload_checksum, Checksum::blake3(b"hello"));
    }

    #[test]
    fn expiration_epoch_parses_attribute() {
        let mut header = test_header();
        header.attributes.push(Attribute::new(EXPIRATION_EPOCH, "42"));
        assert_eq!(header.expiration_epoch(), Some(42));
    }

    #[test]
    fn expiration_epoch_absent_without_attribute() {
        assert_eq!(test_header().expiration_epoch(), None);
    }

    #[test]
    fn expiration_epoch_ignores_garbage() {
        let mut header = test_header();
        header
            .attributes
            .push(Attribute::new(EXPIRATION_EPOCH, "not-a-number"));
        assert_eq!(header.expiration_epoch(), None);
    }

    #[test]
    fn attribute_lookup() {
        let mut header = test_header();
        header.attributes.push(Attribute::new("color", "red"));
        assert_eq!(header.attribute("color"), Some("red"));
        assert_eq!(header.attribute("shape"), None);
    }
}
