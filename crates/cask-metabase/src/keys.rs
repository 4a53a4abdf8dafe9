//! Key encodings for the metabase trees.
//!
//! All keys are prefixed with the 32-byte container id so that a container's
//! records form one contiguous range in the ordered store.

use cask_types::{Address, ContainerId, ObjectId};

/// Key of an address-keyed record: container bytes then object bytes.
pub(crate) fn address_key(address: &Address) -> [u8; 64] {
    address.to_key_bytes()
}

/// Decode an address key produced by [`address_key`].
pub(crate) fn address_from_key(key: &[u8]) -> Option<Address> {
    if key.len() != 64 {
        return None;
    }
    let mut cnr = [0u8; 32];
    let mut obj = [0u8; 32];
    cnr.copy_from_slice(&key[..32]);
    obj.copy_from_slice(&key[32..]);
    Some(Address::new(
        ContainerId::from_hash(cnr),
        ObjectId::from_hash(obj),
    ))
}

/// Range prefix covering every address-keyed record of a container.
pub(crate) fn container_prefix(container: &ContainerId) -> &[u8; 32] {
    container.as_bytes()
}

/// Key of one attribute index entry:
/// `container ++ attr-key ++ 0x00 ++ attr-value ++ 0x00 ++ object-id`.
///
/// The object id is the fixed-size suffix, so entries for one
/// `(container, key, value)` triple form a contiguous range and the id is
/// recovered from the tail without parsing the middle.
pub(crate) fn attribute_key(
    container: &ContainerId,
    attr_key: &str,
    attr_value: &str,
    object: &ObjectId,
) -> Vec<u8> {
    let mut key = attribute_prefix(container, attr_key, attr_value);
    key.extend_from_slice(object.as_bytes());
    key
}

/// Range prefix of [`attribute_key`] without the object id.
pub(crate) fn attribute_prefix(
    container: &ContainerId,
    attr_key: &str,
    attr_value: &str,
) -> Vec<u8> {
    let mut key =
        Vec::with_capacity(32 + attr_key.len() + attr_value.len() + 2 + 32);
    key.extend_from_slice(container.as_bytes());
    key.extend_from_slice(attr_key.as_bytes());
    key.push(0);
    key.extend_from_slice(attr_value.as_bytes());
    key.push(0);
    key
}

/// Recover the object id from the tail of an attribute index key.
pub(crate) fn object_from_attribute_key(key: &[u8]) -> Option<ObjectId> {
    if key.len() < 32 + 2 + 32 {
        return None;
    }
    let mut obj = [0u8; 32];
    obj.copy_from_slice(&key[key.len() - 32..]);
    Some(ObjectId::from_hash(obj))
}
