//! Shared helpers for the in-crate tests.

use std::sync::Arc;
use std::time::Duration;

use cask_types::{
    Address, Attribute, Checksum, ContainerId, Object, ObjectHeader, ObjectId, ObjectType,
    OwnerId, SplitHeader, SplitId, EXPIRATION_EPOCH,
};
use tempfile::TempDir;

use crate::db::{Metabase, MetabaseConfig};
use crate::epoch::FixedEpoch;

/// Epoch the expiration tests pivot around.
pub(crate) const TEST_EPOCH: u64 = 100;

/// Open a metabase in the temp dir with a short batch window.
pub(crate) fn new_db(dir: &TempDir, epoch: u64) -> Metabase {
    let config = MetabaseConfig::new(dir.path().join("meta"))
        .with_max_batch_size(16)
        .with_max_batch_delay(Duration::from_millis(2));
    Metabase::open(config, Arc::new(FixedEpoch(epoch))).unwrap()
}

pub(crate) fn generate_object(seed: &[u8]) -> Object {
    generate_object_in(&ContainerId::from_bytes(seed), seed)
}

pub(crate) fn generate_object_in(container: &ContainerId, seed: &[u8]) -> Object {
    let header = ObjectHeader {
        object_type: ObjectType::Regular,
        owner: OwnerId::from_bytes(b"test-owner"),
        version: 1,
        payload_size: 0,
        payload_checksum: Checksum::blake3(b""),
        homomorphic_checksum: None,
        attributes: Vec::new(),
        split: None,
    };
    let address = Address::new(*container, ObjectId::from_bytes(seed));
    Object::new(address, header, seed.to_vec())
}

pub(crate) fn add_attribute(object: &mut Object, key: &str, value: &str) {
    object.header.attributes.push(Attribute::new(key, value));
}

pub(crate) fn set_expiration(object: &mut Object, epoch: u64) {
    object
        .header
        .attributes
        .retain(|a| a.key != EXPIRATION_EPOCH);
    object
        .header
        .attributes
        .push(Attribute::new(EXPIRATION_EPOCH, epoch.to_string()));
}

/// A split object: the parent's address plus its last part (carrying the
/// parent header) and link part (carrying the sibling list).
pub(crate) fn split_parts(container: &ContainerId) -> (Address, Object, Object) {
    let parent = generate_object_in(container, b"split-parent");
    let split_id = SplitId::generate();

    let mut last = generate_object_in(container, b"split-last-part");
    last.header.split = Some(SplitHeader {
        parent: Some(parent.address.object),
        parent_header: Some(Box::new(parent.header.clone())),
        split_id: Some(split_id),
        children: Vec::new(),
    });

    let mut link = generate_object_in(container, b"split-link-part");
    link.header.split = Some(SplitHeader {
        parent: Some(parent.address.object),
        parent_header: None,
        split_id: Some(split_id),
        children: vec![
            ObjectId::from_bytes(b"part-1"),
            ObjectId::from_bytes(b"part-2"),
            last.address.object,
        ],
    });

    (parent.address, last, link)
}
