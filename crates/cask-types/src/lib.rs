//! Foundation types for the Cask local object storage engine.
//!
//! This crate provides the identity, addressing, and object-model types used
//! throughout the engine. Every other Cask crate depends on `cask-types`.
//!
//! # Key Types
//!
//! - [`ContainerId`] / [`ObjectId`] — Content-addressed identifiers (BLAKE3)
//! - [`Address`] — The universal storage key: `(ContainerId, ObjectId)`
//! - [`ShardId`] — Opaque shard identifier, stable for the process lifetime
//! - [`Object`] / [`ObjectHeader`] — Immutable content-addressed entity
//! - [`SplitInfo`] — Known linkage of a split (multi-part) object
//!
//! Content addressing is the caller's responsibility: the engine stores what
//! it is given and never verifies that an ID matches a payload hash.

pub mod address;
pub mod attribute;
pub mod checksum;
pub mod error;
pub mod id;
pub mod object;
pub mod split;

pub use address::Address;
pub use attribute::{Attribute, EXPIRATION_EPOCH};
pub use checksum::{Checksum, ChecksumAlgorithm};
pub use error::TypeError;
pub use id::{ContainerId, ObjectId, OwnerId, ShardId};
pub use object::{Object, ObjectHeader, ObjectType};
pub use split::{SplitHeader, SplitId, SplitInfo};
