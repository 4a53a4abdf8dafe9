//! Tiered payload byte store for the Cask local object storage engine.
//!
//! A [`BlobStor`] persists raw payload bytes across an ordered list of
//! sub-storages, each guarded by a selection predicate; the last entry acts
//! as the default. Two sub-storage kinds are provided:
//!
//! - [`BucketTree`] — groups many small payloads into fixed-capacity
//!   append-only bucket files in a shallow directory tree, minimizing
//!   per-object filesystem overhead.
//! - [`FsTree`] — one file per object in a fanned-out directory tree, for
//!   large payloads where a dedicated file is cheap.
//!
//! # Design Rules
//!
//! 1. Writes go to exactly one sub-storage, chosen by the first matching
//!    predicate at configuration time — never by runtime type inspection.
//! 2. Reads and existence checks scan tiers in order and favor
//!    availability: a corrupted tier is remembered (first error) but never
//!    hides payloads that live elsewhere.
//! 3. Payload compression is transparent and sniffed on read, so stores
//!    written with different compression settings stay readable.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod blobstor;
pub mod bucket;
pub mod compress;
pub mod error;
pub mod fstree;
pub mod storage;

pub use blobstor::{BlobStor, BlobStorConfig, Policy, SubStorageEntry};
pub use bucket::{BucketTree, BucketTreeConfig};
pub use error::{BlobError, BlobResult};
pub use fstree::{FsTree, FsTreeConfig};
pub use storage::SubStorage;
