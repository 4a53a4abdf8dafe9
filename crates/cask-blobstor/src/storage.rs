use std::path::Path;

use cask_types::Address;

use crate::error::BlobResult;

/// Capability set of a single payload sub-storage.
///
/// All implementations must satisfy these invariants:
/// - A stored payload is returned byte-identical by `get`.
/// - `put` to an existing address overwrites; it never duplicates.
/// - `delete` of an absent address fails `NotFound` at this level; the
///   tiering layer above makes deletion no-op-safe across the set.
/// - All I/O errors are propagated, never silently ignored.
///
/// Concrete variants are chosen at configuration time by an ordered
/// predicate list; nothing above this trait inspects the concrete type.
pub trait SubStorage: Send + Sync {
    /// Prepare filesystem state (create directories, open handles).
    fn open(&self) -> BlobResult<()>;

    /// Recover in-memory state from disk. Called once after `open`.
    fn init(&self) -> BlobResult<()>;

    /// Flush and release resources.
    fn close(&self) -> BlobResult<()>;

    /// Store payload bytes under the address, overwriting any previous value.
    fn put(&self, address: &Address, data: &[u8]) -> BlobResult<()>;

    /// Read the payload stored under the address.
    fn get(&self, address: &Address) -> BlobResult<Vec<u8>>;

    /// Check whether the address is stored here.
    fn exists(&self, address: &Address) -> BlobResult<bool>;

    /// Remove the payload stored under the address.
    fn delete(&self, address: &Address) -> BlobResult<()>;

    /// Short human-readable kind tag for logs.
    fn kind(&self) -> &'static str;

    /// Root path of this sub-storage.
    fn path(&self) -> &Path;
}
