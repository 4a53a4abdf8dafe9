//! Policy-tiered payload store composed of ordered sub-storages.

use std::path::PathBuf;

use cask_types::{Address, Object};
use tracing::{debug, info, warn};

use crate::compress;
use crate::error::{BlobError, BlobResult};
use crate::storage::SubStorage;

/// Predicate deciding whether a sub-storage takes a given object.
pub type Policy = Box<dyn Fn(&Object) -> bool + Send + Sync>;

/// One tier: a sub-storage plus the predicate selecting objects for it.
///
/// An entry with no policy accepts everything; the last entry conventionally
/// has none and acts as the default tier.
pub struct SubStorageEntry {
    /// The backing store.
    pub storage: Box<dyn SubStorage>,
    /// Selection predicate; `None` accepts every object.
    pub policy: Option<Policy>,
}

impl SubStorageEntry {
    /// A tier selected by the given predicate.
    pub fn new(storage: Box<dyn SubStorage>, policy: Policy) -> Self {
        Self {
            storage,
            policy: Some(policy),
        }
    }

    /// The default tier, accepting everything.
    pub fn default_tier(storage: Box<dyn SubStorage>) -> Self {
        Self {
            storage,
            policy: None,
        }
    }

    fn matches(&self, object: &Object) -> bool {
        match &self.policy {
            Some(policy) => policy(object),
            None => true,
        }
    }
}

/// Configuration for a [`BlobStor`].
#[derive(Clone, Debug, Default)]
pub struct BlobStorConfig {
    /// Compress payloads before handing them to sub-storages.
    pub compress: bool,
}

/// Tiered payload byte store.
///
/// Routes each payload to the first sub-storage whose predicate matches and
/// answers reads by scanning the tiers in order. A corrupted tier does not
/// hide objects that live elsewhere: scans remember the first error but keep
/// going, surfacing the error only when no tier could answer.
pub struct BlobStor {
    storages: Vec<SubStorageEntry>,
    config: BlobStorConfig,
}

impl BlobStor {
    /// Create a store over the given ordered tiers.
    ///
    /// # Panics
    ///
    /// Panics if `storages` is empty; a payload store with no backing tier
    /// is a construction-time misuse.
    pub fn new(storages: Vec<SubStorageEntry>, config: BlobStorConfig) -> Self {
        assert!(
            !storages.is_empty(),
            "blobstor requires at least one sub-storage"
        );
        Self { storages, config }
    }

    /// Open every sub-storage, in order.
    pub fn open(&self) -> BlobResult<()> {
        for entry in &self.storages {
            entry.storage.open()?;
        }
        Ok(())
    }

    /// Initialize every sub-storage, in order.
    pub fn init(&self) -> BlobResult<()> {
        for entry in &self.storages {
            entry.storage.init()?;
        }
        info!(tiers = self.storages.len(), "blobstor initialized");
        Ok(())
    }

    /// Close every sub-storage, in reverse order.
    pub fn close(&self) -> BlobResult<()> {
        for entry in self.storages.iter().rev() {
            entry.storage.close()?;
        }
        Ok(())
    }

    /// Root paths of the configured sub-storages.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.storages
            .iter()
            .map(|e| e.storage.path().to_path_buf())
            .collect()
    }

    /// Store the object's payload in the first matching tier.
    pub fn put(&self, object: &Object) -> BlobResult<()> {
        let data = if self.config.compress {
            compress::compress(&object.payload)?
        } else {
            object.payload.clone()
        };

        for entry in &self.storages {
            if entry.matches(object) {
                entry.storage.put(&object.address, &data)?;
                debug!(
                    address = %object.address,
                    kind = entry.storage.kind(),
                    size = object.payload.len(),
                    "stored payload"
                );
                return Ok(());
            }
        }
        // Unreachable with a policy-free default tier; kept as a guard for
        // configurations where every entry carries a predicate.
        Err(BlobError::NoSuitableStorage(object.address))
    }

    /// Read the payload, trying each tier in order.
    ///
    /// `NotFound` from a tier moves the scan along; any other error is
    /// remembered and returned only if no later tier has the payload.
    pub fn get(&self, address: &Address) -> BlobResult<Vec<u8>> {
        let mut first_err: Option<BlobError> = None;
        for entry in &self.storages {
            match entry.storage.get(address) {
                Ok(data) => return compress::decompress(address, data),
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    warn!(
                        address = %address,
                        kind = entry.storage.kind(),
                        error = %e,
                        "sub-storage get failed, trying next tier"
                    );
                    first_err.get_or_insert(e);
                }
            }
        }
        Err(first_err.unwrap_or(BlobError::NotFound(*address)))
    }

    /// Check all tiers for the address.
    ///
    /// The first error is remembered but the scan continues: found anywhere
    /// means `Ok(true)` even after an earlier error, so a corrupted tier
    /// cannot hide objects that live elsewhere. Never found surfaces the
    /// remembered first error if one occurred, otherwise `Ok(false)`.
    pub fn exists(&self, address: &Address) -> BlobResult<bool> {
        let mut first_err: Option<BlobError> = None;
        for entry in &self.storages {
            match entry.storage.exists(address) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        address = %address,
                        kind = entry.storage.kind(),
                        error = %e,
                        "sub-storage exists check failed, continuing scan"
                    );
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Remove the payload from whichever tier holds it. No-op if absent.
    pub fn delete(&self, address: &Address) -> BlobResult<()> {
        let mut first_err: Option<BlobError> = None;
        for entry in &self.storages {
            match entry.storage.delete(address) {
                Ok(()) => return Ok(()),
                Err(e) if e.is_not_found() => continue,
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
