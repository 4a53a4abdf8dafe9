//! The storage engine: shard registry, health accounting, dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use cask_shard::{Shard, ShardConfig, ShardError, ShardResult};
use cask_types::ShardId;
use tracing::{info, warn};

use crate::error::{EngineError, EngineResult};
use crate::hrw;
use crate::pool::{PoolError, WorkerPool};

/// Configuration for a [`StorageEngine`].
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Error count at which a shard leaves the routing set.
    pub error_threshold: u32,
    /// Higher error count at which the shard is flagged to operators as a
    /// candidate for administrative degradation or eviction.
    pub degraded_threshold: u32,
    /// Worker pool capacity created for each shard.
    pub pool_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_threshold: 100,
            degraded_threshold: 1000,
            pool_capacity: 20,
        }
    }
}

/// Engine-internal bookkeeping for one registered shard.
#[derive(Clone)]
pub(crate) struct ShardRecord {
    pub shard: Arc<Shard>,
    pub pool: Arc<WorkerPool>,
    pub error_count: Arc<AtomicU32>,
}

/// Owner of a set of shards.
///
/// Routes writes deterministically over healthy shards via rendezvous
/// hashing, fans reads out across every shard, tracks per-shard error
/// counters, and dispatches all shard work onto per-shard bounded worker
/// pools. The shard map is the only engine-wide shared mutable structure: a
/// read lock covers routing and fan-out, a write lock only the infrequent
/// topology changes.
pub struct StorageEngine {
    shards: RwLock<HashMap<ShardId, ShardRecord>>,
    config: EngineConfig,
}

impl StorageEngine {
    /// Create an engine with no shards.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Construct and register a shard; returns its fresh id.
    ///
    /// The shard is created with a bounded worker pool and a zeroed error
    /// counter. It still has to pass `open`/`init` before taking traffic.
    pub fn add_shard(&self, config: ShardConfig) -> ShardId {
        let shard = Arc::new(Shard::new(config));
        let id = shard.id();
        let record = ShardRecord {
            shard,
            pool: Arc::new(WorkerPool::new(self.config.pool_capacity)),
            error_count: Arc::new(AtomicU32::new(0)),
        };
        self.shards
            .write()
            .expect("shard map poisoned")
            .insert(id, record);
        info!(shard = %id, "shard registered");
        id
    }

    /// Deregister and close a shard (topology change).
    pub fn remove_shard(&self, id: ShardId) -> EngineResult<()> {
        let record = self
            .shards
            .write()
            .expect("shard map poisoned")
            .remove(&id)
            .ok_or(EngineError::UnknownShard(id))?;
        record.pool.shutdown();
        record.shard.close()?;
        info!(shard = %id, "shard removed");
        Ok(())
    }

    /// Open every registered shard.
    pub fn open(&self) -> EngineResult<()> {
        for record in self.snapshot() {
            record.shard.open()?;
        }
        Ok(())
    }

    /// Initialize every registered shard; after this the engine serves.
    pub fn init(&self) -> EngineResult<()> {
        for record in self.snapshot() {
            record.shard.init()?;
        }
        Ok(())
    }

    /// Shut down pools and close every shard. The first error is kept, but
    /// every shard is still visited.
    pub fn close(&self) -> EngineResult<()> {
        let records: Vec<ShardRecord> = self
            .shards
            .write()
            .expect("shard map poisoned")
            .drain()
            .map(|(_, record)| record)
            .collect();

        let mut first_err = None;
        for record in records {
            record.pool.shutdown();
            if let Err(e) = record.shard.close() {
                first_err.get_or_insert(EngineError::Shard(e));
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Clone the current shard records out of the map, releasing the read
    /// lock before any shard work happens.
    pub(crate) fn snapshot(&self) -> Vec<ShardRecord> {
        self.shards
            .read()
            .expect("shard map poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Healthy shards ranked by rendezvous weight for the key, best first.
    pub(crate) fn ranked_healthy(&self, key: &[u8]) -> Vec<ShardRecord> {
        let mut records: Vec<ShardRecord> = self
            .snapshot()
            .into_iter()
            .filter(|r| r.error_count.load(Ordering::Relaxed) < self.config.error_threshold)
            .collect();
        records.sort_by(|a, b| {
            hrw::weight(key, &b.shard.id())
                .cmp(&hrw::weight(key, &a.shard.id()))
                .then_with(|| a.shard.id().cmp(&b.shard.id()))
        });
        records
    }

    /// Run one unit of shard work on that shard's pool and account for the
    /// outcome. Logical outcomes (not-found, removed, expired, split) are
    /// answers, not faults, and leave the error counter alone.
    pub(crate) fn dispatch<T, F>(&self, record: &ShardRecord, f: F) -> EngineResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Shard) -> ShardResult<T> + Send + 'static,
    {
        let shard = Arc::clone(&record.shard);
        let result = record
            .pool
            .execute(move || f(&shard))
            .map_err(|e| match e {
                PoolError::CapacityExceeded => EngineError::CapacityExceeded,
                PoolError::Terminated => EngineError::Closed,
            })?;

        if let Err(ref e) = result {
            if !is_logical(e) {
                self.report_error(record);
            }
        }
        result.map_err(EngineError::Shard)
    }

    /// Increment the shard's error counter and flag threshold crossings.
    fn report_error(&self, record: &ShardRecord) {
        let count = record.error_count.fetch_add(1, Ordering::Relaxed) + 1;
        let id = record.shard.id();
        if count == self.config.error_threshold {
            warn!(shard = %id, count, "shard excluded from write routing");
        }
        if count == self.config.degraded_threshold {
            warn!(
                shard = %id,
                count,
                "shard error count reached degradation threshold; consider eviction"
            );
        }
    }

    /// Current error counter of every shard.
    pub fn shard_errors(&self) -> Vec<(ShardId, u32)> {
        self.snapshot()
            .iter()
            .map(|r| (r.shard.id(), r.error_count.load(Ordering::Relaxed)))
            .collect()
    }

    /// Shards past the degradation threshold, for operator tooling.
    pub fn degraded_shards(&self) -> Vec<ShardId> {
        self.snapshot()
            .iter()
            .filter(|r| {
                r.error_count.load(Ordering::Relaxed) >= self.config.degraded_threshold
            })
            .map(|r| r.shard.id())
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn inject_errors(&self, id: ShardId, count: u32) {
        for record in self.snapshot() {
            if record.shard.id() == id {
                record.error_count.store(count, Ordering::Relaxed);
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn record(&self, id: ShardId) -> Option<ShardRecord> {
        self.snapshot().into_iter().find(|r| r.shard.id() == id)
    }
}

/// Logical outcomes carry information, not shard damage.
fn is_logical(e: &ShardError) -> bool {
    use cask_blobstor::BlobError;
    use cask_metabase::MetaError;

    match e {
        ShardError::Meta(
            MetaError::NotFound(_)
            | MetaError::AlreadyRemoved(_)
            | MetaError::Expired(_)
            | MetaError::Split(_),
        ) => true,
        ShardError::Blob(BlobError::NotFound(_)) => true,
        _ => false,
    }
}
