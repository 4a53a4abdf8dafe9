//! Engine data-path operations: routed writes, fan-out reads.

use cask_blobstor::BlobError;
use cask_metabase::{Filter, MetaError};
use cask_shard::ShardError;
use cask_types::{Address, ContainerId, Object, ObjectHeader, SplitInfo};
use tracing::{debug, warn};

use crate::engine::StorageEngine;
use crate::error::{EngineError, EngineResult};

impl StorageEngine {
    /// Store an object on the shard that rendezvous hashing ranks first
    /// among the currently healthy shards.
    ///
    /// The assignment is a deterministic function of the address and the
    /// healthy-shard set — a load-balancing hint, not a location guarantee:
    /// reads never assume an object is reachable only via its routed shard.
    pub fn put(&self, object: &Object) -> EngineResult<()> {
        let key = object.address.to_key_bytes();
        let ranked = self.ranked_healthy(&key);
        let Some(record) = ranked.first() else {
            return Err(EngineError::NoHealthyShards);
        };

        let target = record.shard.id();
        let obj = object.clone();
        let result = self.dispatch(record, move |shard| shard.put(&obj));
        match &result {
            Ok(()) => debug!(address = %object.address, shard = %target, "object routed"),
            Err(e) => warn!(address = %object.address, shard = %target, error = %e, "put failed"),
        }
        result
    }

    /// Fetch the object from whichever shard has it.
    ///
    /// Every shard is consulted because routing history may have placed the
    /// object anywhere. Removal and expiration verdicts are terminal; split
    /// linkage is merged across shards and returned once the scan is done.
    pub fn get(&self, address: &Address) -> EngineResult<Object> {
        let mut split_info: Option<SplitInfo> = None;

        for record in self.snapshot() {
            let addr = *address;
            match self.dispatch(&record, move |shard| shard.get(&addr)) {
                Ok(object) => return Ok(object),
                Err(e) => match classify(e, &mut split_info) {
                    Verdict::Continue => {}
                    Verdict::Terminal(err) => return Err(err),
                },
            }
        }

        match split_info {
            Some(info) => Err(EngineError::Split(info)),
            None => Err(EngineError::NotFound(*address)),
        }
    }

    /// Fetch the header from whichever shard has it.
    ///
    /// With `raw = false` a split parent resolves to its reconstructed
    /// header when any shard holds a part that carried it.
    pub fn head(&self, address: &Address, raw: bool) -> EngineResult<ObjectHeader> {
        let mut split_info: Option<SplitInfo> = None;

        for record in self.snapshot() {
            let addr = *address;
            match self.dispatch(&record, move |shard| shard.head(&addr, raw)) {
                Ok(header) => return Ok(header),
                Err(e) => match classify(e, &mut split_info) {
                    Verdict::Continue => {}
                    Verdict::Terminal(err) => return Err(err),
                },
            }
        }

        match split_info {
            Some(info) => Err(EngineError::Split(info)),
            None => Err(EngineError::NotFound(*address)),
        }
    }

    /// Check whether any shard holds the address.
    ///
    /// Returns `true` on the first shard that reports found. A removed or
    /// expired verdict means the object is definitively absent. An error is
    /// surfaced only if no shard found the address and at least one shard's
    /// check itself failed — and then it is the first such error.
    pub fn exists(&self, address: &Address) -> EngineResult<bool> {
        let mut first_err: Option<EngineError> = None;

        for record in self.snapshot() {
            let addr = *address;
            match self.dispatch(&record, move |shard| shard.exists(&addr)) {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(EngineError::Shard(ShardError::Meta(
                    MetaError::AlreadyRemoved(_) | MetaError::Expired(_),
                ))) => return Ok(false),
                Err(EngineError::Shard(ShardError::Meta(MetaError::Split(_)))) => {
                    // A split parent is known, though not materialized.
                    return Ok(true);
                }
                Err(e) => {
                    first_err.get_or_insert(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(false),
        }
    }

    /// Mark the addresses removed on every shard, so copies left behind by
    /// older routing decisions cannot resurface.
    pub fn inhume(&self, targets: &[Address], tombstone: Option<Address>) -> EngineResult<()> {
        let records = self.snapshot();
        if records.is_empty() {
            return Err(EngineError::NoHealthyShards);
        }

        let mut first_err: Option<EngineError> = None;
        let mut applied = 0usize;
        for record in &records {
            let targets = targets.to_vec();
            match self.dispatch(record, move |shard| shard.inhume(&targets, tombstone)) {
                Ok(()) => applied += 1,
                Err(e) => {
                    warn!(shard = %record.shard.id(), error = %e, "inhume failed on shard");
                    first_err.get_or_insert(e);
                }
            }
        }

        if applied == 0 {
            // Nothing took the mark; surface the first failure.
            return Err(first_err.unwrap_or(EngineError::NoHealthyShards));
        }
        Ok(())
    }

    /// Union of matching addresses across all shards, deduplicated.
    ///
    /// A failing shard is skipped (and its error counter incremented); the
    /// query prefers partial availability over failing outright.
    pub fn select(
        &self,
        container: &ContainerId,
        filters: &[Filter],
    ) -> EngineResult<Vec<Address>> {
        let mut out: Vec<Address> = Vec::new();

        for record in self.snapshot() {
            let cnr = *container;
            let filters = filters.to_vec();
            match self.dispatch(&record, move |shard| shard.select(&cnr, &filters)) {
                Ok(addresses) => {
                    for address in addresses {
                        if !out.contains(&address) {
                            out.push(address);
                        }
                    }
                }
                Err(e) => {
                    warn!(shard = %record.shard.id(), error = %e, "select failed on shard");
                }
            }
        }
        Ok(out)
    }
}

enum Verdict {
    Continue,
    Terminal(EngineError),
}

/// Sort a failed per-shard read into "keep scanning" or "final answer",
/// folding split linkage into the running merge.
fn classify(e: EngineError, split_info: &mut Option<SplitInfo>) -> Verdict {
    match e {
        EngineError::Shard(ShardError::Meta(MetaError::NotFound(_)))
        | EngineError::Shard(ShardError::Blob(BlobError::NotFound(_))) => Verdict::Continue,
        EngineError::Shard(ShardError::Meta(MetaError::AlreadyRemoved(addr))) => {
            Verdict::Terminal(EngineError::AlreadyRemoved(addr))
        }
        EngineError::Shard(ShardError::Meta(MetaError::Expired(addr))) => {
            Verdict::Terminal(EngineError::Expired(addr))
        }
        EngineError::Shard(ShardError::Meta(MetaError::Split(info))) => {
            split_info.get_or_insert_with(SplitInfo::new).merge(&info);
            Verdict::Continue
        }
        // Pool saturation, lifecycle misuse, I/O: scan the siblings, the
        // object may well be somewhere healthy.
        _ => Verdict::Continue,
    }
}
