//! One storage shard: a blob store and a metadata index under one lifecycle.

use std::sync::{Arc, OnceLock, RwLock};

use cask_blobstor::BlobStor;
use cask_metabase::{EpochState, Filter, Metabase, MetabaseConfig};
use cask_types::{Address, ContainerId, Object, ObjectHeader, ShardId};
use tracing::{info, warn};

use crate::error::{ShardError, ShardResult};
use crate::treelog::{TreeLog, TreeLogConfig, TreeOp};

/// Lifecycle phase of a shard. Transitions are one-directional:
/// `Created → Opened → Initialized → Closed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Created,
    Opened,
    Initialized,
    Closed,
}

/// Configuration of a shard's component stores.
///
/// The blob store is passed in fully constructed (its sub-storage list is
/// chosen by the operator); the metabase and the optional tree log are
/// opened by the shard itself during [`Shard::open`].
pub struct ShardConfig {
    /// The tiered payload store.
    pub blobstor: BlobStor,
    /// Metadata index configuration.
    pub metabase: MetabaseConfig,
    /// Epoch provider injected into the metabase.
    pub epoch: Arc<dyn EpochState>,
    /// Optional tree log configuration.
    pub treelog: Option<TreeLogConfig>,
}

/// An independently owned storage unit.
///
/// Composes one [`BlobStor`] and one [`Metabase`] (plus an optional
/// [`TreeLog`]). Metadata decisions — existence, removal, expiration,
/// filtering — are delegated to the metabase; the blob store is touched
/// only when payload bytes are actually required.
pub struct Shard {
    id: ShardId,
    state: RwLock<State>,
    blobstor: BlobStor,
    metabase: OnceLock<Metabase>,
    treelog: OnceLock<TreeLog>,
    meta_config: MetabaseConfig,
    epoch: Arc<dyn EpochState>,
    treelog_config: Option<TreeLogConfig>,
}

impl Shard {
    /// Create a shard in the `Created` state with a fresh id.
    pub fn new(config: ShardConfig) -> Self {
        Self {
            id: ShardId::generate(),
            state: RwLock::new(State::Created),
            blobstor: config.blobstor,
            metabase: OnceLock::new(),
            treelog: OnceLock::new(),
            meta_config: config.metabase,
            epoch: config.epoch,
            treelog_config: config.treelog,
        }
    }

    /// The shard's id, immutable for its lifetime.
    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Open component stores. Valid only in the `Created` state.
    pub fn open(&self) -> ShardResult<()> {
        let mut state = self.state.write().expect("shard state poisoned");
        match *state {
            State::Created => {}
            State::Closed => return Err(ShardError::Closed),
            _ => return Ok(()),
        }

        self.blobstor.open()?;
        let metabase = Metabase::open(self.meta_config.clone(), Arc::clone(&self.epoch))?;
        self.metabase
            .set(metabase)
            .unwrap_or_else(|_| unreachable!("metabase opened twice"));
        if let Some(config) = &self.treelog_config {
            let treelog = TreeLog::open(config)?;
            self.treelog
                .set(treelog)
                .unwrap_or_else(|_| unreachable!("tree log opened twice"));
        }

        *state = State::Opened;
        info!(shard = %self.id, "shard opened");
        Ok(())
    }

    /// Recover store state; after this the shard accepts traffic.
    pub fn init(&self) -> ShardResult<()> {
        let mut state = self.state.write().expect("shard state poisoned");
        match *state {
            State::Opened => {}
            State::Created => return Err(ShardError::NotInitialized),
            State::Closed => return Err(ShardError::Closed),
            State::Initialized => return Ok(()),
        }

        self.blobstor.init()?;

        *state = State::Initialized;
        info!(shard = %self.id, "shard initialized");
        Ok(())
    }

    /// Flush and close component stores. Terminal.
    pub fn close(&self) -> ShardResult<()> {
        let mut state = self.state.write().expect("shard state poisoned");
        if *state == State::Closed {
            return Ok(());
        }

        // Reverse of open order.
        if let Some(treelog) = self.treelog.get() {
            treelog.close()?;
        }
        if let Some(metabase) = self.metabase.get() {
            metabase.close()?;
        }
        self.blobstor.close()?;

        *state = State::Closed;
        info!(shard = %self.id, "shard closed");
        Ok(())
    }

    fn ensure_initialized(&self) -> ShardResult<()> {
        match *self.state.read().expect("shard state poisoned") {
            State::Initialized => Ok(()),
            State::Closed => Err(ShardError::Closed),
            State::Created | State::Opened => Err(ShardError::NotInitialized),
        }
    }

    fn metabase(&self) -> &Metabase {
        self.metabase
            .get()
            .expect("initialized shard has an open metabase")
    }

    /// Store an object: payload into the blob store, then the header into
    /// the metadata index.
    ///
    /// The two writes are deliberately not atomic. A metabase failure after
    /// a successful payload write leaves an orphaned blob behind; it is
    /// logged here and left for an external reconciliation pass. The
    /// tradeoff buys independent recoverability of either store.
    pub fn put(&self, object: &Object) -> ShardResult<()> {
        self.ensure_initialized()?;

        self.blobstor.put(object)?;
        if let Err(e) = self.metabase().put(object) {
            warn!(
                shard = %self.id,
                address = %object.address,
                error = %e,
                "header indexing failed after payload write; blob orphaned"
            );
            return Err(e.into());
        }
        Ok(())
    }

    /// Fetch the full object.
    ///
    /// The metabase decides removal/expiration first; a split parent
    /// surfaces its linkage as a `Split` error (payload reassembly is the
    /// caller's job). Only then is the payload read.
    pub fn get(&self, address: &Address) -> ShardResult<Object> {
        self.ensure_initialized()?;

        // raw lookup: a physical header or the split linkage, never a
        // virtual parent header masquerading as a stored object.
        let header = self.metabase().get(address, true)?;
        let payload = match self.blobstor.get(address) {
            Ok(payload) => payload,
            Err(e) => {
                if !e.is_not_found() {
                    warn!(shard = %self.id, address = %address, error = %e, "payload read failed");
                } else {
                    warn!(
                        shard = %self.id,
                        address = %address,
                        "metadata present but payload missing"
                    );
                }
                return Err(e.into());
            }
        };

        Ok(Object {
            address: *address,
            header,
            payload,
        })
    }

    /// Fetch the header only.
    ///
    /// With `raw = false` a virtual (split-parent) address resolves to the
    /// parent header when some part carried it.
    pub fn head(&self, address: &Address, raw: bool) -> ShardResult<ObjectHeader> {
        self.ensure_initialized()?;
        Ok(self.metabase().get(address, raw)?)
    }

    /// Existence under the metabase's removal/expiration rules.
    pub fn exists(&self, address: &Address) -> ShardResult<bool> {
        self.ensure_initialized()?;
        Ok(self.metabase().exists(address)?)
    }

    /// Mark addresses removed, optionally attributed to a tombstone.
    pub fn inhume(&self, targets: &[Address], tombstone: Option<Address>) -> ShardResult<()> {
        self.ensure_initialized()?;
        Ok(self.metabase().inhume(targets, tombstone)?)
    }

    /// Addresses in the container matching all filters.
    pub fn select(&self, container: &ContainerId, filters: &[Filter]) -> ShardResult<Vec<Address>> {
        self.ensure_initialized()?;
        Ok(self.metabase().select(container, filters)?)
    }

    /// Physically remove objects from both stores (external GC hook).
    pub fn delete(&self, targets: &[Address]) -> ShardResult<()> {
        self.ensure_initialized()?;

        self.metabase().delete(targets)?;
        for target in targets {
            self.blobstor.delete(target)?;
        }
        Ok(())
    }

    /// Append an operation to a container tree in the tree log.
    ///
    /// Fails `NotInitialized` when the shard was configured without one.
    pub fn tree_apply(
        &self,
        container: &ContainerId,
        tree: &str,
        op: &TreeOp,
    ) -> ShardResult<u64> {
        self.ensure_initialized()?;
        let treelog = self.treelog.get().ok_or(ShardError::NotInitialized)?;
        treelog.apply(container, tree, op)
    }

    /// Replay a container tree's operations in order.
    pub fn tree_list(
        &self,
        container: &ContainerId,
        tree: &str,
    ) -> ShardResult<Vec<(u64, TreeOp)>> {
        self.ensure_initialized()?;
        let treelog = self.treelog.get().ok_or(ShardError::NotInitialized)?;
        treelog.list(container, tree)
    }
}
