use cask_shard::ShardError;
use cask_types::{Address, SplitInfo};

/// Errors from engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No shard holds the requested address.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// The address was inhumed under a tombstone.
    #[error("object already removed: {0}")]
    AlreadyRemoved(Address),

    /// The object's expiration epoch has passed.
    #[error("object expired: {0}")]
    Expired(Address),

    /// The address resolves to a split object; merged linkage attached.
    #[error("object is split")]
    Split(SplitInfo),

    /// The target shard's worker pool is saturated.
    #[error("shard worker pool capacity exceeded")]
    CapacityExceeded,

    /// Every shard is past the error threshold (or none are registered).
    #[error("no healthy shards available")]
    NoHealthyShards,

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,

    /// The shard id is not registered with this engine.
    #[error("unknown shard: {0}")]
    UnknownShard(cask_types::ShardId),

    /// A shard-level failure that no sibling could absorb.
    #[error(transparent)]
    Shard(#[from] ShardError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
