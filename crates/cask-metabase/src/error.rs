use cask_types::{Address, SplitInfo};

/// Errors from metadata index operations.
///
/// `Split` is returned through the error channel for call-site uniformity
/// but is a structured partial result, not a fault: it carries the known
/// linkage of a split object so the caller can drive reassembly.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MetaError {
    /// The address is not indexed.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// The address was inhumed under a tombstone.
    #[error("object already removed: {0}")]
    AlreadyRemoved(Address),

    /// The object's expiration epoch has passed.
    #[error("object expired: {0}")]
    Expired(Address),

    /// The address resolves to a split object; known linkage attached.
    #[error("object is split")]
    Split(SplitInfo),

    /// The metabase was closed while the operation was in flight.
    #[error("metabase closed")]
    Closed,

    /// Error from the embedded database.
    #[error("database error: {0}")]
    Db(#[from] sled::Error),

    /// A stored record could not be decoded.
    #[error("record decode failed: {0}")]
    Decode(String),
}

/// Result alias for metadata index operations.
pub type MetaResult<T> = Result<T, MetaError>;
