use cask_blobstor::BlobError;
use cask_metabase::MetaError;

/// Errors from shard operations.
#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    /// A data-path call arrived before the shard was initialized.
    #[error("shard is not initialized")]
    NotInitialized,

    /// A data-path call arrived after the shard was closed.
    #[error("shard is closed")]
    Closed,

    /// Error from the payload store.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// Error from the metadata index.
    #[error(transparent)]
    Meta(#[from] MetaError),

    /// Error from the tree log database.
    #[error("tree log error: {0}")]
    TreeLog(#[from] sled::Error),

    /// A stored tree log record could not be decoded.
    #[error("tree log record decode failed: {0}")]
    Decode(String),
}

/// Result alias for shard operations.
pub type ShardResult<T> = Result<T, ShardError>;
