use cask_types::Address;

/// Errors from payload storage operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// No sub-storage holds the requested address.
    #[error("object not found: {0}")]
    NotFound(Address),

    /// A stored record failed its integrity check.
    #[error("storage corrupted at {path}: {reason}")]
    Corrupted { path: String, reason: String },

    /// Payload decompression failed.
    #[error("decompression failed for {0}")]
    Decompression(Address),

    /// No configured sub-storage accepted the object.
    #[error("no sub-storage accepted object {0}")]
    NoSuitableStorage(Address),

    /// I/O error from the underlying filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for payload storage operations.
pub type BlobResult<T> = Result<T, BlobError>;

impl BlobError {
    /// Returns `true` for the absence case, as opposed to a real failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound(_))
    }
}
