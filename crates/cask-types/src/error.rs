/// Errors from parsing or constructing foundation types.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// A hex string could not be decoded.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Decoded bytes have the wrong length.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// An address string is not of the form `<container>/<object>`.
    #[error("invalid address: {0}")]
    InvalidAddress(String),
}
