//! Error types for record operations.

use common::StorageError;

/// Error type for record operations.
///
/// A missing record is not an error: reads report it as `Ok(None)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Missing or malformed connection settings. Fatal, not retried.
    Configuration(String),

    /// Transport or protocol failure from the store client.
    Storage(String),

    /// A stored value could not be decoded.
    Encoding(String),

    /// A record key, field name or field map rejected before touching the store.
    InvalidInput(String),

    /// A lifecycle bug in the caller, such as releasing the connection more
    /// times than it was acquired. Not recoverable.
    InvariantViolation(String),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::Storage(msg) => write!(f, "Storage error: {}", msg),
            Error::Encoding(msg) => write!(f, "Encoding error: {}", msg),
            Error::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            Error::InvariantViolation(msg) => write!(f, "Invariant violation: {}", msg),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Storage(msg) => Error::Storage(msg),
            StorageError::Internal(msg) => Error::Storage(format!("internal: {}", msg)),
        }
    }
}

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;
