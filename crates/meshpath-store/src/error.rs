//! Error types for the storage layer.

use meshpath_protocol::{DecodeError, EncodeError};

/// Errors that can occur while reading or writing stored values.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying file could not be read or written.
    #[error("storage I/O failed for {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// A stored file exists but does not decode to a value.
    #[error("stored data for {key} is corrupt: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: DecodeError,
    },

    /// The value could not be encoded for storage.
    #[error("value cannot be stored: {0}")]
    Encode(#[from] EncodeError),

    /// The persistence worker is gone (the server is shutting down).
    #[error("persistence worker is not running")]
    Unavailable,
}
