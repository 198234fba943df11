//! Error types for the block store.

use crate::block::BlockHash;
use std::io;
use thiserror::Error;

/// The result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for block store operations.
///
/// Empty writes and cache misses are not errors; they surface as ordinary
/// return values (`Ok(vec![])` and `None`).
#[derive(Debug, Error)]
pub enum Error {
    /// An I/O error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The backing store location is invalid or unreachable.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The backing store already holds a block under this key.
    #[error("Duplicate block key: {0}")]
    DuplicateKey(BlockHash),

    /// Two blocks with different content produced the same hash.
    #[error("Hash collision on block {0}")]
    HashCollision(BlockHash),

    /// Every cached block is pinned, so nothing can be evicted.
    #[error("Cache is full and every resident block is pinned")]
    CacheFull,

    /// Data corruption was detected.
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// An invalid argument was provided.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store is in an invalid state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Creates a new corruption error.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Error::Corruption(msg.into())
    }

    /// Creates a new connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Error::Connection(msg.into())
    }

    /// Creates a new invalid argument error.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Creates a new invalid state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Returns true if the error came from the durable store rather than
    /// from the cache or the caller's input.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Connection(_)
                | Error::DuplicateKey(_)
                | Error::Corruption(_)
                | Error::InvalidState(_)
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
