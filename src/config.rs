//! Configuration options for the block store.

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration options for a block store.
///
/// Options can be built in code or loaded from JSON; missing fields take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Maximum number of blocks kept in the buffer cache.
    /// Default: 50
    pub cache_capacity: usize,

    /// Compare content byte-for-byte when a written block's hash is already
    /// cached, failing with `HashCollision` on mismatch.
    /// Default: false
    pub verify_on_dedup: bool,

    /// Create missing parent directories when opening a file store.
    /// Default: true
    pub create_if_missing: bool,

    /// Sync the file store to disk after every persisted block.
    /// Default: true
    pub sync_writes: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            verify_on_dedup: false,
            create_if_missing: true,
            sync_writes: true,
        }
    }
}

impl Options {
    /// Creates a new Options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the buffer cache capacity in blocks.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Enables or disables content verification on dedup hits.
    pub fn verify_on_dedup(mut self, value: bool) -> Self {
        self.verify_on_dedup = value;
        self
    }

    /// Sets whether to create missing directories for a file store.
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Enables or disables syncing after every persisted block.
    pub fn sync_writes(mut self, value: bool) -> Self {
        self.sync_writes = value;
        self
    }

    /// Parses options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Options = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Loads options from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Validates the options and returns an error if any are invalid.
    ///
    /// A zero-capacity cache would forward every block to the store and
    /// trip its duplicate-key check on the first repeated write.
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::invalid_argument("cache_capacity must be > 0"));
        }
        Ok(())
    }
}
