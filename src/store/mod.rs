//! Durable block stores.
//!
//! The block store hands every newly seen block to a [`BackingStore`]. Two
//! implementations are provided:
//!
//! - [`MemoryStore`]: in-process map, handles share one database
//! - [`FileStore`]: append-only log of checksummed fixed-size records

mod file;
mod memory;

pub use file::{FileStore, StoreHeader, RECORD_SIZE};
pub use memory::MemoryStore;

use crate::block::{Block, BlockHash};
use crate::error::Result;
use std::fmt;

/// A durable key-value sink for blocks, keyed by block hash.
///
/// Implementations must reject a second insert under the same key with
/// [`Error::DuplicateKey`](crate::Error::DuplicateKey).
pub trait BackingStore: Send + fmt::Debug {
    /// Prepare the store for use. Must be idempotent.
    fn ensure_schema(&mut self) -> Result<()>;

    /// Persist `content` under `hash`, recording `declared_len` as its
    /// logical length.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey` if `hash` is already stored
    /// - `InvalidState` if the schema has not been bootstrapped
    /// - `Io` or `Connection` on storage failure
    fn insert_block(&mut self, hash: BlockHash, content: &[u8], declared_len: usize) -> Result<()>;

    /// Fetch a stored block.
    fn get_block(&mut self, hash: BlockHash) -> Result<Option<Block>>;

    /// Check whether `hash` is stored.
    fn contains(&self, hash: BlockHash) -> bool;

    /// Number of stored blocks.
    fn len(&self) -> usize;

    /// Check if the store holds no blocks.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush buffered writes to stable storage.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: BackingStore + ?Sized> BackingStore for Box<S> {
    fn ensure_schema(&mut self) -> Result<()> {
        (**self).ensure_schema()
    }

    fn insert_block(&mut self, hash: BlockHash, content: &[u8], declared_len: usize) -> Result<()> {
        (**self).insert_block(hash, content, declared_len)
    }

    fn get_block(&mut self, hash: BlockHash) -> Result<Option<Block>> {
        (**self).get_block(hash)
    }

    fn contains(&self, hash: BlockHash) -> bool {
        (**self).contains(hash)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
