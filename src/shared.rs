//! Thread-safe handle to a block store.
//!
//! [`BlockStore`] itself is single-threaded. `SharedBlockStore` puts it
//! behind one mutex so that every operation runs in a single critical
//! section: the cache lookup and the persist-on-miss of a `write` cannot
//! interleave with another caller, and a hash reaches the backing store at
//! most once per store lifetime.

use crate::block::{Block, BlockHash};
use crate::error::Result;
use crate::store::BackingStore;
use crate::BlockStore;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A cloneable, thread-safe handle to a [`BlockStore`].
#[derive(Debug, Clone)]
pub struct SharedBlockStore {
    inner: Arc<Mutex<BlockStore>>,
}

impl SharedBlockStore {
    /// Wrap a block store for shared use.
    pub fn new(store: BlockStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// See [`BlockStore::write`].
    pub fn write(&self, data: &[u8]) -> Result<Vec<BlockHash>> {
        self.inner.lock().write(data)
    }

    /// See [`BlockStore::read`].
    pub fn read(&self, hash: BlockHash) -> Option<Block> {
        self.inner.lock().read(hash)
    }

    /// See [`BlockStore::switch_backing_store`].
    pub fn switch_backing_store<S: BackingStore + 'static>(&self, store: S) -> Result<()> {
        self.inner.lock().switch_backing_store(store)
    }

    /// See [`BlockStore::pin`].
    pub fn pin(&self, hash: BlockHash) -> bool {
        self.inner.lock().pin(hash)
    }

    /// See [`BlockStore::unpin`].
    pub fn unpin(&self, hash: BlockHash) -> bool {
        self.inner.lock().unpin(hash)
    }

    /// Number of blocks currently cached.
    pub fn cache_len(&self) -> usize {
        self.inner.lock().cache_len()
    }

    /// Total number of blocks served by `read`.
    pub fn total_read_blocks(&self) -> u64 {
        self.inner.lock().total_read_blocks()
    }

    /// Total number of blocks persisted by `write`.
    pub fn total_written_blocks(&self) -> u64 {
        self.inner.lock().total_written_blocks()
    }

    /// Lock the store for a sequence of operations that must not interleave
    /// with other callers.
    pub fn lock(&self) -> MutexGuard<'_, BlockStore> {
        self.inner.lock()
    }
}
