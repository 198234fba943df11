//! In-memory backing store.

use super::BackingStore;
use crate::block::{Block, BlockHash, PAGE_SIZE};
use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    schema_ready: bool,
    blocks: HashMap<BlockHash, Block>,
}

/// A backing store kept in process memory.
///
/// Cloning a `MemoryStore` yields another handle to the same database, the
/// way several connections share one server. This lets a host keep a handle
/// for inspection after moving one into a [`BlockStore`](crate::BlockStore).
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store. The schema is bootstrapped on first use by the
    /// block store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hashes of every stored block, in no particular order.
    pub fn hashes(&self) -> Vec<BlockHash> {
        self.inner.lock().blocks.keys().copied().collect()
    }
}

impl BackingStore for MemoryStore {
    fn ensure_schema(&mut self) -> Result<()> {
        self.inner.lock().schema_ready = true;
        Ok(())
    }

    fn insert_block(&mut self, hash: BlockHash, content: &[u8], declared_len: usize) -> Result<()> {
        if content.len() != PAGE_SIZE || declared_len > PAGE_SIZE {
            return Err(Error::invalid_argument(format!(
                "expected a {} byte page with declared length <= {}, got {} bytes and length {}",
                PAGE_SIZE,
                PAGE_SIZE,
                content.len(),
                declared_len
            )));
        }

        let mut inner = self.inner.lock();
        if !inner.schema_ready {
            return Err(Error::invalid_state("memory store schema not initialized"));
        }
        if inner.blocks.contains_key(&hash) {
            return Err(Error::DuplicateKey(hash));
        }

        let block = Block::from_page(content, declared_len)?;
        inner.blocks.insert(hash, block);
        Ok(())
    }

    fn get_block(&mut self, hash: BlockHash) -> Result<Option<Block>> {
        Ok(self.inner.lock().blocks.get(&hash).cloned())
    }

    fn contains(&self, hash: BlockHash) -> bool {
        self.inner.lock().blocks.contains_key(&hash)
    }

    fn len(&self) -> usize {
        self.inner.lock().blocks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut store = MemoryStore::new();
        store.ensure_schema().unwrap();

        let block = Block::from_slice(b"hello").unwrap();
        store.insert_block(block.hash(), block.page(), block.len()).unwrap();

        assert!(store.contains(block.hash()));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_block(block.hash()).unwrap(), Some(block));
        assert_eq!(store.get_block(BlockHash::new(1)).unwrap(), None);
    }

    #[test]
    fn test_duplicate_key_rejected() {
        let mut store = MemoryStore::new();
        store.ensure_schema().unwrap();

        let block = Block::from_slice(b"dup").unwrap();
        store.insert_block(block.hash(), block.page(), block.len()).unwrap();

        let err = store.insert_block(block.hash(), block.page(), block.len()).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(h) if h == block.hash()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_insert_requires_schema() {
        let mut store = MemoryStore::new();
        let block = Block::new();

        let err = store.insert_block(block.hash(), block.page(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidState(_)));

        store.ensure_schema().unwrap();
        store.ensure_schema().unwrap();
        store.insert_block(block.hash(), block.page(), 0).unwrap();
    }

    #[test]
    fn test_rejects_short_page() {
        let mut store = MemoryStore::new();
        store.ensure_schema().unwrap();

        let err = store.insert_block(BlockHash::new(1), b"short", 5).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let mut store = MemoryStore::new();
        let observer = store.clone();
        store.ensure_schema().unwrap();

        let block = Block::from_slice(b"shared").unwrap();
        store.insert_block(block.hash(), block.page(), block.len()).unwrap();

        assert!(observer.contains(block.hash()));
        assert_eq!(observer.hashes(), vec![block.hash()]);
    }
}
