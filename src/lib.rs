//! # Blockstore - A Content-Addressed Block Store
//!
//! Blockstore splits byte streams into fixed-size pages, identifies each page
//! by a hash of its content, and writes every distinct page once to a durable
//! backing store. An LRU buffer cache in front of the store deduplicates
//! writes and serves reads.
//!
//! ## Architecture
//!
//! - **Block**: fixed-capacity page with a logical length and content hash
//! - **Block Cache**: bounded LRU buffer manager keyed by block hash
//! - **Backing Store**: durable key-value sink (in-memory or file log)
//! - **Block Store**: chunking, dedup-before-persist, and read/write counters
//!
//! Reads are served from the cache only. A block that was persisted and later
//! evicted reads as not found.
//!
//! ## Example Usage
//!
//! ```rust
//! use blockstore::{BlockStore, MemoryStore, Options};
//!
//! # fn main() -> Result<(), blockstore::Error> {
//! let mut store = BlockStore::new(MemoryStore::new(), Options::default())?;
//!
//! // Writing the same data twice persists it once
//! let hashes = store.write(b"hello blocks")?;
//! store.write(b"hello blocks")?;
//! assert_eq!(store.total_written_blocks(), 1);
//!
//! // Read it back by hash
//! let block = store.read(hashes[0]).expect("block is cached");
//! assert_eq!(block.as_bytes(), b"hello blocks");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// Module declarations
pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod shared;
pub mod store;

// Re-exports
pub use block::{create_blocks, Block, BlockHash, PAGE_SIZE};
pub use cache::{BlockCache, CacheStats};
pub use config::Options;
pub use error::{Error, Result};
pub use shared::SharedBlockStore;
pub use store::{BackingStore, FileStore, MemoryStore};

use std::path::Path;

/// The main block store handle.
///
/// Owns the buffer cache and the backing store connection, and counts the
/// blocks it has persisted and served.
///
/// # Thread Safety
///
/// `BlockStore` is `Send` but takes `&mut self` for every operation that
/// touches the cache. Use [`SharedBlockStore`] to share one across threads.
#[derive(Debug)]
pub struct BlockStore {
    /// Configuration options
    options: Options,

    /// Buffer cache of recently written or read blocks
    cache: BlockCache,

    /// Durable store for newly seen blocks
    store: Box<dyn BackingStore>,

    /// Blocks persisted by `write`
    blocks_written: u64,

    /// Blocks served by `read`
    blocks_read: u64,
}

impl BlockStore {
    /// Creates a block store on top of `store`.
    ///
    /// Bootstraps the store's schema. The cache starts empty and both
    /// counters start at zero.
    ///
    /// # Errors
    ///
    /// Returns an error if the options are invalid or the schema cannot be
    /// initialized.
    pub fn new<S: BackingStore + 'static>(store: S, options: Options) -> Result<Self> {
        options.validate()?;

        let mut store: Box<dyn BackingStore> = Box::new(store);
        store.ensure_schema()?;

        Ok(Self {
            cache: BlockCache::new(options.cache_capacity),
            options,
            store,
            blocks_written: 0,
            blocks_read: 0,
        })
    }

    /// Opens a block store backed by a [`FileStore`] at `path`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use blockstore::{BlockStore, Options};
    ///
    /// # fn main() -> Result<(), blockstore::Error> {
    /// let mut store = BlockStore::open("./data/blocks.db", Options::default())?;
    /// store.write(b"persist me")?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, options: Options) -> Result<Self> {
        options.validate()?;
        let store = FileStore::open_with(path, &options)?;
        Self::new(store, options)
    }

    /// Writes `data`, persisting every block the cache has not seen.
    ///
    /// The data is split into [`PAGE_SIZE`] blocks. For each block in order:
    /// if its hash is cached the block is skipped, otherwise it is persisted,
    /// cached, and counted as written. A block that was evicted but is still
    /// held by the backing store is cached again without being persisted or
    /// counted. Returns the hash of every block in input order. Empty input
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// A store failure aborts the remaining blocks. Blocks persisted earlier
    /// in the same call stay durable and cached.
    ///
    /// - `HashCollision` if the backing store holds different content under
    ///   the block's hash, or if `verify_on_dedup` is set and a cached block
    ///   with the same hash holds different content
    /// - `CacheFull` if the block cannot be cached because every cached block
    ///   is pinned; nothing is persisted for it
    pub fn write(&mut self, data: &[u8]) -> Result<Vec<BlockHash>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let blocks = create_blocks(data);
        let mut hashes = Vec::with_capacity(blocks.len());

        for block in &blocks {
            let hash = block.hash();
            hashes.push(hash);

            if let Some(cached) = self.cache.lookup(hash) {
                if self.options.verify_on_dedup && cached != block {
                    log::warn!("Hash collision on block {}", hash);
                    return Err(Error::HashCollision(hash));
                }
                log::trace!("Block {} already cached, skipping", hash);
                continue;
            }

            self.admit(hash, block)?;
        }

        Ok(hashes)
    }

    /// Caches a block the cache does not hold, persisting it first unless
    /// the store already has it from before an eviction.
    fn admit(&mut self, hash: BlockHash, block: &Block) -> Result<()> {
        if self.cache.is_saturated() {
            return Err(Error::CacheFull);
        }

        if self.store.contains(hash) {
            // Only an identical durable copy may be re-cached.
            let stored = self.store.get_block(hash)?;
            if stored.as_ref() != Some(block) {
                log::warn!("Hash collision on stored block {}", hash);
                return Err(Error::HashCollision(hash));
            }
            log::debug!("Block {} already durable, re-caching", hash);
            return self.cache.insert(hash, block);
        }

        if let Err(e) = self.store.insert_block(hash, block.page(), block.len()) {
            log::warn!("Failed to persist block {}: {}", hash, e);
            return Err(e);
        }

        self.cache.insert(hash, block)?;
        self.blocks_written += 1;
        log::debug!("Persisted block {} ({} bytes)", hash, block.len());
        Ok(())
    }

    /// Reads a block from the cache.
    ///
    /// Returns `None` if the block is not cached, even if it was persisted
    /// earlier and has since been evicted. Only hits are counted.
    pub fn read(&mut self, hash: BlockHash) -> Option<Block> {
        let block = self.cache.lookup(hash)?.clone();
        self.blocks_read += 1;
        Some(block)
    }

    /// Replaces the backing store and empties the cache.
    ///
    /// The new store's schema is bootstrapped first; on failure the current
    /// store and cache are left untouched.
    pub fn switch_backing_store<S: BackingStore + 'static>(&mut self, store: S) -> Result<()> {
        let mut store: Box<dyn BackingStore> = Box::new(store);
        store.ensure_schema()?;

        let mut old = std::mem::replace(&mut self.store, store);
        if let Err(e) = old.flush() {
            log::warn!("Failed to flush previous backing store: {}", e);
        }

        let dropped = self.cache.len();
        self.cache.clear();
        log::info!("Switched backing store, dropped {} cached blocks", dropped);
        Ok(())
    }

    /// Pins a cached block so writes cannot evict it.
    ///
    /// Returns false if the block is not cached.
    pub fn pin(&mut self, hash: BlockHash) -> bool {
        self.cache.pin(hash)
    }

    /// Releases one pin on a cached block.
    pub fn unpin(&mut self, hash: BlockHash) -> bool {
        self.cache.unpin(hash)
    }

    /// Flushes the backing store to stable storage.
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Number of blocks currently cached.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Total number of blocks served by [`read`](Self::read).
    pub fn total_read_blocks(&self) -> u64 {
        self.blocks_read
    }

    /// Total number of blocks persisted by [`write`](Self::write).
    pub fn total_written_blocks(&self) -> u64 {
        self.blocks_written
    }

    /// Read-only view of the buffer cache.
    pub fn cache(&self) -> &BlockCache {
        &self.cache
    }

    /// Buffer cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Read-only view of the backing store.
    pub fn backing_store(&self) -> &dyn BackingStore {
        self.store.as_ref()
    }

    /// The options this store was created with.
    pub fn options(&self) -> &Options {
        &self.options
    }
}
