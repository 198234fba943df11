//! LRU (Least Recently Used) buffer cache for data blocks.
//!
//! Entries live in a slot arena and are threaded onto an intrusive doubly
//! linked list ordered from most to least recently used. A `HashMap` from
//! block hash to slot index makes lookup, promotion, insertion, removal and
//! eviction O(1).
//!
//! Recency and pinning are independent: promotion only reorders the list,
//! while a positive pin count exempts a block from eviction.

use crate::block::{Block, BlockHash};
use crate::error::{Error, Result};
use std::collections::HashMap;

/// Default number of blocks the cache holds.
pub const DEFAULT_CACHE_CAPACITY: usize = 50;

/// Statistics for cache performance monitoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Total number of cache lookups
    pub lookups: u64,
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of insertions of new blocks
    pub insertions: u64,
    /// Number of evictions
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0)
    pub fn hit_rate(&self) -> f64 {
        if self.lookups == 0 {
            0.0
        } else {
            self.hits as f64 / self.lookups as f64
        }
    }

    /// Reset all statistics to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug)]
struct Node {
    hash: BlockHash,
    block: Block,
    pins: u32,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Bounded LRU cache mapping block hashes to blocks.
///
/// The cache owns its own copy of every block. It is not synchronized; wrap
/// the owning [`BlockStore`](crate::BlockStore) in a
/// [`SharedBlockStore`](crate::SharedBlockStore) for concurrent use.
#[derive(Debug)]
pub struct BlockCache {
    /// Maximum number of cached blocks
    capacity: usize,
    /// Hash to arena slot
    index: HashMap<BlockHash, usize>,
    /// Arena of list nodes; `None` marks a free slot
    slots: Vec<Option<Node>>,
    /// Free slot indices available for reuse
    free: Vec<usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
    /// Number of blocks with a positive pin count
    pinned: usize,
    stats: CacheStats,
}

impl BlockCache {
    /// Create a new BlockCache holding at most `capacity` blocks.
    ///
    /// A capacity of 0 disables caching: inserts are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use blockstore::cache::BlockCache;
    ///
    /// let cache = BlockCache::new(50);
    /// assert_eq!(cache.capacity(), 50);
    /// assert!(cache.is_empty());
    /// ```
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            index: HashMap::with_capacity(capacity),
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: None,
            tail: None,
            pinned: 0,
            stats: CacheStats::default(),
        }
    }

    /// Get a block from the cache, marking it most recently used.
    ///
    /// Returns `None` on a miss. The returned reference is valid until the
    /// next mutating call.
    pub fn lookup(&mut self, hash: BlockHash) -> Option<&Block> {
        self.stats.lookups += 1;

        let idx = match self.index.get(&hash) {
            Some(&idx) => idx,
            None => {
                self.stats.misses += 1;
                return None;
            }
        };

        self.stats.hits += 1;
        self.promote(idx);
        self.slots[idx].as_ref().map(|node| &node.block)
    }

    /// Get a block without touching recency or statistics.
    pub fn peek(&self, hash: BlockHash) -> Option<&Block> {
        let idx = *self.index.get(&hash)?;
        self.slots[idx].as_ref().map(|node| &node.block)
    }

    /// Check whether a block is cached, without touching recency.
    pub fn contains(&self, hash: BlockHash) -> bool {
        self.index.contains_key(&hash)
    }

    /// Insert a copy of `block` under `hash`.
    ///
    /// If `hash` is already cached the existing entry is promoted and its
    /// content is left untouched. Otherwise, when the cache is full, the
    /// least recently used unpinned block is evicted before the new one is
    /// added.
    ///
    /// # Errors
    ///
    /// Returns `CacheFull` if the cache is full and every block is pinned.
    pub fn insert(&mut self, hash: BlockHash, block: &Block) -> Result<()> {
        if self.capacity == 0 {
            return Ok(());
        }

        if let Some(&idx) = self.index.get(&hash) {
            self.promote(idx);
            return Ok(());
        }

        if self.index.len() >= self.capacity {
            self.evict_one()?;
        }

        let idx = self.allocate(Node {
            hash,
            block: block.clone(),
            pins: 0,
            prev: None,
            next: None,
        });
        self.index.insert(hash, idx);
        self.push_front(idx);
        self.stats.insertions += 1;

        Ok(())
    }

    /// Remove a block regardless of its pin count.
    ///
    /// Removing an absent hash is a no-op.
    pub fn remove(&mut self, hash: BlockHash) -> Option<Block> {
        let idx = self.index.remove(&hash)?;
        let node = self.release(idx)?;
        if node.pins > 0 {
            self.pinned -= 1;
        }
        Some(node.block)
    }

    /// Clear all entries from the cache, pins included.
    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.pinned = 0;
    }

    /// Pin a cached block so it cannot be evicted, and mark it most
    /// recently used. Pins nest; each needs a matching [`unpin`](Self::unpin).
    ///
    /// Returns false if the block is not cached.
    pub fn pin(&mut self, hash: BlockHash) -> bool {
        let Some(&idx) = self.index.get(&hash) else {
            return false;
        };
        if let Some(node) = self.slots[idx].as_mut() {
            if node.pins == 0 {
                self.pinned += 1;
            }
            node.pins = node.pins.saturating_add(1);
        }
        self.promote(idx);
        true
    }

    /// Release one pin on a cached block.
    ///
    /// Returns false if the block is not cached or was not pinned.
    pub fn unpin(&mut self, hash: BlockHash) -> bool {
        let Some(&idx) = self.index.get(&hash) else {
            return false;
        };
        match self.slots[idx].as_mut() {
            Some(node) if node.pins > 0 => {
                node.pins -= 1;
                if node.pins == 0 {
                    self.pinned -= 1;
                }
                true
            }
            _ => false,
        }
    }

    /// Current pin count of a block; 0 if it is not cached.
    pub fn pin_count(&self, hash: BlockHash) -> u32 {
        self.index
            .get(&hash)
            .and_then(|&idx| self.slots[idx].as_ref())
            .map_or(0, |node| node.pins)
    }

    /// Number of cached blocks with a positive pin count.
    pub fn pinned_len(&self) -> usize {
        self.pinned
    }

    /// Returns true if inserting a new block would fail with `CacheFull`.
    pub fn is_saturated(&self) -> bool {
        self.capacity > 0 && self.index.len() >= self.capacity && self.pinned == self.index.len()
    }

    /// Iterate over cached blocks from most to least recently used.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            cache: self,
            cursor: self.head,
        }
    }

    /// Cached hashes from most to least recently used.
    pub fn recency_order(&self) -> Vec<BlockHash> {
        self.iter().map(|(hash, _)| hash).collect()
    }

    /// Copy of every cached entry.
    pub fn dump(&self) -> HashMap<BlockHash, Block> {
        self.iter().map(|(hash, block)| (hash, block.clone())).collect()
    }

    /// Get current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.clone()
    }

    /// Reset cache statistics to zero.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Get the maximum number of cached blocks.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of cached blocks.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Evict the least recently used unpinned block.
    ///
    /// Walks from the tail past pinned blocks.
    fn evict_one(&mut self) -> Result<BlockHash> {
        let mut cursor = self.tail;

        while let Some(idx) = cursor {
            let Some(node) = self.slots[idx].as_ref() else {
                break;
            };
            if node.pins > 0 {
                cursor = node.prev;
                continue;
            }

            let hash = node.hash;
            self.index.remove(&hash);
            self.release(idx);
            self.stats.evictions += 1;
            log::trace!("Evicted block {} from cache", hash);
            return Ok(hash);
        }

        Err(Error::CacheFull)
    }

    fn allocate(&mut self, node: Node) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(node);
                idx
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        }
    }

    fn release(&mut self, idx: usize) -> Option<Node> {
        self.unlink(idx);
        let node = self.slots[idx].take();
        if node.is_some() {
            self.free.push(idx);
        }
        node
    }

    fn promote(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }
        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match self.slots[idx].as_mut() {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.slots[p].as_mut() {
                    node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(n) => {
                if let Some(node) = self.slots[n].as_mut() {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        if let Some(node) = self.slots[idx].as_mut() {
            node.prev = None;
            node.next = old_head;
        }

        match old_head {
            Some(h) => {
                if let Some(node) = self.slots[h].as_mut() {
                    node.prev = Some(idx);
                }
            }
            None => self.tail = Some(idx),
        }

        self.head = Some(idx);
    }
}

/// Iterator over cached blocks in recency order, most recent first.
pub struct Iter<'a> {
    cache: &'a BlockCache,
    cursor: Option<usize>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BlockHash, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.cache.slots[self.cursor?].as_ref()?;
        self.cursor = node.next;
        Some((node.hash, &node.block))
    }
}
