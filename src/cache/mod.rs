//! Buffer cache for data blocks.
//!
//! Provides an LRU (Least Recently Used) cache keyed by block content hash,
//! used by the block store to deduplicate writes and serve reads.

mod lru;

pub use lru::{BlockCache, CacheStats, Iter, DEFAULT_CACHE_CAPACITY};
