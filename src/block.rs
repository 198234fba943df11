//! Fixed-capacity data blocks and content hashing.
//!
//! A [`Block`] always owns a full page of [`PAGE_SIZE`] bytes. Only the first
//! [`Block::len`] bytes carry data; the remainder is zero-filled. Blocks are
//! keyed by a [`BlockHash`] derived from their content.

use crate::error::{Error, Result};
use std::fmt;

/// Capacity of a single block in bytes.
pub const PAGE_SIZE: usize = 4096;

/// Content-derived identifier of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockHash(u64);

impl BlockHash {
    /// Wrap a raw 64-bit key.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw 64-bit key.
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockHash {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// A fixed-capacity page of data with a logical length.
///
/// Equality compares the logical length and the whole page, so two blocks
/// holding the same bytes but declaring different lengths are distinct.
#[derive(Clone, PartialEq, Eq)]
pub struct Block {
    data: [u8; PAGE_SIZE],
    len: usize,
}

impl Block {
    /// Create an empty, zero-filled block.
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
            len: 0,
        }
    }

    /// Create a block holding a copy of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `bytes` is longer than [`PAGE_SIZE`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > PAGE_SIZE {
            return Err(Error::invalid_argument(format!(
                "block payload of {} bytes exceeds page size {}",
                bytes.len(),
                PAGE_SIZE
            )));
        }
        Ok(Self::from_chunk(bytes))
    }

    /// Caller guarantees `chunk.len() <= PAGE_SIZE`.
    fn from_chunk(chunk: &[u8]) -> Self {
        let mut block = Self::new();
        block.data[..chunk.len()].copy_from_slice(chunk);
        block.len = chunk.len();
        block
    }

    /// Rebuild a block from a stored page and its declared length.
    pub(crate) fn from_page(page: &[u8], len: usize) -> Result<Self> {
        if page.len() != PAGE_SIZE || len > PAGE_SIZE {
            return Err(Error::corruption(format!(
                "invalid stored page: {} bytes, declared length {}",
                page.len(),
                len
            )));
        }
        let mut block = Self::new();
        block.data.copy_from_slice(page);
        block.len = len;
        Ok(block)
    }

    /// Logical length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the block carries no data.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The logical payload, `len()` bytes long.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The whole page, including zero padding.
    pub fn page(&self) -> &[u8; PAGE_SIZE] {
        &self.data
    }

    /// Compute the content hash of this block.
    ///
    /// BLAKE3 over the little-endian length followed by the full page,
    /// truncated to the first 8 bytes of the digest.
    pub fn hash(&self) -> BlockHash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&(self.len as u64).to_le_bytes());
        hasher.update(&self.data);
        let digest = hasher.finalize();

        let mut raw = [0u8; 8];
        raw.copy_from_slice(&digest.as_bytes()[..8]);
        BlockHash(u64::from_le_bytes(raw))
    }
}

impl Default for Block {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview = &self.data[..self.len.min(16)];
        f.debug_struct("Block")
            .field("len", &self.len)
            .field("head", &preview)
            .finish()
    }
}

/// Split `data` into consecutive blocks of at most [`PAGE_SIZE`] bytes.
///
/// Every block but the last is full; the last holds the remainder with a
/// zero-padded tail. Empty input yields no blocks.
pub fn create_blocks(data: &[u8]) -> Vec<Block> {
    data.chunks(PAGE_SIZE).map(Block::from_chunk).collect()
}
