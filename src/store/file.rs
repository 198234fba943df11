//! File-backed block store.
//!
//! The file starts with a fixed header identifying the format, followed by
//! fixed-size block records:
//!
//! ```text
//! [Header: magic u32 | version u32 | page_size u32]   (bincode)
//! [Record 1]
//! [Record 2]
//! ...
//! ```
//!
//! Each record:
//! ```text
//! [checksum: u32]      // CRC32 of hash, declared_len and page
//! [hash: u64]
//! [declared_len: u32]
//! [page: PAGE_SIZE bytes]
//! ```
//!
//! All integers are little endian. Records are only ever appended.

use super::BackingStore;
use crate::block::{Block, BlockHash, PAGE_SIZE};
use crate::config::Options;
use crate::error::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use crc32fast::Hasher;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic number at the start of every store file ("BLKS").
const MAGIC: u32 = 0x424c_4b53;

/// Current on-disk format version.
const FORMAT_VERSION: u32 = 1;

/// Encoded size of [`StoreHeader`].
const HEADER_SIZE: u64 = 12;

/// Size of the record header (checksum + hash + declared length).
const RECORD_HEADER_SIZE: usize = 16;

/// Size of one encoded block record.
pub const RECORD_SIZE: usize = RECORD_HEADER_SIZE + PAGE_SIZE;

/// Format header written by [`BackingStore::ensure_schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHeader {
    /// Format identifier
    pub magic: u32,
    /// Format version
    pub version: u32,
    /// Page size the file was created with
    pub page_size: u32,
}

impl StoreHeader {
    /// Header for files written by this build.
    pub fn current() -> Self {
        Self {
            magic: MAGIC,
            version: FORMAT_VERSION,
            page_size: PAGE_SIZE as u32,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(Error::corruption(format!("bad store magic: {:#x}", self.magic)));
        }
        if self.version != FORMAT_VERSION {
            return Err(Error::corruption(format!(
                "unsupported store version: {}",
                self.version
            )));
        }
        if self.page_size as usize != PAGE_SIZE {
            return Err(Error::corruption(format!(
                "store page size {} does not match {}",
                self.page_size, PAGE_SIZE
            )));
        }
        Ok(())
    }
}

/// Append-only block log on disk.
#[derive(Debug)]
pub struct FileStore {
    /// Path to the store file
    path: PathBuf,
    file: File,
    /// Record offset of every stored block
    offsets: HashMap<BlockHash, u64>,
    /// Offset where the next record goes
    end: u64,
    schema_ready: bool,
    sync_writes: bool,
}

impl FileStore {
    /// Open the store file at `path`, creating the file if needed.
    ///
    /// The parent directory must already exist. Every persisted block is
    /// synced to disk.
    ///
    /// # Errors
    ///
    /// Returns `Connection` if the location cannot be used, or `Corruption`
    /// if an existing file is damaged.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &Options::default().create_if_missing(false))
    }

    /// Open the store file at `path` honouring `create_if_missing` and
    /// `sync_writes` from `options`.
    pub fn open_with<P: AsRef<Path>>(path: P, options: &Options) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if path.is_dir() {
            return Err(Error::connection(format!("store path is a directory: {:?}", path)));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                if options.create_if_missing {
                    std::fs::create_dir_all(parent)?;
                } else {
                    return Err(Error::connection(format!(
                        "store directory does not exist: {:?}",
                        parent
                    )));
                }
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Error::connection(format!("cannot open {:?}: {}", path, e)))?;

        let mut store = Self {
            path,
            file,
            offsets: HashMap::new(),
            end: 0,
            schema_ready: false,
            sync_writes: options.sync_writes,
        };
        store.recover()?;

        log::info!(
            "Opened file store {:?} with {} blocks",
            store.path,
            store.offsets.len()
        );
        Ok(store)
    }

    /// Get the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one encoded record at the end of the log.
    fn append(&mut self, record: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(self.end))?;
        self.file.write_all(record)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    /// Cut the file back to the last acknowledged record so a failed insert
    /// cannot resurface on reopen.
    fn discard_unacknowledged(&mut self) {
        if let Err(e) = self.file.set_len(self.end).and_then(|_| self.file.sync_all()) {
            log::warn!(
                "Failed to discard partial record at offset {} in {:?}: {}",
                self.end,
                self.path,
                e
            );
        }
    }

    /// Rebuild the key index from the records on disk.
    fn recover(&mut self) -> Result<()> {
        let file_len = self.file.metadata()?.len();
        if file_len == 0 {
            return Ok(());
        }

        if file_len < HEADER_SIZE {
            return Err(Error::corruption(format!(
                "store header truncated: {} bytes",
                file_len
            )));
        }

        let mut header_buf = [0u8; HEADER_SIZE as usize];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut header_buf)?;
        let header: StoreHeader = bincode::deserialize(&header_buf)?;
        header.validate()?;
        self.schema_ready = true;

        let mut offset = HEADER_SIZE;
        let mut record = vec![0u8; RECORD_SIZE];

        while offset < file_len {
            if file_len - offset < RECORD_SIZE as u64 {
                log::warn!(
                    "Truncating torn record at offset {} in {:?} ({} trailing bytes)",
                    offset,
                    self.path,
                    file_len - offset
                );
                self.file.set_len(offset)?;
                self.file.sync_all()?;
                break;
            }

            self.file.read_exact(&mut record)?;
            let (hash, _) = decode_record(&record)
                .map_err(|e| Error::corruption(format!("record at offset {}: {}", offset, e)))?;

            if self.offsets.insert(hash, offset).is_some() {
                return Err(Error::corruption(format!(
                    "block {} stored twice (second copy at offset {})",
                    hash, offset
                )));
            }
            offset += RECORD_SIZE as u64;
        }

        self.end = offset;
        Ok(())
    }
}

impl BackingStore for FileStore {
    fn ensure_schema(&mut self) -> Result<()> {
        if self.schema_ready {
            return Ok(());
        }

        let header = bincode::serialize(&StoreHeader::current())?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&header)?;
        self.file.sync_all()?;

        self.end = HEADER_SIZE;
        self.schema_ready = true;
        log::debug!("Initialized store schema in {:?}", self.path);
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
        if !self.schema_ready {
            return Err(Error::invalid_state(format!(
                "store schema not initialized: {:?}",
                self.path
            )));
        }
        if self.offsets.contains_key(&hash) {
            return Err(Error::DuplicateKey(hash));
        }

        let record = encode_record(hash, content, declared_len);
        if let Err(e) = self.append(&record) {
            self.discard_unacknowledged();
            return Err(e);
        }

        self.offsets.insert(hash, self.end);
        self.end += RECORD_SIZE as u64;
        Ok(())
    }

    fn get_block(&mut self, hash: BlockHash) -> Result<Option<Block>> {
        let Some(&offset) = self.offsets.get(&hash) else {
            return Ok(None);
        };

        let mut record = vec![0u8; RECORD_SIZE];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut record)?;

        let (stored_hash, block) = decode_record(&record)?;
        if stored_hash != hash {
            return Err(Error::corruption(format!(
                "expected block {} at offset {}, found {}",
                hash, offset, stored_hash
            )));
        }
        Ok(Some(block))
    }

    fn contains(&self, hash: BlockHash) -> bool {
        self.offsets.contains_key(&hash)
    }

    fn len(&self) -> usize {
        self.offsets.len()
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

fn checksum(hash: BlockHash, declared_len: u32, page: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(&hash.as_u64().to_le_bytes());
    hasher.update(&declared_len.to_le_bytes());
    hasher.update(page);
    hasher.finalize()
}

/// Caller guarantees `page.len() == PAGE_SIZE`.
fn encode_record(hash: BlockHash, page: &[u8], declared_len: usize) -> BytesMut {
    let declared_len = declared_len as u32;
    let mut buf = BytesMut::with_capacity(RECORD_SIZE);
    buf.put_u32_le(checksum(hash, declared_len, page));
    buf.put_u64_le(hash.as_u64());
    buf.put_u32_le(declared_len);
    buf.put_slice(page);
    buf
}

fn decode_record(mut data: &[u8]) -> Result<(BlockHash, Block)> {
    if data.len() != RECORD_SIZE {
        return Err(Error::corruption(format!("record has {} bytes", data.len())));
    }

    let stored_checksum = data.get_u32_le();
    let hash = BlockHash::new(data.get_u64_le());
    let declared_len = data.get_u32_le();

    let actual = checksum(hash, declared_len, data);
    if stored_checksum != actual {
        return Err(Error::corruption(format!(
            "Checksum mismatch: expected {:#x}, got {:#x}",
            stored_checksum, actual
        )));
    }

    let block = Block::from_page(data, declared_len as usize)?;
    Ok((hash, block))
}
