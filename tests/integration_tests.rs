// End-to-End Integration Tests for blockstore
// These tests verify complete write/read flows through the cache and the backing stores

use blockstore::{
    create_blocks, BackingStore, Block, BlockHash, BlockStore, FileStore, MemoryStore, Options,
    PAGE_SIZE,
};
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

/// Distinct single-page payloads, one per index.
fn page(i: usize) -> Vec<u8> {
    format!("page number {:08}", i).into_bytes()
}

/// Test complete write and read-back flow
#[test]
fn test_e2e_write_read_roundtrip() {
    env_logger::try_init().ok();
    let mut store = BlockStore::new(MemoryStore::new(), Options::default()).unwrap();
    let data = random_bytes(10_000, 1);

    let hashes = store.write(&data).unwrap();
    assert_eq!(hashes.len(), 3);

    let mut rebuilt = Vec::new();
    for hash in &hashes {
        let block = store.read(*hash).expect("freshly written block is cached");
        rebuilt.extend_from_slice(block.as_bytes());
    }

    assert_eq!(rebuilt, data);
    assert_eq!(store.total_read_blocks(), 3);
    assert_eq!(store.total_written_blocks(), 3);
}

/// A 10 000 byte write produces blocks of 4096, 4096 and 1808 bytes
#[test]
fn test_e2e_block_lengths() {
    let mut store = BlockStore::new(MemoryStore::new(), Options::default()).unwrap();
    let data = random_bytes(10_000, 2);

    let hashes = store.write(&data).unwrap();
    let lengths: Vec<usize> = hashes
        .iter()
        .map(|h| store.read(*h).unwrap().len())
        .collect();

    assert_eq!(lengths, vec![4096, 4096, 1808]);
}

/// Writing the same full block twice persists it once
#[test]
fn test_e2e_same_block_twice() {
    let backing = MemoryStore::new();
    let mut store = BlockStore::new(backing.clone(), Options::default()).unwrap();
    let data = random_bytes(PAGE_SIZE, 3);

    store.write(&data).unwrap();
    store.write(&data).unwrap();

    assert_eq!(store.total_written_blocks(), 1);
    assert_eq!(store.cache_len(), 1);
    assert_eq!(backing.len(), 1);
}

/// Reading an unknown hash changes nothing
#[test]
fn test_e2e_read_unknown_hash() {
    let mut store = BlockStore::new(MemoryStore::new(), Options::default()).unwrap();
    store.write(b"something").unwrap();

    assert!(store.read(BlockHash::new(0xDEAD_BEEF)).is_none());
    assert_eq!(store.total_read_blocks(), 0);
    assert_eq!(store.total_written_blocks(), 1);
}

/// Blocks evicted from the cache read as not found even though they are durable
#[test]
fn test_e2e_read_after_evict() {
    let backing = MemoryStore::new();
    let mut store = BlockStore::new(backing.clone(), Options::new().cache_capacity(3)).unwrap();

    let hashes: Vec<BlockHash> = (0..5).map(|i| store.write(&page(i)).unwrap()[0]).collect();

    assert!(store.read(hashes[0]).is_none());
    assert!(store.read(hashes[1]).is_none());
    for hash in &hashes[2..] {
        assert!(store.read(*hash).is_some());
    }

    // Still durable
    assert!(backing.contains(hashes[0]));
    assert_eq!(backing.len(), 5);
    assert_eq!(store.total_read_blocks(), 3);
}

/// Cache-level LRU scenario with capacity 2
#[test]
fn test_e2e_cache_scenario_abc() {
    let mut store = BlockStore::new(MemoryStore::new(), Options::new().cache_capacity(2)).unwrap();

    let a = store.write(b"A").unwrap()[0];
    let b = store.write(b"B").unwrap()[0];
    let c = store.write(b"C").unwrap()[0];

    assert_eq!(store.cache_len(), 2);
    assert_eq!(store.cache().recency_order(), vec![c, b]);
    assert!(!store.cache().contains(a));
}

/// Reads promote blocks, changing which block is evicted next
#[test]
fn test_e2e_read_promotes() {
    let mut store = BlockStore::new(MemoryStore::new(), Options::new().cache_capacity(2)).unwrap();

    let a = store.write(b"A").unwrap()[0];
    let b = store.write(b"B").unwrap()[0];
    assert!(store.read(a).is_some());

    let c = store.write(b"C").unwrap()[0];

    assert!(store.read(a).is_some());
    assert!(store.read(b).is_none());
    assert!(store.read(c).is_some());
}

/// Idempotent rewrites only touch blocks that were evicted meanwhile
#[test]
fn test_e2e_idempotent_rewrite() {
    let mut store = BlockStore::new(MemoryStore::new(), Options::new().cache_capacity(4)).unwrap();
    let data = random_bytes(3 * PAGE_SIZE, 4);

    store.write(&data).unwrap();
    let written = store.total_written_blocks();

    store.write(&data).unwrap();
    assert_eq!(store.total_written_blocks(), written);

    // Push two of the three blocks out
    store.write(&page(100)).unwrap();
    store.write(&page(101)).unwrap();
    store.write(&page(102)).unwrap();
    let before = store.total_written_blocks();

    store.write(&data).unwrap();
    assert!(store.total_written_blocks() - before <= 3);
    assert_eq!(store.cache_len(), 4);
}

/// End-to-end flow over a file-backed store, including reopen
#[test]
fn test_e2e_file_store_roundtrip() {
    env_logger::try_init().ok();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("blocks.db");
    let data = random_bytes(5 * PAGE_SIZE + 123, 5);

    let hashes = {
        let mut store = BlockStore::open(&path, Options::default()).unwrap();
        let hashes = store.write(&data).unwrap();
        assert_eq!(store.total_written_blocks(), 6);
        store.flush().unwrap();
        hashes
    };

    // A fresh cache knows nothing, but the file holds every block
    let mut reopened = BlockStore::open(&path, Options::default()).unwrap();
    assert_eq!(reopened.cache_len(), 0);
    assert!(reopened.read(hashes[0]).is_none());
    assert_eq!(reopened.backing_store().len(), 6);

    let mut file = FileStore::open(&path).unwrap();
    let mut rebuilt = Vec::new();
    for hash in &hashes {
        rebuilt.extend_from_slice(file.get_block(*hash).unwrap().unwrap().as_bytes());
    }
    assert_eq!(rebuilt, data);

    // Rewriting after reopen re-caches without duplicating
    reopened.write(&data).unwrap();
    assert_eq!(reopened.total_written_blocks(), 0);
    assert_eq!(reopened.backing_store().len(), 6);
    assert!(reopened.read(hashes[0]).is_some());
}

/// Switching between file stores gives each its own dedup scope
#[test]
fn test_e2e_switch_between_file_stores() {
    let dir = TempDir::new().unwrap();
    let first_path = dir.path().join("first.db");
    let second_path = dir.path().join("second.db");

    let mut store = BlockStore::open(&first_path, Options::default()).unwrap();
    let hashes = store.write(b"moves between stores").unwrap();

    store
        .switch_backing_store(FileStore::open(&second_path).unwrap())
        .unwrap();
    assert_eq!(store.cache_len(), 0);
    assert!(store.read(hashes[0]).is_none());

    store.write(b"moves between stores").unwrap();
    assert_eq!(store.total_written_blocks(), 2);
    drop(store);

    assert!(FileStore::open(&first_path).unwrap().contains(hashes[0]));
    assert!(FileStore::open(&second_path).unwrap().contains(hashes[0]));
}

/// A boxed store trait object works as a backing store
#[test]
fn test_e2e_boxed_backing_store() {
    let backing = MemoryStore::new();
    let boxed: Box<dyn BackingStore> = Box::new(backing.clone());
    let mut store = BlockStore::new(boxed, Options::default()).unwrap();

    store.write(b"through a box").unwrap();
    assert_eq!(backing.len(), 1);
}

/// The chunking function agrees with what the store writes
#[test]
fn test_e2e_create_blocks_matches_written_hashes() {
    let data = random_bytes(3 * PAGE_SIZE - 1, 6);
    let expected: Vec<BlockHash> = create_blocks(&data).iter().map(Block::hash).collect();

    let mut store = BlockStore::new(MemoryStore::new(), Options::default()).unwrap();
    assert_eq!(store.write(&data).unwrap(), expected);
}

/// Many distinct blocks through a small cache
#[test]
fn test_e2e_many_blocks_small_cache() {
    let backing = MemoryStore::new();
    let mut store = BlockStore::new(backing.clone(), Options::new().cache_capacity(50)).unwrap();

    let mut data = Vec::with_capacity(200 * PAGE_SIZE);
    for i in 0..200 {
        let mut chunk = page(i);
        chunk.resize(PAGE_SIZE, 0);
        data.extend_from_slice(&chunk);
    }

    let hashes = store.write(&data).unwrap();
    assert_eq!(hashes.len(), 200);
    assert_eq!(store.total_written_blocks(), 200);
    assert_eq!(store.cache_len(), 50);
    assert_eq!(backing.len(), 200);

    assert!(store.read(hashes[149]).is_none());
    assert!(store.read(hashes[150]).is_some());

    let stats = store.cache_stats();
    assert_eq!(stats.evictions, 150);
    assert_eq!(stats.insertions, 200);
}
