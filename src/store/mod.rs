//! Persistent node storage. [Database] is the minimal keyed byte store the
//! ledger needs from a backend; [MemDatabase] is the in-memory implementation
//! used by tests and light tooling. A RocksDB-backed implementation lives in
//! the `qledger-tools` crate.

use parking_lot::RwLock;

use std::collections::hash_map::HashMap;

mod treestore;

pub use treestore::{StoreError, TreeStore};

/// An unordered byte store with atomic batch writes. Trie nodes are keyed by
/// their hash, so implementations never need range queries; ordering and
/// prefix traversal are provided by [TreeStore] on top.
pub trait Database: Send + Sync {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;
    fn put(&self, key: &[u8], value: &[u8]);
    fn delete(&self, key: &[u8]);
    /// Apply all writes atomically; `None` values are deletions.
    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>);
}

#[derive(Default)]
pub struct MemDatabase {
    map: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl Database for MemDatabase {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.read().get(key).cloned()
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        self.map.write().insert(key.to_vec(), value.to_vec());
    }

    fn delete(&self, key: &[u8]) {
        self.map.write().remove(key);
    }

    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>) {
        let mut map = self.map.write();
        for (key, value) in batch.into_iter() {
            match value {
                Some(value) => {
                    map.insert(key, value);
                }
                None => {
                    map.remove(&key);
                }
            }
        }
    }
}
