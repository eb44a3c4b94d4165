//! The authenticated tree over a [Database]. All trie nodes are written
//! copy-on-write (removals are ignored), so every root that was ever
//! materialized stays readable and reverting is just re-rooting.

use memory_db::{HashKey, KeyFunction};
use parking_lot::Mutex;
use reference_trie::{ExtensionLayout, RefHasher};
use trie_db::{
    DBValue, HashDB, HashDBRef, Hasher, Trie, TrieDB, TrieDBMut, TrieIterator,
    TrieMut,
};

use std::collections::hash_map::HashMap;
use std::sync::Arc;

use crate::common::Hash;
use crate::store::Database;

type TrieRoot = <RefHasher as Hasher>::Out;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown state root {0}")]
    UnknownRoot(Hash),
}

/// Uncommitted trie nodes, overlaid on the backing [Database]. Cloning shares
/// the overlay (sub-trees write through to their parent's pending set);
/// [NodeStore::deep_copy] forks it.
#[derive(Clone)]
struct NodeStore {
    db: Arc<dyn Database>,
    pending: Arc<Mutex<HashMap<TrieRoot, DBValue>>>,
    null_node_hash: TrieRoot,
    null_node_data: Vec<u8>,
}

impl NodeStore {
    fn new(db: Arc<dyn Database>) -> Self {
        let null_node_data = vec![0u8];
        Self {
            db,
            pending: Arc::new(Mutex::new(HashMap::new())),
            null_node_hash: RefHasher::hash(&null_node_data),
            null_node_data,
        }
    }

    fn deep_copy(&self) -> Self {
        Self {
            db: self.db.clone(),
            pending: Arc::new(Mutex::new(self.pending.lock().clone())),
            null_node_hash: self.null_node_hash,
            null_node_data: self.null_node_data.clone(),
        }
    }

    fn contains_root(&self, root: &TrieRoot) -> bool {
        HashDB::contains(self, root, (&[], None))
    }

    fn db_key(key: &TrieRoot, prefix: (&[u8], Option<u8>)) -> Vec<u8> {
        HashKey::<RefHasher>::key(key, prefix).as_ref().to_vec()
    }

    /// Move every pending node into the backing store in one atomic batch.
    fn flush(&self) {
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return
        }
        let batch = pending
            .drain()
            .map(|(key, value)| (Self::db_key(&key, (&[], None)), Some(value)))
            .collect();
        self.db.write_batch(batch);
    }
}

impl hash_db::AsHashDB<RefHasher, DBValue> for NodeStore {
    fn as_hash_db(&self) -> &dyn HashDB<RefHasher, DBValue> {
        self
    }
    fn as_hash_db_mut<'a>(
        &'a mut self,
    ) -> &'a mut (dyn HashDB<RefHasher, DBValue> + 'a) {
        self
    }
}

impl HashDB<RefHasher, DBValue> for NodeStore {
    fn get(
        &self, key: &TrieRoot, prefix: (&[u8], Option<u8>),
    ) -> Option<DBValue> {
        if key == &self.null_node_hash {
            return Some(self.null_node_data.clone())
        }
        if let Some(value) = self.pending.lock().get(key) {
            return Some(value.clone())
        }
        self.db.get(&Self::db_key(key, prefix))
    }
    fn contains(&self, key: &TrieRoot, prefix: (&[u8], Option<u8>)) -> bool {
        HashDB::get(self, key, prefix).is_some()
    }
    fn emplace(
        &mut self, key: TrieRoot, _prefix: (&[u8], Option<u8>), value: DBValue,
    ) {
        if value == self.null_node_data {
            return
        }
        self.pending.lock().insert(key, value);
    }
    fn insert(&mut self, prefix: (&[u8], Option<u8>), value: &[u8]) -> TrieRoot {
        if value == self.null_node_data {
            return self.null_node_hash
        }
        let key = RefHasher::hash(value);
        HashDB::emplace(self, key, prefix, value.into());
        key
    }
    fn remove(&mut self, _key: &TrieRoot, _prefix: (&[u8], Option<u8>)) {
        // copy-on-write: every materialized root stays reachable
    }
}

impl HashDBRef<RefHasher, DBValue> for NodeStore {
    fn get(
        &self, key: &TrieRoot, prefix: (&[u8], Option<u8>),
    ) -> Option<DBValue> {
        HashDB::get(self, key, prefix)
    }
    fn contains(&self, key: &TrieRoot, prefix: (&[u8], Option<u8>)) -> bool {
        HashDB::contains(self, key, prefix)
    }
}

/// A Merkleized key/value view. `root == None` is the empty tree.
pub struct TreeStore {
    root: Option<TrieRoot>,
    nodes: NodeStore,
}

impl TreeStore {
    /// Open the tree at `root` (`Hash::zero()` opens an empty tree). Fails if
    /// the root is not materialized in the backing store.
    pub fn new(
        root: &Hash, db: Arc<dyn Database>,
    ) -> Result<TreeStore, StoreError> {
        let nodes = NodeStore::new(db);
        Self::rooted(root, nodes)
    }

    fn rooted(root: &Hash, nodes: NodeStore) -> Result<TreeStore, StoreError> {
        if root.is_zero() {
            return Ok(TreeStore { root: None, nodes })
        }
        let mut out = TrieRoot::default();
        out.as_mut().copy_from_slice(root.as_bytes());
        if out == nodes.null_node_hash {
            return Ok(TreeStore { root: None, nodes })
        }
        if !nodes.contains_root(&out) {
            return Err(StoreError::UnknownRoot(root.clone()))
        }
        Ok(TreeStore {
            root: Some(out),
            nodes,
        })
    }

    /// A sub-tree sharing this tree's pending node set, so a later `commit`
    /// on the parent persists sub-tree writes too.
    pub fn subtree(&self, root: &Hash) -> Result<TreeStore, StoreError> {
        Self::rooted(root, self.nodes.clone())
    }

    /// An independent logical clone; divergent writes stay private.
    pub fn copy(&self) -> TreeStore {
        TreeStore {
            root: self.root,
            nodes: self.nodes.deep_copy(),
        }
    }

    /// The Merkle fingerprint of the current logical contents.
    pub fn hash(&self) -> Hash {
        let root = self.root.unwrap_or(self.nodes.null_node_hash);
        Hash::from_slice(root.as_ref())
    }

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let root = self.root.as_ref()?;
        let trie = TrieDB::<ExtensionLayout>::new(&self.nodes, root).ok()?;
        trie.get(key).ok()?
    }

    pub fn set(&mut self, key: &[u8], value: &[u8]) {
        let mut root = self.root.unwrap_or_default();
        {
            let mut trie = match self.root {
                Some(_) => TrieDBMut::<ExtensionLayout>::from_existing(
                    &mut self.nodes,
                    &mut root,
                )
                .unwrap(),
                None => {
                    TrieDBMut::<ExtensionLayout>::new(&mut self.nodes, &mut root)
                }
            };
            trie.insert(key, value).unwrap();
        }
        self.root = Some(root);
    }

    pub fn delete(&mut self, key: &[u8]) -> bool {
        if self.get(key).is_none() {
            return false
        }
        let mut root = self.root.unwrap();
        {
            let mut trie = TrieDBMut::<ExtensionLayout>::from_existing(
                &mut self.nodes,
                &mut root,
            )
            .unwrap();
            trie.remove(key).unwrap();
        }
        self.root = Some(root);
        true
    }

    /// Visit key/value pairs whose keys start with `prefix`, in ascending key
    /// order, until exhaustion or until `visit` returns false. Reads see the
    /// current (possibly uncommitted) contents.
    pub fn traverse<F>(&self, prefix: &[u8], mut visit: F)
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let root = match &self.root {
            Some(root) => root,
            None => return,
        };
        let trie = TrieDB::<ExtensionLayout>::new(&self.nodes, root).unwrap();
        let mut iter = trie.iter().unwrap();
        iter.seek(prefix).unwrap();
        for item in iter {
            let (key, value) = item.unwrap();
            if !key.starts_with(prefix) {
                break
            }
            if !visit(&key, &value) {
                break
            }
        }
    }

    /// Persist all pending nodes into the backing store atomically and return
    /// the committed root.
    pub fn commit(&mut self) -> Hash {
        self.nodes.flush();
        self.hash()
    }

    /// Re-root at a previously materialized (pending or committed) root,
    /// dropping any logical changes made since.
    pub fn revert(&self, root: &Hash) -> Result<TreeStore, StoreError> {
        Self::rooted(root, self.nodes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemDatabase;

    fn empty_store() -> TreeStore {
        TreeStore::new(Hash::zero(), Arc::new(MemDatabase::new())).unwrap()
    }

    #[test]
    fn test_basic_ops() {
        let mut t = empty_store();
        assert_eq!(t.get(b"a"), None);
        t.set(b"a", b"hello");
        t.set(b"b", b"world");
        assert_eq!(t.get(b"a").unwrap(), b"hello");
        assert_eq!(t.get(b"b").unwrap(), b"world");
        assert!(t.delete(b"a"));
        assert!(!t.delete(b"a"));
        assert_eq!(t.get(b"a"), None);
        assert_eq!(t.get(b"b").unwrap(), b"world");
    }

    #[test]
    fn test_content_addressed_hash() {
        let mut t1 = empty_store();
        let mut t2 = empty_store();
        t1.set(b"x", b"1");
        t1.set(b"y", b"2");
        t2.set(b"y", b"2");
        t2.set(b"x", b"1");
        assert_eq!(t1.hash(), t2.hash()); // insertion order is irrelevant
        t2.set(b"x", b"3");
        assert_ne!(t1.hash(), t2.hash());
    }

    #[test]
    fn test_revert_round_trip() {
        let mut t = empty_store();
        t.set(b"k", b"v0");
        let snapshot = t.hash();
        t.set(b"k", b"v1");
        t.set(b"k2", b"v2");
        assert_ne!(t.hash(), snapshot);
        let t = t.revert(&snapshot).unwrap();
        assert_eq!(t.hash(), snapshot);
        assert_eq!(t.get(b"k").unwrap(), b"v0");
        assert_eq!(t.get(b"k2"), None);
    }

    #[test]
    fn test_revert_unknown_root_fails() {
        let t = empty_store();
        assert!(t.revert(&Hash::hash(b"nowhere")).is_err());
    }

    #[test]
    fn test_copy_is_independent() {
        let mut t = empty_store();
        t.set(b"k", b"v0");
        let mut c = t.copy();
        c.set(b"k", b"v1");
        assert_eq!(t.get(b"k").unwrap(), b"v0");
        assert_eq!(c.get(b"k").unwrap(), b"v1");
    }

    #[test]
    fn test_traverse_prefix_ascending() {
        let mut t = empty_store();
        t.set(b"\x03aaa", b"1");
        t.set(b"\x03abc", b"2");
        t.set(b"\x03abd", b"3");
        t.set(b"\x04zzz", b"4");
        t.set(b"\x01xxx", b"5");
        let mut seen = Vec::new();
        t.traverse(b"\x03", |key, value| {
            seen.push((key.to_vec(), value.to_vec()));
            true
        });
        assert_eq!(
            seen,
            vec![
                (b"\x03aaa".to_vec(), b"1".to_vec()),
                (b"\x03abc".to_vec(), b"2".to_vec()),
                (b"\x03abd".to_vec(), b"3".to_vec()),
            ]
        );
        // early termination
        let mut n = 0;
        t.traverse(b"\x03", |_, _| {
            n += 1;
            false
        });
        assert_eq!(n, 1);
    }

    #[test]
    fn test_commit_persists() {
        let db = Arc::new(MemDatabase::new());
        let root = {
            let mut t = TreeStore::new(Hash::zero(), db.clone()).unwrap();
            t.set(b"a", b"hello");
            t.commit()
        };
        let t = TreeStore::new(&root, db).unwrap();
        assert_eq!(t.get(b"a").unwrap(), b"hello");
    }
}
