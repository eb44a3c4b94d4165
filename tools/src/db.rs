//! RocksDB-backed [Database]. Since the tree store only ever grows (trie
//! nodes are copy-on-write), the write path is just batched puts.

use rocksdb::{WriteBatch, DB};

use qledger::store::Database;

pub struct RocksDatabase {
    db: DB,
}

impl RocksDatabase {
    pub fn open(path: &str) -> Result<Self, rocksdb::Error> {
        Ok(Self {
            db: DB::open_default(path)?,
        })
    }

    pub fn destroy(path: &str) -> Result<(), rocksdb::Error> {
        DB::destroy(&rocksdb::Options::default(), path)
    }
}

impl Database for RocksDatabase {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.db.get(key).ok()?
    }

    fn put(&self, key: &[u8], value: &[u8]) {
        self.db.put(key, value).unwrap();
    }

    fn delete(&self, key: &[u8]) {
        self.db.delete(key).unwrap();
    }

    fn write_batch(&self, batch: Vec<(Vec<u8>, Option<Vec<u8>>)>) {
        let mut wb = WriteBatch::default();
        for (key, value) in batch.into_iter() {
            match value {
                Some(value) => wb.put(key, value),
                None => wb.delete(key),
            }
        }
        self.db.write(wb).unwrap();
    }
}
