use crate::{DBColumn, Error, KeyValueStore, KeyValueStoreOp};
use parking_lot::RwLock;
use std::collections::BTreeMap;

type ColumnKey = (&'static str, Vec<u8>);

/// A thread-safe `BTreeMap` wrapper, useful for testing and ephemeral nodes.
#[derive(Default)]
pub struct MemoryStore {
    db: RwLock<BTreeMap<ColumnKey, Vec<u8>>>,
}

impl MemoryStore {
    fn db_key(column: DBColumn, key: &[u8]) -> ColumnKey {
        (column.as_str(), key.to_vec())
    }
}

impl KeyValueStore for MemoryStore {
    fn get_bytes(&self, column: DBColumn, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.db.read().get(&Self::db_key(column, key)).cloned())
    }

    fn put_bytes(&self, column: DBColumn, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.db
            .write()
            .insert(Self::db_key(column, key), value.to_vec());
        Ok(())
    }

    fn key_exists(&self, column: DBColumn, key: &[u8]) -> Result<bool, Error> {
        Ok(self.db.read().contains_key(&Self::db_key(column, key)))
    }

    fn key_delete(&self, column: DBColumn, key: &[u8]) -> Result<(), Error> {
        self.db.write().remove(&Self::db_key(column, key));
        Ok(())
    }

    fn do_atomically(&self, batch: Vec<KeyValueStoreOp>) -> Result<(), Error> {
        // Hold the write lock for the whole batch so readers never observe a partial write.
        let mut db = self.db.write();
        for op in batch {
            match op {
                KeyValueStoreOp::PutKeyValue(column, key, value) => {
                    db.insert((column.as_str(), key), value);
                }
                KeyValueStoreOp::DeleteKey(column, key) => {
                    db.remove(&(column.as_str(), key));
                }
            }
        }
        Ok(())
    }

    fn iter_column_keys(&self, column: DBColumn) -> Vec<Vec<u8>> {
        self.db
            .read()
            .keys()
            .filter(|(col, _)| *col == column.as_str())
            .map(|(_, key)| key.clone())
            .collect()
    }
}
