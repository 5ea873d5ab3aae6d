use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory key-value store.
///
/// Batches are atomic because they are applied under one write lock.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::outbound::StoreExt;

    #[test]
    fn test_put_get_delete() {
        let store = InMemoryKVStore::new();
        assert_eq!(store.get(b"k").unwrap(), None);

        store.put(b"k", b"v").unwrap();
        assert_eq!(store.get(b"k").unwrap(), Some(b"v".to_vec()));

        store.delete(b"k").unwrap();
        store.delete(b"k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_batch_applies_in_order() {
        let store = InMemoryKVStore::new();
        store.put(b"old", b"1").unwrap();
        store
            .atomic_batch_write(vec![
                BatchOperation::put(b"a".to_vec(), b"1".to_vec()),
                BatchOperation::put(b"a".to_vec(), b"2".to_vec()),
                BatchOperation::delete(b"old".to_vec()),
            ])
            .unwrap();

        assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
        assert_eq!(store.get(b"old").unwrap(), None);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_typed_access() {
        let store = InMemoryKVStore::new();
        store.put_encoded(b"n", &(7u64, "seven".to_string())).unwrap();
        let value: Option<(u64, String)> = store.get_decoded(b"n").unwrap();
        assert_eq!(value, Some((7, "seven".to_string())));

        let missing: Option<u64> = store.get_decoded(b"missing").unwrap();
        assert_eq!(missing, None);
    }
}
