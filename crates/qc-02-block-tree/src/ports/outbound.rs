//! # Outbound Ports (Driven Ports)
//!
//! The key-value store the block tree persists into. The consensus state stub
//! lives in the same store under its own prefixes.
//!
//! Only atomic single-key operations plus an atomic batch are required; the
//! tree orders dependent writes itself (parent record together with child).

use crate::domain::errors::{ChainError, KVStoreError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::codec::{decode, encode};

/// Abstract interface for key-value database operations.
///
/// Implementations use interior locking so one store can be shared behind an
/// `Arc` by the block tree and the consensus state.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key. `None` when the key is absent.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Deleting an absent key is not an error.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Either all operations are applied, or none.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Typed access through the canonical codec.
pub trait StoreExt: KeyValueStore {
    fn get_decoded<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, ChainError> {
        match self.get(key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_encoded<T: Serialize + ?Sized>(&self, key: &[u8], value: &T) -> Result<(), ChainError> {
        let bytes = encode(value)?;
        self.put(key, &bytes)?;
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}
