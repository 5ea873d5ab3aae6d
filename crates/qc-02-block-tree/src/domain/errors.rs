//! # Domain Errors
//!
//! Error types for the block tree.

use shared_types::{short_hash, BlockStatus, CodecError, Hash};
use thiserror::Error;

/// Key-value store failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KVStoreError {
    #[error("KV store I/O error: {message}")]
    IOError { message: String },

    #[error("KV store corruption: {message}")]
    CorruptionError { message: String },
}

/// Block tree failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("block is for chain {actual}, expected {expected}")]
    ChainIdMismatch { expected: String, actual: String },

    #[error("block {} already exists", short_hash(.0))]
    AlreadyExists(Hash),

    /// Recoverable: the caller buffers the block until its parent arrives.
    #[error("parent {} of block {} is unknown", short_hash(.parent), short_hash(.block))]
    UnknownParent { block: Hash, parent: Hash },

    #[error("block {} not found", short_hash(.0))]
    NotFound(Hash),

    #[error("block {} cannot move from {from} to {to}", short_hash(.block))]
    StatusRegression {
        block: Hash,
        from: BlockStatus,
        to: BlockStatus,
    },

    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl ChainError {
    /// True for `UnknownParent`, the one error a caller is expected to retry.
    pub fn is_orphan(&self) -> bool {
        matches!(self, Self::UnknownParent { .. })
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_converts() {
        let err: ChainError = KVStoreError::IOError {
            message: "disk failure".to_string(),
        }
        .into();
        assert!(err.to_string().contains("disk failure"));
        assert!(!err.is_orphan());
    }

    #[test]
    fn test_unknown_parent_is_orphan() {
        let err = ChainError::UnknownParent {
            block: [1u8; 32],
            parent: [2u8; 32],
        };
        assert!(err.is_orphan());
        assert_eq!(err.to_string(), "parent 02020202 of block 01010101 is unknown");
    }
}
