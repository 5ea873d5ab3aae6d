//! # Block Tree (qc-02)
//!
//! Persistent, hash-addressed tree of blocks. Every stored block has a stored
//! parent (except the configured root), so the tree is always connected; the
//! consensus engine buffers orphans itself.
//!
//! ```text
//!          a0 (root, Trusted)
//!           |
//!          a1
//!         /  \
//!       a2    b2        bh/2 -> [a2, b2]
//!              \
//!               b3      deepest_descendant(a0) -> (b3, 3)
//! ```
//!
//! ## Block lifecycle
//!
//! | From | To |
//! |------|----|
//! | Pending | Valid, Invalid, Committed, finalized |
//! | Valid | Committed, Invalid, finalized |
//! | Committed | finalized, Invalid |
//! | IndirectlyFinalized | DirectlyFinalized |
//!
//! Finalization is prefix-closed: `finalize_ancestors` finalizes a block and
//! all of its unfinalized ancestors in one atomic batch.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Errors, key layout, stored records
//! - `ports/` - The key-value store port
//! - `adapters/` - In-memory store
//! - `service/` - `BlockTree`

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use adapters::InMemoryKVStore;
pub use domain::{ChainError, ChainResult, KVStoreError, KeyPrefix, TxLocation};
pub use ports::outbound::{BatchOperation, KeyValueStore, StoreExt};
pub use service::BlockTree;
