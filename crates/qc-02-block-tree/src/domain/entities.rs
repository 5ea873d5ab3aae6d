//! Records stored next to the blocks.

use serde::{Deserialize, Serialize};
use shared_types::Hash;

/// Where a transaction was included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxLocation {
    pub block_hash: Hash,
    pub block_height: u64,
    /// Position in the block's transaction list.
    pub index: u32,
}

