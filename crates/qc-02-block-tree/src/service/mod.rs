//! # Block Tree Service
//!
//! Hash-addressed storage of `ExtendedBlock`s with parent/child links, a
//! height index, a transaction index and a per-block vote index.
//!
//! ## Concurrency
//!
//! Every mutating operation runs under one mutex per tree, so the
//! read-modify-write of a parent record and its new child cannot lose an
//! update. Reads go straight to the store.

mod finality;
mod index;
mod search;

use crate::domain::errors::{ChainError, ChainResult};
use crate::domain::keys::KeyPrefix;
use crate::domain::TxLocation;
use crate::ports::outbound::{BatchOperation, KeyValueStore, StoreExt};
use parking_lot::Mutex;
use shared_crypto::keccak256;
use shared_types::codec::encode;
use shared_types::{short_hash, Block, BlockStatus, ExtendedBlock, Hash};
use std::sync::Arc;
use tracing::debug;

/// The block tree of one chain.
pub struct BlockTree<S: KeyValueStore> {
    chain_id: String,
    store: Arc<S>,
    root: Hash,
    /// Serializes mutations.
    lock: Mutex<()>,
}

impl<S: KeyValueStore> BlockTree<S> {
    /// Open the tree rooted at `root`, storing it as `Trusted` if absent.
    pub fn new(chain_id: impl Into<String>, store: Arc<S>, root: Block) -> ChainResult<Self> {
        let tree = Self {
            chain_id: chain_id.into(),
            store,
            root: root.hash(),
            lock: Mutex::new(()),
        };

        if tree.store.get(&KeyPrefix::block_key(&tree.root))?.is_none() {
            let mut eb = ExtendedBlock::new(root);
            eb.status = BlockStatus::Trusted;
            tree.write_new_block(&eb, None)?;
            debug!(root = %short_hash(&tree.root), "stored chain root");
        }
        Ok(tree)
    }

    pub fn chain_id(&self) -> &str {
        &self.chain_id
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The root block record.
    pub fn root(&self) -> ChainResult<ExtendedBlock> {
        self.find_block(&self.root)
    }

    pub fn root_hash(&self) -> Hash {
        self.root
    }

    /// Store a new block under its parent.
    ///
    /// Fails with `UnknownParent` when the parent is not stored yet; buffering
    /// orphans is the caller's business.
    pub fn add_block(&self, block: Block) -> ChainResult<ExtendedBlock> {
        if block.header.chain_id != self.chain_id {
            return Err(ChainError::ChainIdMismatch {
                expected: self.chain_id.clone(),
                actual: block.header.chain_id.clone(),
            });
        }

        let hash = block.hash();
        let _guard = self.lock.lock();

        if self.store.get(&KeyPrefix::block_key(&hash))?.is_some() {
            return Err(ChainError::AlreadyExists(hash));
        }
        let mut parent = match self.get_block(&block.parent())? {
            Some(parent) => parent,
            None => {
                return Err(ChainError::UnknownParent {
                    block: hash,
                    parent: block.parent(),
                })
            }
        };

        parent.add_child(hash);
        let eb = ExtendedBlock::new(block);
        self.write_new_block(&eb, Some(&parent))?;

        debug!(
            block = %short_hash(&hash),
            height = eb.height,
            parent = %short_hash(&eb.parent),
            txs = eb.block.txs.len(),
            "added block"
        );
        Ok(eb)
    }

    /// Block record, parent record, height index and tx index in one batch.
    fn write_new_block(
        &self,
        eb: &ExtendedBlock,
        parent: Option<&ExtendedBlock>,
    ) -> ChainResult<()> {
        let hash = eb.hash();
        let mut ops = vec![BatchOperation::put(KeyPrefix::block_key(&hash), encode(eb)?)];
        if let Some(parent) = parent {
            ops.push(BatchOperation::put(
                KeyPrefix::block_key(&parent.hash()),
                encode(parent)?,
            ));
        }

        let height_key = KeyPrefix::height_key(eb.height);
        let mut at_height: Vec<Hash> = self.store.get_decoded(&height_key)?.unwrap_or_default();
        if !at_height.contains(&hash) {
            at_height.push(hash);
        }
        ops.push(BatchOperation::put(height_key, encode(&at_height)?));

        for (index, tx) in eb.block.txs.iter().enumerate() {
            let location = TxLocation {
                block_hash: hash,
                block_height: eb.height,
                index: index as u32,
            };
            ops.push(BatchOperation::put(
                KeyPrefix::tx_key(&keccak256(tx)),
                encode(&location)?,
            ));
        }

        self.store.atomic_batch_write(ops)?;
        Ok(())
    }

    fn get_block(&self, hash: &Hash) -> ChainResult<Option<ExtendedBlock>> {
        self.store.get_decoded(&KeyPrefix::block_key(hash))
    }

    pub fn find_block(&self, hash: &Hash) -> ChainResult<ExtendedBlock> {
        self.get_block(hash)?.ok_or(ChainError::NotFound(*hash))
    }

    pub fn contains(&self, hash: &Hash) -> ChainResult<bool> {
        Ok(self.store.get(&KeyPrefix::block_key(hash))?.is_some())
    }

    /// All stored blocks at `height`, in insertion order.
    pub fn find_blocks_by_height(&self, height: u64) -> ChainResult<Vec<ExtendedBlock>> {
        let hashes: Vec<Hash> = self
            .store
            .get_decoded(&KeyPrefix::height_key(height))?
            .unwrap_or_default();
        hashes.iter().map(|h| self.find_block(h)).collect()
    }

    /// Persist an updated record.
    pub fn save_block(&self, eb: &ExtendedBlock) -> ChainResult<()> {
        let _guard = self.lock.lock();
        self.put_block(eb)
    }

    fn put_block(&self, eb: &ExtendedBlock) -> ChainResult<()> {
        self.store.put_encoded(&KeyPrefix::block_key(&eb.hash()), eb)
    }

    /// Load, change and store one record under the tree lock.
    fn modify_block<T>(
        &self,
        hash: &Hash,
        f: impl FnOnce(&mut ExtendedBlock) -> ChainResult<T>,
    ) -> ChainResult<T> {
        let _guard = self.lock.lock();
        let mut eb = self.find_block(hash)?;
        let out = f(&mut eb)?;
        self.put_block(&eb)?;
        Ok(out)
    }
}
