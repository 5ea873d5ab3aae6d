//! Persisted consensus state.
//!
//! Lives in the block tree's key-value store under the `cs/` prefix:
//!
//! | Key | Value |
//! |-----|-------|
//! | `cs/ss` | `StateStub` |
//! | `cs/vbb/` + block hash | `VoteSet` of votes collected for the block |
//! | `cs/vbh` | Highest height claimed by the votes of each `cs/vbb/` block |
//! | `cs/ev` | `VoteSet` of the latest vote per voter, for epoch catch-up |

use crate::domain::ConsensusResult;
use parking_lot::Mutex;
use qc_02_block_tree::{BatchOperation, KeyValueStore, StoreExt};
use serde::{Deserialize, Serialize};
use shared_types::codec::encode;
use shared_types::{Hash, Vote, VoteSet};
use std::collections::BTreeMap;
use std::sync::Arc;

const STATE_STUB_KEY: &[u8] = b"cs/ss";
const VOTES_BY_BLOCK_PREFIX: &[u8] = b"cs/vbb/";
const VOTE_HEIGHTS_KEY: &[u8] = b"cs/vbh";
const EPOCH_VOTES_KEY: &[u8] = b"cs/ev";

type VoteHeights = BTreeMap<Hash, u64>;

/// Crash-recovery snapshot of the consensus core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateStub {
    /// Root of the chain this state belongs to
    pub root: Hash,
    pub highest_cc_block: Hash,
    pub last_finalized_block: Hash,
    pub last_vote_height: u64,
    pub epoch: u64,
}

/// Encapsulates the persisted state of the consensus core.
pub struct StateStore<S: KeyValueStore> {
    store: Arc<S>,
    /// Serializes the read-modify-write of vote sets.
    votes_lock: Mutex<()>,
}

impl<S: KeyValueStore> StateStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            votes_lock: Mutex::new(()),
        }
    }

    pub fn load(&self) -> ConsensusResult<Option<StateStub>> {
        Ok(self.store.get_decoded(STATE_STUB_KEY)?)
    }

    pub fn commit(&self, stub: &StateStub) -> ConsensusResult<()> {
        Ok(self.store.put_encoded(STATE_STUB_KEY, stub)?)
    }

    /// Add `vote` to its block's set and return the updated set.
    pub fn add_vote_for_block(&self, vote: &Vote) -> ConsensusResult<VoteSet> {
        let _guard = self.votes_lock.lock();
        let key = votes_by_block_key(&vote.block);
        let mut votes: VoteSet = self.store.get_decoded(&key)?.unwrap_or_default();
        let mut heights = self.vote_heights()?;
        if heights.get(&vote.block).map_or(true, |h| *h < vote.height) {
            heights.insert(vote.block, vote.height);
            self.store.put_encoded(VOTE_HEIGHTS_KEY, &heights)?;
        }
        votes.add_vote(vote.clone());
        self.store.put_encoded(&key, &votes)?;
        Ok(votes)
    }

    pub fn votes_for_block(&self, block: &Hash) -> ConsensusResult<VoteSet> {
        Ok(self
            .store
            .get_decoded(&votes_by_block_key(block))?
            .unwrap_or_default())
    }

    /// Drop the collected votes of every block at or below `height`,
    /// including blocks that never arrived. A block is indexed at the highest
    /// height any of its votes claims. Returns how many sets were removed.
    pub fn prune_votes_through(&self, height: u64) -> ConsensusResult<usize> {
        let _guard = self.votes_lock.lock();
        let (pruned, kept): (VoteHeights, VoteHeights) = self
            .vote_heights()?
            .into_iter()
            .partition(|(_, voted_at)| *voted_at <= height);
        if pruned.is_empty() {
            return Ok(0);
        }

        let mut batch: Vec<BatchOperation> = pruned
            .keys()
            .map(|block| BatchOperation::delete(votes_by_block_key(block)))
            .collect();
        batch.push(BatchOperation::put(VOTE_HEIGHTS_KEY, encode(&kept)?));
        self.store.atomic_batch_write(batch)?;
        Ok(pruned.len())
    }

    fn vote_heights(&self) -> ConsensusResult<VoteHeights> {
        Ok(self.store.get_decoded(VOTE_HEIGHTS_KEY)?.unwrap_or_default())
    }

    /// Record `vote` as its voter's latest and return the collapsed set.
    pub fn add_epoch_vote(&self, vote: &Vote) -> ConsensusResult<VoteSet> {
        let _guard = self.votes_lock.lock();
        let mut votes: VoteSet = self.store.get_decoded(EPOCH_VOTES_KEY)?.unwrap_or_default();
        votes.add_vote(vote.clone());
        let votes = votes.unique_voter();
        self.store.put_encoded(EPOCH_VOTES_KEY, &votes)?;
        Ok(votes)
    }

    pub fn epoch_votes(&self) -> ConsensusResult<VoteSet> {
        Ok(self.store.get_decoded(EPOCH_VOTES_KEY)?.unwrap_or_default())
    }
}

fn votes_by_block_key(block: &Hash) -> Vec<u8> {
    let mut key = Vec::with_capacity(VOTES_BY_BLOCK_PREFIX.len() + block.len());
    key.extend_from_slice(VOTES_BY_BLOCK_PREFIX);
    key.extend_from_slice(block);
    key
}
