//! Transaction and vote indices.

use super::*;
use shared_types::{Vote, VoteSet};

impl<S: KeyValueStore> BlockTree<S> {
    /// Where the transaction with this Keccak-256 hash was included. When the
    /// same transaction sits in several forks, the latest added block wins.
    pub fn find_tx(&self, tx_hash: &Hash) -> ChainResult<Option<TxLocation>> {
        self.store.get_decoded(&KeyPrefix::tx_key(tx_hash))
    }

    /// Add a vote to the set kept for its block.
    pub fn add_vote_to_index(&self, vote: &Vote) -> ChainResult<()> {
        let _guard = self.lock.lock();
        let key = KeyPrefix::votes_key(&vote.block);
        let mut votes: VoteSet = self.store.get_decoded(&key)?.unwrap_or_default();
        votes.add_vote(vote.clone());
        self.store.put_encoded(&key, &votes)
    }

    /// Votes indexed for `block`; empty when none.
    pub fn find_votes_by_hash(&self, block: &Hash) -> ChainResult<VoteSet> {
        Ok(self
            .store
            .get_decoded(&KeyPrefix::votes_key(block))?
            .unwrap_or_default())
    }

    pub fn remove_votes_by_hash(&self, block: &Hash) -> ChainResult<()> {
        let _guard = self.lock.lock();
        self.store.delete(&KeyPrefix::votes_key(block))?;
        Ok(())
    }
}
