//! # Committee Vote Engines
//!
//! Guardians and elite edge nodes co-sign checkpoint blocks (finalized blocks
//! at multiples of `committee_checkpoint_interval`). Each member signs once;
//! aggregates are then gossiped and merged round by round:
//!
//! ```text
//! start_new_block(b)   round = 1, next = own signature (members only)
//! start_new_round()    round += 1 (capped), curr = next   -> broadcast curr
//! process_vote(v)      next = merge(next, v)              -> best_vote = next
//! ```
//!
//! A multiplicity above `2^(round * MAX_LOG_NEIGHBORS)` cannot come out of
//! honest gossip after `round` rounds, so such aggregates are rejected.

mod bookkeeper;
mod elite_edge_node;
mod guardian;
mod sampling;

pub use bookkeeper::VoteBookkeeper;
pub use elite_edge_node::EliteEdgeNodeEngine;
pub use guardian::GuardianEngine;
pub use sampling::SamplingGate;

use shared_crypto::BlsKeyPair;
use shared_types::{
    short_hash, AggregateVoteError, CandidatePool, Hash, ThresholdVotes, VoteScope, MAX_ROUND,
};

/// Why an incoming committee vote was not used.
#[derive(Debug, thiserror::Error)]
pub enum VoteRejection {
    #[error("No checkpoint block in progress")]
    NoCurrentBlock,

    #[error("Vote is for block {}, expected {}", short_hash(.actual), short_hash(.expected))]
    BlockMismatch { expected: Hash, actual: Hash },

    #[error("Multiplicities exceed the cap of round {round}")]
    ExceedsRoundCap { round: u32 },

    #[error("Signer is not eligible for this block")]
    NotSampled,

    #[error("Vote already seen")]
    Duplicate,

    #[error(transparent)]
    Invalid(#[from] AggregateVoteError),
}

/// Round bookkeeping shared by both committee engines.
#[derive(Debug)]
pub(crate) struct RoundState<S: VoteScope> {
    scope: Option<S>,
    pool: CandidatePool<S::Kind>,
    is_member: bool,
    round: u32,
    curr_vote: Option<ThresholdVotes<S>>,
    next_vote: Option<ThresholdVotes<S>>,
}

impl<S: VoteScope> RoundState<S> {
    pub(crate) fn new() -> Self {
        Self {
            scope: None,
            pool: CandidatePool::default(),
            is_member: false,
            round: 1,
            curr_vote: None,
            next_vote: None,
        }
    }

    /// Reset for a new checkpoint. `signer` is the local key and its index in
    /// `pool.with_stake()`, when the local node is a member.
    pub(crate) fn start_new_block(
        &mut self,
        scope: S,
        pool: CandidatePool<S::Kind>,
        signer: Option<(&BlsKeyPair, usize)>,
    ) {
        let committee_size = pool.with_stake().len();
        self.next_vote = signer.and_then(|(key, index)| {
            let mut vote = ThresholdVotes::new(scope.clone(), committee_size);
            vote.sign(key, index).then_some(vote)
        });
        self.is_member = self.next_vote.is_some();
        self.scope = Some(scope);
        self.pool = pool;
        self.round = 1;
        self.curr_vote = None;
    }

    pub(crate) fn start_new_round(&mut self) {
        if self.scope.is_none() {
            return;
        }
        self.round = (self.round + 1).min(MAX_ROUND);
        self.curr_vote = self.next_vote.clone();
    }

    pub(crate) fn block(&self) -> Option<Hash> {
        self.scope.as_ref().map(VoteScope::block)
    }

    pub(crate) fn pool(&self) -> &CandidatePool<S::Kind> {
        &self.pool
    }

    pub(crate) fn round(&self) -> u32 {
        self.round
    }

    pub(crate) fn vote_to_broadcast(&self) -> Option<ThresholdVotes<S>> {
        self.curr_vote.clone()
    }

    pub(crate) fn best_vote(&self) -> Option<ThresholdVotes<S>> {
        self.next_vote.clone()
    }

    /// Checks the block is the current one. Used before any expensive work.
    pub(crate) fn check_block(&self, block: &Hash) -> Result<(), VoteRejection> {
        let expected = self.block().ok_or(VoteRejection::NoCurrentBlock)?;
        if *block != expected {
            return Err(VoteRejection::BlockMismatch {
                expected,
                actual: *block,
            });
        }
        Ok(())
    }

    /// Fold `vote` into `next_vote`. Returns whether `next_vote` changed.
    ///
    /// With `pass_through` set, a non-member keeps whichever aggregate has
    /// more signers instead of merging.
    pub(crate) fn process_vote(
        &mut self,
        vote: ThresholdVotes<S>,
        pass_through: bool,
    ) -> Result<bool, VoteRejection> {
        self.check_block(&vote.block())?;
        vote.scope.check_pool(&self.pool)?;
        if !vote.check_multiplies_for_round(self.round) {
            return Err(VoteRejection::ExceedsRoundCap { round: self.round });
        }
        vote.validate(&self.pool)?;

        let candidate = match &self.next_vote {
            None => vote,
            Some(next) if pass_through && !self.is_member => {
                let picked = next.pick(&vote)?;
                if picked == next {
                    return Ok(false);
                }
                picked.clone()
            }
            Some(next) => match next.merge(&vote)? {
                Some(merged) => merged,
                None => return Ok(false),
            },
        };

        let next_round = (self.round + 1).min(MAX_ROUND);
        if !candidate.check_multiplies_for_round(next_round) {
            return Err(VoteRejection::ExceedsRoundCap { round: next_round });
        }
        self.next_vote = Some(candidate);
        Ok(true)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Committee fixtures: BLS keys with matching candidate pools.

    use shared_crypto::BlsKeyPair;
    use shared_types::{CandidatePool, CommitteeKind, CommitteeMember, Stake, StakeHolder};

    /// Member `i` has holder address `[i + 1; 20]`, so pool index == key index.
    pub fn committee<K: CommitteeKind>(n: usize) -> (Vec<BlsKeyPair>, CandidatePool<K>) {
        let keys: Vec<BlsKeyPair> = (0..n)
            .map(|_| BlsKeyPair::generate().unwrap_or_else(|e| panic!("bls keygen: {e}")))
            .collect();
        let pool = CandidatePool::from_members(keys.iter().enumerate().map(|(i, key)| {
            CommitteeMember {
                holder: StakeHolder::new([i as u8 + 1; 20], vec![Stake::new([0xAA; 20], 1_000)]),
                pubkey: key.public_key(),
            }
        }));
        (keys, pool)
    }

    pub fn address(index: usize) -> [u8; 20] {
        [index as u8 + 1; 20]
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::committee;
    use super::*;
    use shared_types::{
        EliteEdgeNodeCommittee, EliteEdgeNodeScope, GuardianCommittee, GuardianScope,
    };

    fn signed<S: VoteScope>(
        scope: &S,
        size: usize,
        key: &BlsKeyPair,
        index: usize,
    ) -> ThresholdVotes<S> {
        let mut vote = ThresholdVotes::new(scope.clone(), size);
        assert!(vote.sign(key, index));
        vote
    }

    #[test]
    fn test_start_new_block_seeds_own_vote() {
        let (keys, pool) = committee::<EliteEdgeNodeCommittee>(3);
        let scope = EliteEdgeNodeScope { block: [1; 32] };
        let mut state = RoundState::new();
        state.start_new_block(scope, pool, Some((&keys[1], 1)));

        assert_eq!(state.round(), 1);
        assert_eq!(state.best_vote().unwrap().multiplies, vec![0, 1, 0]);
        assert!(state.vote_to_broadcast().is_none());

        state.start_new_round();
        assert_eq!(state.round(), 2);
        assert_eq!(state.vote_to_broadcast(), state.best_vote());
    }

    #[test]
    fn test_round_is_capped() {
        let (_, pool) = committee::<EliteEdgeNodeCommittee>(1);
        let mut state = RoundState::new();
        state.start_new_round();
        assert_eq!(state.round(), 1, "no block, no round");

        state.start_new_block(EliteEdgeNodeScope { block: [1; 32] }, pool, None);
        for _ in 0..20 {
            state.start_new_round();
        }
        assert_eq!(state.round(), MAX_ROUND);
    }

    #[test]
    fn test_process_vote_merges() {
        let (keys, pool) = committee::<EliteEdgeNodeCommittee>(3);
        let scope = EliteEdgeNodeScope { block: [1; 32] };
        let mut state = RoundState::new();
        state.start_new_block(scope.clone(), pool, Some((&keys[0], 0)));

        assert!(state.process_vote(signed(&scope, 3, &keys[2], 2), false).unwrap());
        assert_eq!(state.best_vote().unwrap().multiplies, vec![1, 0, 1]);

        // Nothing new.
        assert!(!state.process_vote(signed(&scope, 3, &keys[2], 2), false).unwrap());
    }

    #[test]
    fn test_process_vote_rejections() {
        let (keys, pool) = committee::<EliteEdgeNodeCommittee>(2);
        let scope = EliteEdgeNodeScope { block: [1; 32] };
        let mut state: RoundState<EliteEdgeNodeScope> = RoundState::new();

        assert!(matches!(
            state.process_vote(signed(&scope, 2, &keys[0], 0), false),
            Err(VoteRejection::NoCurrentBlock)
        ));

        state.start_new_block(scope.clone(), pool, None);
        let other = EliteEdgeNodeScope { block: [2; 32] };
        assert!(matches!(
            state.process_vote(signed(&other, 2, &keys[0], 0), false),
            Err(VoteRejection::BlockMismatch { .. })
        ));

        let mut inflated = signed(&scope, 2, &keys[0], 0);
        inflated.multiplies[0] = 9;
        assert!(matches!(
            state.process_vote(inflated, false),
            Err(VoteRejection::ExceedsRoundCap { round: 1 })
        ));

        let mut forged = signed(&scope, 2, &keys[0], 0);
        forged.multiplies = vec![0, 1];
        assert!(matches!(
            state.process_vote(forged, false),
            Err(VoteRejection::Invalid(_))
        ));
    }

    #[test]
    fn test_guardian_pool_hash_must_match() {
        let (keys, pool) = committee::<GuardianCommittee>(2);
        let scope = GuardianScope {
            block: [1; 32],
            height: 100,
            pool_hash: pool.hash(),
        };
        let mut state = RoundState::new();
        state.start_new_block(scope.clone(), pool, None);

        let stale = GuardianScope {
            pool_hash: [9; 32],
            ..scope.clone()
        };
        assert!(matches!(
            state.process_vote(signed(&stale, 2, &keys[0], 0), false),
            Err(VoteRejection::Invalid(AggregateVoteError::PoolHashMismatch))
        ));
        assert!(state.process_vote(signed(&scope, 2, &keys[0], 0), false).unwrap());
    }

    #[test]
    fn test_pass_through_picks_larger() {
        let (keys, pool) = committee::<GuardianCommittee>(3);
        let scope = GuardianScope {
            block: [1; 32],
            height: 100,
            pool_hash: pool.hash(),
        };
        let mut state = RoundState::new();
        state.start_new_block(scope.clone(), pool, None);

        let single = signed(&scope, 3, &keys[0], 0);
        let mut pair = signed(&scope, 3, &keys[1], 1);
        assert!(pair.sign(&keys[2], 2));

        assert!(state.process_vote(single.clone(), true).unwrap());
        assert!(state.process_vote(pair.clone(), true).unwrap());
        assert_eq!(state.best_vote(), Some(pair));
        // Smaller aggregate is not picked.
        assert!(!state.process_vote(single, true).unwrap());
    }
}
