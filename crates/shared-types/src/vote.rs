//! # Validator Votes and Commit Certificates
//!
//! A `Vote` is a validator's secp256k1-signed endorsement of a block at an
//! epoch. Votes with an all-zero block are epoch votes: they only tell peers
//! which epoch the voter has reached.
//!
//! A `VoteSet` is keyed by `(voter, block, epoch)`; re-adding the same key
//! replaces the stored vote. Iteration is always in key order, i.e. sorted by
//! voter address, so encodings and hashes of a set are deterministic.

use crate::block::Block;
use crate::codec::canonical_bytes;
use crate::errors::VoteError;
use crate::primitives::{is_empty_address, is_empty_hash, Address, Hash, ZERO_HASH};
use crate::validator::ValidatorSet;
use serde::{Deserialize, Serialize};
use shared_crypto::{CryptoError, RecoverableSignature, Secp256k1KeyPair};
use std::collections::{BTreeMap, BTreeSet};

/// A validator vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub block: Hash,
    pub height: u64,
    pub epoch: u64,
    pub id: Address,
    pub signature: Option<RecoverableSignature>,
}

impl Vote {
    /// Unsigned vote.
    pub fn new(block: Hash, height: u64, epoch: u64, id: Address) -> Self {
        Self {
            block,
            height,
            epoch,
            id,
            signature: None,
        }
    }

    /// Unsigned epoch vote (no block).
    pub fn epoch_vote(height: u64, epoch: u64, id: Address) -> Self {
        Self::new(ZERO_HASH, height, epoch, id)
    }

    pub fn is_epoch_vote(&self) -> bool {
        is_empty_hash(&self.block)
    }

    /// Signed over `(block, epoch, id)`.
    pub fn sign_bytes(&self) -> Vec<u8> {
        canonical_bytes(&(&self.block, self.epoch, &self.id))
    }

    pub fn sign(&mut self, key: &Secp256k1KeyPair) -> Result<(), CryptoError> {
        self.signature = Some(key.sign(&self.sign_bytes())?);
        Ok(())
    }

    /// Voter present and signature recovers to it. Epoch votes pass.
    pub fn verify_signature(&self) -> Result<(), VoteError> {
        if is_empty_address(&self.id) {
            return Err(VoteError::EmptyVoter);
        }
        let signature = self
            .signature
            .as_ref()
            .ok_or(VoteError::MissingSignature(self.id))?;
        if !signature.verify(&self.sign_bytes(), &self.id) {
            return Err(VoteError::InvalidSignature(self.id));
        }
        Ok(())
    }

    /// A block vote: non-empty block plus a valid signature.
    pub fn validate(&self) -> Result<(), VoteError> {
        if self.is_epoch_vote() {
            return Err(VoteError::EmptyBlock);
        }
        self.verify_signature()
    }
}

type VoteKey = (Address, Hash, u64);

/// Votes keyed by `(voter, block, epoch)`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Vote>", into = "Vec<Vote>")]
pub struct VoteSet {
    votes: BTreeMap<VoteKey, Vote>,
}

impl VoteSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vote(&mut self, vote: Vote) {
        self.votes.insert((vote.id, vote.block, vote.epoch), vote);
    }

    pub fn size(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    /// Votes in voter order.
    pub fn iter(&self) -> impl Iterator<Item = &Vote> {
        self.votes.values()
    }

    /// Owned copy of the votes, sorted by voter.
    pub fn votes(&self) -> Vec<Vote> {
        self.votes.values().cloned().collect()
    }

    pub fn voters(&self) -> BTreeSet<Address> {
        self.votes.keys().map(|(id, _, _)| *id).collect()
    }

    /// Union of both sets; neither input is modified.
    pub fn merge(&self, other: &VoteSet) -> VoteSet {
        let mut merged = self.clone();
        for vote in other.iter() {
            merged.add_vote(vote.clone());
        }
        merged
    }

    /// One vote per voter: the one with the highest epoch. Among equal epochs
    /// the lowest block hash wins, which every node resolves identically.
    pub fn unique_voter(&self) -> VoteSet {
        let mut latest: BTreeMap<Address, &Vote> = BTreeMap::new();
        for vote in self.votes.values() {
            latest
                .entry(vote.id)
                .and_modify(|kept| {
                    if vote.epoch > kept.epoch {
                        *kept = vote;
                    }
                })
                .or_insert(vote);
        }
        latest.into_values().cloned().collect::<Vec<_>>().into()
    }

    /// One vote per `(voter, block)`: the one with the highest epoch.
    pub fn unique_voter_and_block(&self) -> VoteSet {
        let mut latest: BTreeMap<(Address, Hash), &Vote> = BTreeMap::new();
        for vote in self.votes.values() {
            latest
                .entry((vote.id, vote.block))
                .and_modify(|kept| {
                    if vote.epoch > kept.epoch {
                        *kept = vote;
                    }
                })
                .or_insert(vote);
        }
        latest.into_values().cloned().collect::<Vec<_>>().into()
    }

    /// Votes whose voter is in `validators`.
    pub fn filter_by_validators(&self, validators: &ValidatorSet) -> VoteSet {
        self.votes
            .values()
            .filter(|v| validators.contains(&v.id))
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Votes for a given block.
    pub fn for_block(&self, block: &Hash) -> VoteSet {
        self.votes
            .values()
            .filter(|v| &v.block == block)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Votes at or above `epoch`.
    pub fn from_epoch(&self, epoch: u64) -> VoteSet {
        self.votes
            .values()
            .filter(|v| v.epoch >= epoch)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Every vote is a valid block vote.
    pub fn validate(&self) -> Result<(), VoteError> {
        self.votes.values().try_for_each(Vote::validate)
    }
}

impl From<Vec<Vote>> for VoteSet {
    fn from(votes: Vec<Vote>) -> Self {
        let mut set = VoteSet::new();
        for vote in votes {
            set.add_vote(vote);
        }
        set
    }
}

impl From<VoteSet> for Vec<Vote> {
    fn from(set: VoteSet) -> Self {
        set.votes.into_values().collect()
    }
}

/// Proof that a two-thirds stake majority voted for `block_hash`.
///
/// Cloning deep-copies the votes, so certificates attached to different blocks
/// never share state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitCertificate {
    pub votes: VoteSet,
    pub block_hash: Hash,
}

impl CommitCertificate {
    pub fn new(block_hash: Hash, votes: VoteSet) -> Self {
        Self { votes, block_hash }
    }

    /// A reference to `block_hash` without votes.
    pub fn reference(block_hash: Hash) -> Self {
        Self::new(block_hash, VoteSet::new())
    }

    pub fn is_empty(&self) -> bool {
        is_empty_hash(&self.block_hash)
    }

    pub fn has_votes(&self) -> bool {
        !self.votes.is_empty()
    }

    pub fn validate(&self, validators: &ValidatorSet) -> Result<(), VoteError> {
        if self.votes.is_empty() {
            return Err(VoteError::NoVotes);
        }
        if self.votes.unique_voter().size() != self.votes.size() {
            return Err(VoteError::DuplicateVoter);
        }
        if self.votes.size() > validators.size() {
            return Err(VoteError::TooManyVotes {
                votes: self.votes.size(),
                validators: validators.size(),
            });
        }
        for vote in self.votes.iter() {
            if vote.block != self.block_hash {
                return Err(VoteError::BlockMismatch {
                    expected: self.block_hash,
                    actual: vote.block,
                });
            }
            vote.validate()?;
        }
        if !validators.has_majority(&self.votes) {
            return Err(VoteError::NoMajority);
        }
        Ok(())
    }

    pub fn is_valid(&self, validators: &ValidatorSet) -> bool {
        self.validate(validators).is_ok()
    }
}

/// A block proposal, optionally carrying the proposer's highest commit
/// certificate so replicas can catch up on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub block: Block,
    pub proposer_id: Address,
    pub commit_certificate: Option<CommitCertificate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::Validator;

    fn signed(key: &Secp256k1KeyPair, block: Hash, epoch: u64) -> Vote {
        let mut vote = Vote::new(block, 3, epoch, key.address());
        vote.sign(key).unwrap();
        vote
    }

    fn validators(keys: &[Secp256k1KeyPair]) -> ValidatorSet {
        ValidatorSet::from_validators(keys.iter().map(|k| Validator::new(k.address(), 100)))
    }

    #[test]
    fn test_vote_signature_checks() {
        let key = Secp256k1KeyPair::generate();
        let vote = signed(&key, [1u8; 32], 4);
        assert!(vote.validate().is_ok());

        let mut tampered = vote.clone();
        tampered.epoch = 5;
        assert_eq!(
            tampered.validate(),
            Err(VoteError::InvalidSignature(key.address()))
        );

        let unsigned = Vote::new([1u8; 32], 3, 4, key.address());
        assert_eq!(
            unsigned.validate(),
            Err(VoteError::MissingSignature(key.address()))
        );

        let mut epoch_only = Vote::epoch_vote(3, 4, key.address());
        epoch_only.sign(&key).unwrap();
        assert!(epoch_only.verify_signature().is_ok());
        assert_eq!(epoch_only.validate(), Err(VoteError::EmptyBlock));
    }

    #[test]
    fn test_vote_set_sorted_by_voter() {
        let mut set = VoteSet::new();
        set.add_vote(Vote::new([1u8; 32], 1, 1, [3u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 1, [1u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 1, [2u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 1, [2u8; 20]));

        let ids: Vec<u8> = set.votes().iter().map(|v| v.id[0]).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_unique_voter_keeps_latest_epoch() {
        let mut set = VoteSet::new();
        set.add_vote(Vote::new([1u8; 32], 1, 1, [1u8; 20]));
        set.add_vote(Vote::new([2u8; 32], 1, 5, [1u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 3, [1u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 2, [2u8; 20]));

        let unique = set.unique_voter();
        assert_eq!(unique.size(), 2);
        let first = &unique.votes()[0];
        assert_eq!((first.block, first.epoch), ([2u8; 32], 5));
    }

    #[test]
    fn test_unique_voter_and_block_keeps_one_per_block() {
        let mut set = VoteSet::new();
        set.add_vote(Vote::new([1u8; 32], 1, 1, [1u8; 20]));
        set.add_vote(Vote::new([1u8; 32], 1, 4, [1u8; 20]));
        set.add_vote(Vote::new([2u8; 32], 1, 2, [1u8; 20]));

        let unique = set.unique_voter_and_block();
        assert_eq!(unique.size(), 2);
        assert!(unique.iter().any(|v| v.block == [1u8; 32] && v.epoch == 4));
    }

    #[test]
    fn test_merge_leaves_inputs_untouched() {
        let mut a = VoteSet::new();
        a.add_vote(Vote::new([1u8; 32], 1, 1, [1u8; 20]));
        let mut b = VoteSet::new();
        b.add_vote(Vote::new([1u8; 32], 1, 1, [2u8; 20]));

        let merged = a.merge(&b);
        assert_eq!(merged.size(), 2);
        assert_eq!(a.size(), 1);
        assert_eq!(b.size(), 1);
    }

    #[test]
    fn test_filter_by_validators() {
        let keys: Vec<_> = (0..2).map(|_| Secp256k1KeyPair::generate()).collect();
        let vs = validators(&keys);
        let mut set = VoteSet::new();
        set.add_vote(signed(&keys[0], [1u8; 32], 1));
        set.add_vote(Vote::new([1u8; 32], 1, 1, [0xEE; 20]));

        let filtered = set.filter_by_validators(&vs);
        assert_eq!(filtered.size(), 1);
        assert!(filtered.voters().contains(&keys[0].address()));
    }

    #[test]
    fn test_commit_certificate_validation() {
        let keys: Vec<_> = (0..4).map(|_| Secp256k1KeyPair::generate()).collect();
        let vs = validators(&keys);
        let block = [7u8; 32];

        let mut votes = VoteSet::new();
        for key in &keys[..3] {
            votes.add_vote(signed(key, block, 2));
        }
        let cc = CommitCertificate::new(block, votes.clone());
        assert!(cc.is_valid(&vs));

        let two_votes: VoteSet = votes.votes()[..2].to_vec().into();
        assert_eq!(
            CommitCertificate::new(block, two_votes).validate(&vs),
            Err(VoteError::NoMajority)
        );

        let mut double = votes.clone();
        double.add_vote(signed(&keys[0], block, 3));
        assert_eq!(
            CommitCertificate::new(block, double).validate(&vs),
            Err(VoteError::DuplicateVoter)
        );

        let mut wrong_block = votes.clone();
        wrong_block.add_vote(signed(&keys[3], [8u8; 32], 2));
        assert!(matches!(
            CommitCertificate::new(block, wrong_block).validate(&vs),
            Err(VoteError::BlockMismatch { .. })
        ));

        assert_eq!(
            CommitCertificate::reference(block).validate(&vs),
            Err(VoteError::NoVotes)
        );
    }

    #[test]
    fn test_commit_certificate_clone_is_deep() {
        let mut votes = VoteSet::new();
        votes.add_vote(Vote::new([1u8; 32], 1, 1, [1u8; 20]));
        let original = CommitCertificate::new([1u8; 32], votes);

        let mut copy = original.clone();
        copy.votes.add_vote(Vote::new([1u8; 32], 1, 1, [2u8; 20]));
        assert_eq!(original.votes.size(), 1);
        assert_eq!(copy.votes.size(), 2);
    }
}
