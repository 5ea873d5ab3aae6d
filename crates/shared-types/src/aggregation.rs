//! # Aggregated Committee Votes
//!
//! A `ThresholdVotes` is a BLS aggregate signature over one checkpoint plus a
//! multiplicity vector: `multiplies[i]` counts how many times the partial
//! signature of the `i`-th member of `pool.with_stake()` has been folded in.
//! Aggregates spread by gossip, and every hop merges what it received into
//! what it holds, so a member's partial signature can be counted many times.
//!
//! The scope decides what is signed and how an aggregate is tied to its pool:
//!
//! - `GuardianScope`: block hash, block height and the guardian pool hash.
//! - `EliteEdgeNodeScope`: block hash only; single `EENVote`s sign the same
//!   bytes so they can be lifted into an aggregate.
//!
//! ```text
//!   a: [1, 0, 2]          b: [0, 3, 2]
//!            \              /
//!             merge(a, b) -> [1, 3, 4]   sig = sig_a + sig_b
//!
//!   merge(a, a)           -> None        (b adds no new signer)
//! ```

use crate::codec::canonical_bytes;
use crate::committee::{
    CandidatePool, CommitteeKind, EliteEdgeNodeCommittee, EliteEdgeNodePool, GuardianCommittee,
};
use crate::errors::AggregateVoteError;
use crate::primitives::{Address, Hash};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use shared_crypto::bls::{aggregate_signatures, verify, verify_weighted};
use shared_crypto::{BlsKeyPair, BlsSignatureBytes, CryptoError};
use std::fmt::Debug;

/// `log2` of the gossip fan-out.
pub const MAX_LOG_NEIGHBORS: u32 = 3;

/// Rounds per checkpoint.
pub const MAX_ROUND: u32 = 10;

/// Largest multiplicity an aggregate can plausibly reach after `round` rounds
/// of gossip: `2^(round * MAX_LOG_NEIGHBORS)`, saturating at `u32::MAX`.
pub fn max_multiply(round: u32) -> u32 {
    1u32.checked_shl(round.saturating_mul(MAX_LOG_NEIGHBORS))
        .unwrap_or(u32::MAX)
}

/// What an aggregate signs and which pool it belongs to.
pub trait VoteScope:
    Debug + Clone + PartialEq + Eq + Serialize + DeserializeOwned + Send + Sync + 'static
{
    type Kind: CommitteeKind;

    fn block(&self) -> Hash;

    fn sign_bytes(&self) -> Vec<u8>;

    /// Scope-specific binding to the pool the aggregate is validated against.
    fn check_pool(&self, _pool: &CandidatePool<Self::Kind>) -> Result<(), AggregateVoteError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardianScope {
    pub block: Hash,
    pub height: u64,
    pub pool_hash: Hash,
}

impl VoteScope for GuardianScope {
    type Kind = GuardianCommittee;

    fn block(&self) -> Hash {
        self.block
    }

    fn sign_bytes(&self) -> Vec<u8> {
        canonical_bytes(&("guardian", &self.block, self.height, &self.pool_hash))
    }

    fn check_pool(
        &self,
        pool: &CandidatePool<GuardianCommittee>,
    ) -> Result<(), AggregateVoteError> {
        if pool.hash() != self.pool_hash {
            return Err(AggregateVoteError::PoolHashMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EliteEdgeNodeScope {
    pub block: Hash,
}

impl VoteScope for EliteEdgeNodeScope {
    type Kind = EliteEdgeNodeCommittee;

    fn block(&self) -> Hash {
        self.block
    }

    fn sign_bytes(&self) -> Vec<u8> {
        canonical_bytes(&("checkpoint", &self.block))
    }
}

/// Aggregate signature with per-member multiplicities.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "S: VoteScope")]
pub struct ThresholdVotes<S> {
    pub scope: S,
    pub multiplies: Vec<u32>,
    /// `None` until the first partial signature is folded in.
    #[serde_as(as = "Option<Bytes>")]
    pub signature: Option<BlsSignatureBytes>,
}

pub type AggregatedVotes = ThresholdVotes<GuardianScope>;
pub type AggregatedEENVotes = ThresholdVotes<EliteEdgeNodeScope>;

impl<S: VoteScope> ThresholdVotes<S> {
    /// Empty aggregate for a committee of `committee_size` members with stake.
    pub fn new(scope: S, committee_size: usize) -> Self {
        Self {
            scope,
            multiplies: vec![0; committee_size],
            signature: None,
        }
    }

    pub fn block(&self) -> Hash {
        self.scope.block()
    }

    /// Fold in the signer's partial signature with multiplicity 1. Returns
    /// false if the signer already signed or the index is out of range.
    pub fn sign(&mut self, key: &BlsKeyPair, signer_index: usize) -> bool {
        match self.multiplies.get(signer_index) {
            Some(0) => {}
            _ => return false,
        }
        let partial = key.sign(&self.scope.sign_bytes());
        let Ok(signature) = self.fold(&partial) else {
            return false;
        };
        self.signature = Some(signature);
        self.multiplies[signer_index] = 1;
        true
    }

    fn fold(&self, partial: &BlsSignatureBytes) -> Result<BlsSignatureBytes, CryptoError> {
        match &self.signature {
            Some(existing) => aggregate_signatures(existing, partial),
            None => Ok(*partial),
        }
    }

    fn ensure_compatible(&self, other: &Self) -> Result<(), AggregateVoteError> {
        if self.scope != other.scope || self.multiplies.len() != other.multiplies.len() {
            return Err(AggregateVoteError::IncompatibleVotes);
        }
        Ok(())
    }

    /// Element-wise sum of both aggregates. `Ok(None)` when every signer of
    /// `other` is already a signer of `self`.
    pub fn merge(&self, other: &Self) -> Result<Option<Self>, AggregateVoteError> {
        self.ensure_compatible(other)?;

        let mut adds_signer = false;
        let mut multiplies = Vec::with_capacity(self.multiplies.len());
        for (index, (a, b)) in self.multiplies.iter().zip(&other.multiplies).enumerate() {
            if *a == 0 && *b != 0 {
                adds_signer = true;
            }
            let sum = a
                .checked_add(*b)
                .ok_or(AggregateVoteError::MultiplicityOverflow { index })?;
            multiplies.push(sum);
        }
        if !adds_signer {
            return Ok(None);
        }

        let signature = match (&self.signature, &other.signature) {
            (Some(a), Some(b)) => Some(aggregate_signatures(a, b)?),
            (Some(s), None) | (None, Some(s)) => Some(*s),
            (None, None) => None,
        };
        Ok(Some(Self {
            scope: self.scope.clone(),
            multiplies,
            signature,
        }))
    }

    /// Number of members that signed.
    pub fn abs(&self) -> usize {
        self.multiplies.iter().filter(|m| **m > 0).count()
    }

    /// The aggregate with more signers; `self` on ties.
    pub fn pick<'a>(&'a self, other: &'a Self) -> Result<&'a Self, AggregateVoteError> {
        self.ensure_compatible(other)?;
        if other.abs() > self.abs() {
            Ok(other)
        } else {
            Ok(self)
        }
    }

    /// Check the aggregate against the pool it claims to belong to.
    pub fn validate(&self, pool: &CandidatePool<S::Kind>) -> Result<(), AggregateVoteError> {
        self.scope.check_pool(pool)?;
        let members = pool.with_stake();
        if self.multiplies.len() != members.len() {
            return Err(AggregateVoteError::LengthMismatch {
                expected: members.len(),
                actual: self.multiplies.len(),
            });
        }
        let signature = self
            .signature
            .as_ref()
            .ok_or(AggregateVoteError::MissingSignature)?;
        verify_weighted(
            &members.pubkeys(),
            &self.multiplies,
            &self.scope.sign_bytes(),
            signature,
        )?;
        Ok(())
    }

    /// No multiplicity exceeds what `round` rounds of gossip can produce.
    pub fn check_multiplies_for_round(&self, round: u32) -> bool {
        let cap = max_multiply(round);
        self.multiplies.iter().all(|m| *m <= cap)
    }
}

/// A single elite-edge-node signature for a checkpoint block.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EENVote {
    pub block: Hash,
    pub address: Address,
    #[serde_as(as = "Bytes")]
    pub signature: BlsSignatureBytes,
}

impl EENVote {
    pub fn sign(block: Hash, address: Address, key: &BlsKeyPair) -> Self {
        let signature = key.sign(&EliteEdgeNodeScope { block }.sign_bytes());
        Self {
            block,
            address,
            signature,
        }
    }

    /// Verify against the signer's key; returns its index in `pool.with_stake()`.
    pub fn validate(&self, pool: &EliteEdgeNodePool) -> Result<usize, AggregateVoteError> {
        let members = pool.with_stake();
        let index = members
            .index_of_holder(&self.address)
            .ok_or(AggregateVoteError::UnknownSigner(self.address))?;
        let pubkey = members.members()[index].pubkey;
        let message = EliteEdgeNodeScope { block: self.block }.sign_bytes();
        if !verify(&pubkey, &message, &self.signature) {
            return Err(CryptoError::SignatureVerificationFailed.into());
        }
        Ok(index)
    }

    /// One-hot aggregate of this vote.
    pub fn into_aggregate(self, index: usize, committee_size: usize) -> AggregatedEENVotes {
        let scope = EliteEdgeNodeScope { block: self.block };
        let mut aggregate = AggregatedEENVotes::new(scope, committee_size);
        if let Some(m) = aggregate.multiplies.get_mut(index) {
            *m = 1;
            aggregate.signature = Some(self.signature);
        }
        aggregate
    }
}
