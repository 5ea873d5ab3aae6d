//! # Blocks
//!
//! ## Header versions
//!
//! The header's committee-vote section is a tagged variant selected by height
//! through the `ForkSchedule`:
//!
//! | Version | Heights | Committee votes carried |
//! |---------|---------|-------------------------|
//! | `PreFork` | `< guardian_votes` | none |
//! | `Guardian` | `>= guardian_votes` | guardian aggregate |
//! | `GuardianAndEliteEdgeNode` | `>= elite_edge_node_votes` | guardian + elite-edge-node aggregates |
//!
//! ## Hash caching
//!
//! The header hash is computed lazily over the canonical encoding and cached.
//! Fields are readable through `Deref`, but can only be changed through
//! `BlockHeader::update`, which drops the cached hash.

use crate::aggregation::{AggregatedEENVotes, AggregatedVotes};
use crate::codec::{canonical_bytes, canonical_hash};
use crate::primitives::{Address, Hash, ZERO_ADDRESS, ZERO_HASH};
use crate::vote::CommitCertificate;
use serde::{Deserialize, Serialize};
use shared_crypto::{keccak256, CryptoError, RecoverableSignature, Secp256k1KeyPair};
use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;

// =============================================================================
// FORK SCHEDULE
// =============================================================================

/// Heights at which protocol upgrades activate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ForkSchedule {
    /// Headers carry guardian votes from this height.
    pub guardian_votes: u64,
    /// Headers also carry elite-edge-node votes from this height.
    pub elite_edge_node_votes: u64,
    /// Minimum guardian deposit is lowered from this height.
    pub lower_guardian_stake: u64,
}

impl ForkSchedule {
    pub fn header_version(&self, height: u64) -> HeaderVersion {
        if height >= self.elite_edge_node_votes {
            HeaderVersion::GuardianAndEliteEdgeNode
        } else if height >= self.guardian_votes {
            HeaderVersion::Guardian
        } else {
            HeaderVersion::PreFork
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVersion {
    PreFork,
    Guardian,
    GuardianAndEliteEdgeNode,
}

/// Committee aggregates embedded in a header, by header version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommitteeVotes {
    PreFork,
    Guardian {
        guardian_votes: Option<AggregatedVotes>,
    },
    GuardianAndEliteEdgeNode {
        guardian_votes: Option<AggregatedVotes>,
        elite_edge_node_votes: Option<AggregatedEENVotes>,
    },
}

impl CommitteeVotes {
    /// Section for `version` filled with whatever aggregates it can carry.
    pub fn for_version(
        version: HeaderVersion,
        guardian_votes: Option<AggregatedVotes>,
        elite_edge_node_votes: Option<AggregatedEENVotes>,
    ) -> Self {
        match version {
            HeaderVersion::PreFork => Self::PreFork,
            HeaderVersion::Guardian => Self::Guardian { guardian_votes },
            HeaderVersion::GuardianAndEliteEdgeNode => Self::GuardianAndEliteEdgeNode {
                guardian_votes,
                elite_edge_node_votes,
            },
        }
    }

    pub fn version(&self) -> HeaderVersion {
        match self {
            Self::PreFork => HeaderVersion::PreFork,
            Self::Guardian { .. } => HeaderVersion::Guardian,
            Self::GuardianAndEliteEdgeNode { .. } => HeaderVersion::GuardianAndEliteEdgeNode,
        }
    }

    pub fn guardian_votes(&self) -> Option<&AggregatedVotes> {
        match self {
            Self::PreFork => None,
            Self::Guardian { guardian_votes } => guardian_votes.as_ref(),
            Self::GuardianAndEliteEdgeNode { guardian_votes, .. } => guardian_votes.as_ref(),
        }
    }

    pub fn elite_edge_node_votes(&self) -> Option<&AggregatedEENVotes> {
        match self {
            Self::GuardianAndEliteEdgeNode {
                elite_edge_node_votes,
                ..
            } => elite_edge_node_votes.as_ref(),
            _ => None,
        }
    }
}

// =============================================================================
// HEADER
// =============================================================================

/// Header content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderFields {
    pub chain_id: String,
    pub epoch: u64,
    pub height: u64,
    pub parent: Hash,
    /// Highest commit certificate known to the proposer.
    pub hcc: CommitCertificate,
    pub committee_votes: CommitteeVotes,
    pub tx_hash: Hash,
    pub state_hash: Hash,
    pub timestamp: Option<u64>,
    pub proposer: Address,
    pub signature: Option<RecoverableSignature>,
}

/// Block header with a lazily computed, cached hash.
#[derive(Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockHeader {
    fields: HeaderFields,
    #[serde(skip)]
    hash: OnceLock<Hash>,
}

impl BlockHeader {
    pub fn new(fields: HeaderFields) -> Self {
        Self {
            fields,
            hash: OnceLock::new(),
        }
    }

    pub fn fields(&self) -> &HeaderFields {
        &self.fields
    }

    /// Mutate the header; the cached hash is dropped.
    pub fn update(&mut self, f: impl FnOnce(&mut HeaderFields)) {
        f(&mut self.fields);
        self.hash = OnceLock::new();
    }

    pub fn hash(&self) -> Hash {
        *self.hash.get_or_init(|| canonical_hash(&self.fields))
    }

    /// Canonical encoding with the signature left out.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let mut unsigned = self.fields.clone();
        unsigned.signature = None;
        canonical_bytes(&unsigned)
    }

    /// Set `proposer` to the key's address and sign.
    pub fn sign(&mut self, key: &Secp256k1KeyPair) -> Result<(), CryptoError> {
        self.update(|h| {
            h.proposer = key.address();
            h.signature = None;
        });
        let signature = key.sign(&self.sign_bytes())?;
        self.update(|h| h.signature = Some(signature));
        Ok(())
    }

    /// Address the signature recovers to.
    pub fn signer(&self) -> Result<Address, CryptoError> {
        let signature = self
            .fields
            .signature
            .as_ref()
            .ok_or(CryptoError::InvalidSignature)?;
        signature.recover_address(&self.sign_bytes())
    }
}

impl Deref for BlockHeader {
    type Target = HeaderFields;

    fn deref(&self) -> &HeaderFields {
        &self.fields
    }
}

impl PartialEq for BlockHeader {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Eq for BlockHeader {}

impl fmt::Debug for BlockHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockHeader")
            .field("hash", &hex::encode(self.hash()))
            .field("chain_id", &self.fields.chain_id)
            .field("epoch", &self.fields.epoch)
            .field("height", &self.fields.height)
            .field("parent", &hex::encode(self.fields.parent))
            .field("hcc", &hex::encode(self.fields.hcc.block_hash))
            .field("proposer", &hex::encode(self.fields.proposer))
            .finish_non_exhaustive()
    }
}

// =============================================================================
// BLOCK
// =============================================================================

/// Keccak-256 over the concatenated Keccak-256 digests of the transactions.
pub fn tx_root(txs: &[Vec<u8>]) -> Hash {
    let mut digests = Vec::with_capacity(txs.len() * 32);
    for tx in txs {
        digests.extend_from_slice(&keccak256(tx));
    }
    keccak256(&digests)
}

/// A header plus the raw transactions it commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    pub fn new(header: BlockHeader, txs: Vec<Vec<u8>>) -> Self {
        Self { header, txs }
    }

    /// Unsigned root block of a chain.
    pub fn genesis(chain_id: impl Into<String>, forks: &ForkSchedule) -> Self {
        let header = BlockHeader::new(HeaderFields {
            chain_id: chain_id.into(),
            epoch: 0,
            height: 0,
            parent: ZERO_HASH,
            hcc: CommitCertificate::default(),
            committee_votes: CommitteeVotes::for_version(forks.header_version(0), None, None),
            tx_hash: tx_root(&[]),
            state_hash: ZERO_HASH,
            timestamp: Some(0),
            proposer: ZERO_ADDRESS,
            signature: None,
        });
        Self::new(header, Vec::new())
    }

    pub fn hash(&self) -> Hash {
        self.header.hash()
    }

    pub fn height(&self) -> u64 {
        self.header.height
    }

    pub fn parent(&self) -> Hash {
        self.header.parent
    }

    pub fn tx_root_matches(&self) -> bool {
        self.header.tx_hash == tx_root(&self.txs)
    }
}

// =============================================================================
// STATUS & EXTENDED BLOCK
// =============================================================================

/// Position of a block in its lifecycle.
///
/// Moves are monotonic by rank (pending, valid, committed, finalized); an
/// indirectly finalized block may later be finalized directly. `Invalid` and
/// `Disposed` are terminal and unreachable once finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockStatus {
    Pending,
    Valid,
    Invalid,
    Committed,
    DirectlyFinalized,
    IndirectlyFinalized,
    Trusted,
    Disposed,
}

impl BlockStatus {
    pub fn is_pending(self) -> bool {
        self == Self::Pending
    }

    pub fn is_invalid(self) -> bool {
        matches!(self, Self::Invalid | Self::Disposed)
    }

    pub fn is_valid(self) -> bool {
        !self.is_pending() && !self.is_invalid()
    }

    pub fn is_committed(self) -> bool {
        self == Self::Committed
    }

    pub fn is_finalized(self) -> bool {
        matches!(
            self,
            Self::DirectlyFinalized | Self::IndirectlyFinalized | Self::Trusted
        )
    }

    fn rank(self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Valid => Some(1),
            Self::Committed => Some(2),
            Self::DirectlyFinalized | Self::IndirectlyFinalized | Self::Trusted => Some(3),
            Self::Invalid | Self::Disposed => None,
        }
    }

    pub fn can_transition_to(self, next: BlockStatus) -> bool {
        if self == next {
            return true;
        }
        match (self.rank(), next.rank()) {
            // Terminal states never move.
            (None, _) => false,
            (Some(3), None) => false,
            (Some(_), None) => true,
            (Some(3), Some(3)) => {
                self == Self::IndirectlyFinalized && next == Self::DirectlyFinalized
            }
            (Some(from), Some(to)) => to >= from,
        }
    }
}

impl fmt::Display for BlockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Committed => "committed",
            Self::DirectlyFinalized => "directly_finalized",
            Self::IndirectlyFinalized => "indirectly_finalized",
            Self::Trusted => "trusted",
            Self::Disposed => "disposed",
        };
        f.write_str(s)
    }
}

/// A block plus chain-store bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtendedBlock {
    pub block: Block,
    pub height: u64,
    pub parent: Hash,
    /// Child hashes; no duplicates, order irrelevant.
    pub children: Vec<Hash>,
    pub status: BlockStatus,
    pub commit_certificate: Option<CommitCertificate>,
    pub has_validator_update: bool,
}

impl ExtendedBlock {
    pub fn new(block: Block) -> Self {
        Self {
            height: block.height(),
            parent: block.parent(),
            block,
            children: Vec::new(),
            status: BlockStatus::Pending,
            commit_certificate: None,
            has_validator_update: false,
        }
    }

    pub fn hash(&self) -> Hash {
        self.block.hash()
    }

    pub fn header(&self) -> &BlockHeader {
        &self.block.header
    }

    /// Returns false if already present.
    pub fn add_child(&mut self, child: Hash) -> bool {
        if self.children.contains(&child) {
            return false;
        }
        self.children.push(child);
        true
    }
}
