//! Error types for the consensus engine.

use qc_02_block_tree::{ChainError, KVStoreError};
use shared_crypto::CryptoError;
use shared_types::{short_hash, AggregateVoteError, CodecError, Hash, VoteError};

/// Why a block failed `validate_block`. Variants are listed in check order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockValidationError {
    #[error("Chain id mismatch: expected {expected}, got {actual}")]
    ChainIdMismatch { expected: String, actual: String },

    #[error("Block height is missing")]
    MissingHeight,

    #[error("Committee votes do not match the header version at height {height}")]
    VersionMismatch { height: u64 },

    #[error("Parent hash is empty")]
    EmptyParent,

    #[error("Unknown parent {}", short_hash(.0))]
    UnknownParent(Hash),

    #[error("Height {height} does not follow parent height {parent}")]
    HeightMismatch { parent: u64, height: u64 },

    #[error("Epoch {epoch} is below parent epoch {parent}")]
    EpochRegression { parent: u64, epoch: u64 },

    #[error("HCC is empty")]
    EmptyHcc,

    #[error("Timestamp is missing")]
    MissingTimestamp,

    #[error("Proposer is empty")]
    EmptyProposer,

    #[error("Proposer signature is missing")]
    MissingSignature,

    #[error("Proposer signature does not verify")]
    InvalidSignature,

    #[error("Transaction root does not match the block body")]
    TxRootMismatch,

    #[error("Parent carries a validator update; HCC must reference it")]
    HccMustReferenceParent,

    #[error("HCC skips validator update block {}", short_hash(.0))]
    HccSkipsValidatorUpdate(Hash),

    #[error("HCC is not an ancestor within range")]
    HccNotAncestor,

    #[error("HCC votes are not a valid commit certificate: {0}")]
    InvalidHcc(VoteError),
}

/// Consensus error types
#[derive(Debug, thiserror::Error)]
pub enum ConsensusError {
    #[error("Block tree error: {0}")]
    Chain(ChainError),

    #[error("Store failure: {0}")]
    StoreFailure(KVStoreError),

    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockValidationError),

    #[error("Invalid vote: {0}")]
    Vote(#[from] VoteError),

    #[error("Invalid aggregated vote: {0}")]
    AggregateVote(#[from] AggregateVoteError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Validator set is empty")]
    NoValidators,

    #[error("Validator set has zero total stake")]
    ZeroStake,

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Engine already started")]
    AlreadyStarted,
}

impl From<ChainError> for ConsensusError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Store(store) => ConsensusError::StoreFailure(store),
            other => ConsensusError::Chain(other),
        }
    }
}

impl From<KVStoreError> for ConsensusError {
    fn from(e: KVStoreError) -> Self {
        ConsensusError::StoreFailure(e)
    }
}

/// Result type for consensus operations
pub type ConsensusResult<T> = Result<T, ConsensusError>;
