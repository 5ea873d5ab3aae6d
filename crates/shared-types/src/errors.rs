//! # Shared Error Types
//!
//! Errors raised by the data model itself. Subsystem crates wrap these in their
//! own error enums.

use crate::primitives::{Address, Hash};
use shared_crypto::CryptoError;
use thiserror::Error;

/// Canonical encoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Validator vote and commit certificate failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VoteError {
    #[error("vote has no block")]
    EmptyBlock,

    #[error("vote has no voter id")]
    EmptyVoter,

    #[error("vote from 0x{} has no signature", hex::encode(.0))]
    MissingSignature(Address),

    #[error("vote signature does not recover to 0x{}", hex::encode(.0))]
    InvalidSignature(Address),

    #[error("commit certificate has no votes")]
    NoVotes,

    #[error("commit certificate counts a voter more than once")]
    DuplicateVoter,

    #[error("commit certificate has {votes} votes for {validators} validators")]
    TooManyVotes { votes: usize, validators: usize },

    #[error(
        "vote for {} does not match certified block {}",
        hex::encode(.actual),
        hex::encode(.expected)
    )]
    BlockMismatch { expected: Hash, actual: Hash },

    #[error("votes do not reach two-thirds of the stake")]
    NoMajority,
}

/// Stake deposit / withdrawal / return failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StakeError {
    #[error("source 0x{} is in its locking period", hex::encode(.0))]
    SourceWithdrawn(Address),

    #[error("no stake from source 0x{}", hex::encode(.0))]
    NoMatchingSource(Address),

    #[error("stake from 0x{} is already withdrawn", hex::encode(.0))]
    AlreadyWithdrawn(Address),

    #[error("stake from 0x{} is not withdrawn", hex::encode(.0))]
    NotWithdrawn(Address),

    #[error("stake returns at height {return_height}, current height is {height}")]
    NotYetReturnable { return_height: u64, height: u64 },

    #[error("deposit {amount} below minimum {minimum}")]
    InsufficientDeposit { amount: u128, minimum: u128 },

    #[error("deposit would bring stake to {total}, above maximum {maximum}")]
    ExcessiveDeposit { total: u128, maximum: u128 },

    #[error("holder 0x{} is not a candidate", hex::encode(.0))]
    UnknownHolder(Address),

    #[error("holder 0x{} is registered with a different public key", hex::encode(.0))]
    PubkeyMismatch(Address),

    #[error("stake amount overflow")]
    Overflow,
}

/// Aggregated committee vote failures.
#[derive(Debug, Error)]
pub enum AggregateVoteError {
    #[error("aggregated votes are for different blocks or pools")]
    IncompatibleVotes,

    #[error("multiplicity overflow at signer index {index}")]
    MultiplicityOverflow { index: usize },

    #[error("candidate pool hash does not match")]
    PoolHashMismatch,

    #[error("multiplicity vector has {actual} entries, pool has {expected} members with stake")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("aggregated votes carry no signature")]
    MissingSignature,

    #[error("0x{} is not a member of the candidate pool", hex::encode(.0))]
    UnknownSigner(Address),

    #[error("aggregate signature does not verify: {0}")]
    InvalidSignature(#[from] CryptoError),
}
