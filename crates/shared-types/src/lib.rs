//! # Shared Types Crate
//!
//! The data model of the consensus core, shared by the block tree and the
//! consensus engine.
//!
//! ## Design Principles
//!
//! - **Canonical encoding**: every hash and every signature is computed over
//!   the bincode encoding produced by `codec::canonical_bytes`.
//! - **Deterministic ordering**: vote sets, validator sets and candidate pools
//!   iterate in address order, so their encodings are stable across nodes.
//! - **No I/O**: this crate only models data; storage and networking live
//!   behind ports in the subsystem crates.

pub mod aggregation;
pub mod block;
pub mod codec;
pub mod committee;
pub mod errors;
pub mod message;
pub mod primitives;
pub mod stake;
pub mod validator;
pub mod vote;

pub use aggregation::{
    max_multiply, AggregatedEENVotes, AggregatedVotes, EENVote, EliteEdgeNodeScope,
    GuardianScope, ThresholdVotes, VoteScope, MAX_LOG_NEIGHBORS, MAX_ROUND,
};
pub use block::{
    tx_root, Block, BlockHeader, BlockStatus, CommitteeVotes, ExtendedBlock, ForkSchedule,
    HeaderFields, HeaderVersion,
};
pub use committee::{
    CandidatePool, CommitteeKind, CommitteeMember, EliteEdgeNodeCommittee, EliteEdgeNodePool,
    GuardianCandidatePool, GuardianCommittee,
};
pub use errors::*;
pub use message::ConsensusMessage;
pub use primitives::*;
pub use stake::{Stake, StakeHolder};
pub use validator::{Validator, ValidatorSet};
pub use vote::{CommitCertificate, Proposal, Vote, VoteSet};
