//! # qc-08-consensus
//!
//! Epoch-based BFT consensus with committee finality for Quantum-Chain.
//!
//! ## Architecture
//!
//! Validators take turns proposing blocks, one proposer per epoch. Replicas
//! validate each proposal against the block tree and vote; votes holding a
//! two-thirds stake majority form a commit certificate (CC). Two consecutive
//! certified blocks finalize the first one and all of its ancestors:
//!
//! ```text
//!   epoch e          epoch e+1
//!  ┌───────┐  CC   ┌───────┐  CC
//!  │ B(h)  │◄──────│ B(h+1)│◄──── finalizes B(h)
//!  └───────┘       └───────┘
//! ```
//!
//! An epoch ends either when a CC advances the height or when the epoch timer
//! expires. Timed-out nodes broadcast an epoch vote; a node that sees a
//! majority ahead of it jumps forward.
//!
//! Finalized checkpoint blocks are additionally voted on by two committees,
//! guardians and elite edge nodes, whose BLS aggregates are gossiped in
//! rounds and embedded in later block headers.
//!
//! ## Layout
//!
//! - `domain`: configuration, errors, proposer selection
//! - `ports`: the engine API and its network/ledger dependencies
//! - `adapters`: in-process network and ledger
//! - `service`: the consensus core and the engine around it
//! - `committee`: guardian and elite-edge-node vote engines
//! - `epoch`: the epoch timer
//! - `state`: persisted consensus state and vote sets
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qc_08_consensus::{ConsensusDependencies, ConsensusEngine, ConsensusConfig};
//!
//! let engine = Arc::new(ConsensusEngine::new(
//!     ConsensusDependencies { tree, selector, network, ledger, config },
//!     validator_key,
//!     bls_key,
//! )?);
//! let mut finalized = engine.take_finalized_blocks().expect("first call");
//! engine.start(shutdown_rx)?;
//! while let Some(block) = finalized.recv().await {
//!     // execute block
//! }
//! ```

pub mod adapters;
pub mod committee;
pub mod domain;
pub mod epoch;
pub mod ports;
pub mod service;
pub mod state;

pub use adapters::{LocalNetwork, LocalNetworkHub, StaticLedger};
pub use committee::{EliteEdgeNodeEngine, GuardianEngine, VoteRejection};
pub use domain::{
    BlockValidationError, ConsensusConfig, ConsensusError, ConsensusResult, FixedValidatorManager,
    RotatingValidatorManager, ValidatorSelector,
};
pub use epoch::{EpochManager, EpochTick};
pub use ports::{ConsensusEngineApi, LedgerGateway, MessageHandler, Network};
pub use service::{CcOutcome, ConsensusCore, ConsensusDependencies, ConsensusEngine};
pub use state::{StateStore, StateStub};
