//! # Genesis Module
//!
//! The genesis block is the root of every node's block tree:
//!
//! - Height 0, epoch 0, empty parent
//! - Header version chosen by the fork schedule at height 0
//! - Trusted by construction, never validated
//!
//! The validator set and committee pools are fixed at genesis; a devnet has
//! no staking transactions.

pub mod builder;

pub use builder::{Genesis, GenesisBuilder, GenesisConfig, GenesisError};
