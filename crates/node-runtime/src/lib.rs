//! # Node Runtime Library
//!
//! Runs a devnet of consensus engines in one process. The `main.rs` binary
//! drives it; the integration tests use it directly.
//!
//! - `container/`: configuration and construction of every node
//! - `genesis/`: genesis block, validator set and committee pools
//! - `runtime`: start, progress tracking and shutdown

pub mod container;
pub mod genesis;
pub mod runtime;

pub use container::{ContainerError, DevnetConfig, DevnetContainer, DevnetEngine, DevnetNode};
pub use genesis::{Genesis, GenesisBuilder, GenesisConfig, GenesisError};
pub use runtime::DevnetRuntime;
