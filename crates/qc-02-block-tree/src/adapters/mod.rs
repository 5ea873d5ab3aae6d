//! # Adapters Module
//!
//! - `memory`: in-memory key-value store for tests and the devnet

pub mod memory;

pub use memory::InMemoryKVStore;
