//! # Quantum-Chain Benchmarks
//!
//! Performance benchmarks per subsystem, registered by
//! `benches/subsystem_benchmarks.rs`.

pub mod qc_02_block_tree;
pub mod qc_08_consensus;
