//! # Integration Tests
//!
//! Whole-devnet scenarios: several consensus engines over one in-process
//! network, checked through their block trees.

pub mod devnet;
