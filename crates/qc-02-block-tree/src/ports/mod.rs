//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports (the key-value store the tree persists into)

pub mod outbound;
