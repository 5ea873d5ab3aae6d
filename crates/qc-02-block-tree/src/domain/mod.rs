//! # Domain Layer
//!
//! Errors, key layout and stored records of the block tree.

pub mod entities;
pub mod errors;
pub mod keys;

pub use entities::*;
pub use errors::*;
pub use keys::KeyPrefix;
