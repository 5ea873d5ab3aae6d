//! Domain layer for the consensus engine
//!
//! - config: engine tunables
//! - error: block validation and engine errors
//! - selector: proposer selection per epoch

mod config;
mod error;
mod selector;

pub use config::*;
pub use error::*;
pub use selector::*;
