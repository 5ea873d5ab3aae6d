//! Adapters layer (Hexagonal Architecture)

mod ledger;
mod network;

pub use ledger::*;
pub use network::*;
