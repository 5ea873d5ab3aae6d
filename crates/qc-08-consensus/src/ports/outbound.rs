//! Driven ports (Outbound dependencies)

use async_trait::async_trait;
use shared_types::{Block, ConsensusMessage, EliteEdgeNodePool, GuardianCandidatePool, Hash};
use std::sync::Arc;

/// Receives messages delivered by a `Network`.
pub trait MessageHandler: Send + Sync {
    /// Returns false when the message was dropped.
    fn handle_message(&self, message: ConsensusMessage) -> bool;
}

/// Peer-to-peer transport
///
/// Sends are fire-and-forget; the engine never waits on network I/O.
pub trait Network: Send + Sync {
    /// Identifier of the local node on this network
    fn id(&self) -> String;

    /// Deliver to every peer except the local node
    fn broadcast(&self, message: ConsensusMessage);

    fn send(&self, peer: &str, message: ConsensusMessage) -> Result<(), String>;

    fn register_message_handler(&self, handler: Arc<dyn MessageHandler>);
}

/// Ledger queries needed by consensus
///
/// The ledger executes blocks; consensus only asks it for committee pools and
/// whether a block changed the validator set.
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Guardian candidates as of `block`
    async fn guardian_candidate_pool(&self, block: Hash) -> Result<GuardianCandidatePool, String>;

    /// Elite-edge-node candidates as of `block`
    async fn elite_edge_node_pool(&self, block: Hash) -> Result<EliteEdgeNodePool, String>;

    /// Whether executing `block` changes the validator set
    async fn has_validator_update(&self, block: &Block) -> Result<bool, String>;
}
