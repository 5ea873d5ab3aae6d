//! Driving ports (Inbound API)

use crate::domain::ConsensusResult;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Address, ConsensusMessage, ExtendedBlock};
use tokio::sync::mpsc;

/// Consensus API exposed to the sync and RPC layers
pub trait ConsensusEngineApi: Send + Sync {
    /// Address of the local validator
    fn id(&self) -> Address;

    fn private_key(&self) -> &Secp256k1KeyPair;

    /// Current fork-choice tip
    fn tip(&self) -> ConsensusResult<ExtendedBlock>;

    fn epoch(&self) -> u64;

    /// Non-blocking enqueue; false when the queue is full
    fn add_message(&self, message: ConsensusMessage) -> bool;

    /// Stream of finalized blocks, in height order.
    ///
    /// Handed out once; later calls return `None`. The consumer must drain it
    /// promptly: blocks that do not fit in the queue are dropped.
    fn take_finalized_blocks(&self) -> Option<mpsc::Receiver<ExtendedBlock>>;
}
