//! Consensus Engine
//!
//! Wires the consensus core to the network, the ledger, the committee vote
//! engines and the epoch timer. All inbound messages funnel through one
//! bounded queue and are handled sequentially by the main loop.
//!
//! # Message flow
//!
//! ```text
//! Network ──► EngineInbox ──► main loop ──┬─► replica   (Proposal, Block)
//!                                         ├─► votes     (Vote, CommitCertificate)
//!                                         ├─► guardian  (GuardianVotes)
//!                                         └─► een       (EliteEdgeNodeVote[s])
//! EpochManager ──tick──► main loop ──► epoch vote + proposer
//! ```

mod consensus_core;
mod engine;
mod proposer;
mod replica;
mod votes;

pub use consensus_core::{CcOutcome, ConsensusCore};

use crate::committee::{EliteEdgeNodeEngine, GuardianEngine};
use crate::domain::{ConsensusConfig, ConsensusError, ConsensusResult, ValidatorSelector};
use crate::epoch::EpochManager;
use crate::ports::{ConsensusEngineApi, LedgerGateway, MessageHandler, Network};
use parking_lot::Mutex;
use qc_02_block_tree::{BlockTree, KeyValueStore};
use shared_crypto::{BlsKeyPair, Secp256k1KeyPair};
use shared_types::{Address, ConsensusMessage, ExtendedBlock};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Dependencies for ConsensusEngine
pub struct ConsensusDependencies<S: KeyValueStore, V, N, L> {
    pub tree: Arc<BlockTree<S>>,
    pub selector: Arc<V>,
    pub network: Arc<N>,
    pub ledger: Arc<L>,
    pub config: ConsensusConfig,
}

/// Bounded inbound queue registered with the network.
struct EngineInbox {
    queue: mpsc::Sender<ConsensusMessage>,
}

impl MessageHandler for EngineInbox {
    fn handle_message(&self, message: ConsensusMessage) -> bool {
        match self.queue.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "consensus message dropped");
                false
            }
        }
    }
}

/// One validator's consensus engine.
pub struct ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    key: Secp256k1KeyPair,
    id: Address,
    core: ConsensusCore<S, V>,
    network: Arc<N>,
    ledger: Arc<L>,
    guardian: Arc<GuardianEngine<L>>,
    elite_edge_nodes: Arc<EliteEdgeNodeEngine<L>>,
    inbox: Arc<EngineInbox>,
    incoming: Mutex<Option<mpsc::Receiver<ConsensusMessage>>>,
    finalized: Mutex<Option<mpsc::Receiver<ExtendedBlock>>>,
    epoch_manager: Mutex<Option<EpochManager>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<S, V, N, L> ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    /// Restore consensus state from the tree's store and register with the
    /// network. Nothing runs until `start`.
    pub fn new(
        deps: ConsensusDependencies<S, V, N, L>,
        key: Secp256k1KeyPair,
        bls_key: BlsKeyPair,
    ) -> ConsensusResult<Self> {
        let id = key.address();
        let config = deps.config;
        let (core, finalized) = ConsensusCore::new(config.clone(), deps.tree, deps.selector)?;

        let bls_key = Arc::new(bls_key);
        let guardian = Arc::new(GuardianEngine::new(
            id,
            Arc::clone(&bls_key),
            Arc::clone(&deps.ledger),
            &config,
        ));
        let elite_edge_nodes = Arc::new(EliteEdgeNodeEngine::new(
            id,
            bls_key,
            Arc::clone(&deps.ledger),
            &config,
        ));

        let (queue, incoming) = mpsc::channel(config.message_queue_size.max(1));
        let inbox = Arc::new(EngineInbox { queue });
        deps.network.register_message_handler(inbox.clone());

        Ok(Self {
            key,
            id,
            core,
            network: deps.network,
            ledger: deps.ledger,
            guardian,
            elite_edge_nodes,
            inbox,
            incoming: Mutex::new(Some(incoming)),
            finalized: Mutex::new(Some(finalized)),
            epoch_manager: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn core(&self) -> &ConsensusCore<S, V> {
        &self.core
    }

    pub fn guardian(&self) -> &Arc<GuardianEngine<L>> {
        &self.guardian
    }

    pub fn elite_edge_nodes(&self) -> &Arc<EliteEdgeNodeEngine<L>> {
        &self.elite_edge_nodes
    }

    /// Broadcast to peers and deliver to ourselves.
    fn broadcast(&self, message: ConsensusMessage) {
        self.network.broadcast(message.clone());
        self.inbox.handle_message(message);
    }

    fn epoch_timer(&self) -> Option<EpochManager> {
        self.epoch_manager.lock().clone()
    }
}

impl<S, V, N, L> ConsensusEngineApi for ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    fn id(&self) -> Address {
        self.id
    }

    fn private_key(&self) -> &Secp256k1KeyPair {
        &self.key
    }

    fn tip(&self) -> ConsensusResult<ExtendedBlock> {
        self.core.tip()
    }

    fn epoch(&self) -> u64 {
        self.core.epoch()
    }

    fn add_message(&self, message: ConsensusMessage) -> bool {
        self.inbox.handle_message(message)
    }

    fn take_finalized_blocks(&self) -> Option<mpsc::Receiver<ExtendedBlock>> {
        self.finalized.lock().take()
    }
}

/// Store failures are fatal to the node; everything else is a bad message.
fn log_error(context: &'static str, error: &ConsensusError) {
    match error {
        ConsensusError::StoreFailure(_) => tracing::error!(error = %error, "{context} failed"),
        _ => debug!(error = %error, "{context} failed"),
    }
}
