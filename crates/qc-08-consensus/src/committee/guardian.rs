//! Guardian vote engine.

use super::{RoundState, VoteRejection};
use crate::domain::{ConsensusConfig, ConsensusError, ConsensusResult};
use crate::ports::LedgerGateway;
use parking_lot::Mutex;
use shared_crypto::BlsKeyPair;
use shared_types::{short_hash, Address, AggregatedVotes, GuardianScope, Hash};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Collects and merges guardian aggregates for the current checkpoint.
pub struct GuardianEngine<L: LedgerGateway> {
    address: Address,
    key: Arc<BlsKeyPair>,
    ledger: Arc<L>,
    pass_through: bool,
    state: Mutex<RoundState<GuardianScope>>,
    queue: mpsc::Sender<AggregatedVotes>,
    incoming: Mutex<Option<mpsc::Receiver<AggregatedVotes>>>,
}

impl<L: LedgerGateway> GuardianEngine<L> {
    pub fn new(
        address: Address,
        key: Arc<BlsKeyPair>,
        ledger: Arc<L>,
        config: &ConsensusConfig,
    ) -> Self {
        let (queue, incoming) = mpsc::channel(config.message_queue_size.max(1));
        Self {
            address,
            key,
            ledger,
            pass_through: config.pass_through_guardian_vote,
            state: Mutex::new(RoundState::new()),
            queue,
            incoming: Mutex::new(Some(incoming)),
        }
    }

    /// Begin collecting votes for checkpoint `block` at `height`.
    pub async fn start_new_block(&self, block: Hash, height: u64) -> ConsensusResult<()> {
        let pool = self
            .ledger
            .guardian_candidate_pool(block)
            .await
            .map_err(ConsensusError::Ledger)?;
        let scope = GuardianScope {
            block,
            height,
            pool_hash: pool.hash(),
        };
        let signer = pool.with_stake().index_of_holder(&self.address);
        let members = pool.with_stake().len();

        self.state
            .lock()
            .start_new_block(scope, pool, signer.map(|index| (self.key.as_ref(), index)));
        info!(
            block = %short_hash(&block),
            height,
            members,
            member = signer.is_some(),
            "guardian checkpoint started"
        );
        Ok(())
    }

    pub fn start_new_round(&self) {
        self.state.lock().start_new_round();
    }

    /// Aggregate to gossip this round.
    pub fn vote_to_broadcast(&self) -> Option<AggregatedVotes> {
        self.state.lock().vote_to_broadcast()
    }

    /// Best aggregate so far, placed into proposed headers.
    pub fn best_vote(&self) -> Option<AggregatedVotes> {
        self.state.lock().best_vote()
    }

    pub fn round(&self) -> u32 {
        self.state.lock().round()
    }

    /// Non-blocking enqueue; false when the queue is full.
    pub fn handle_vote(&self, vote: AggregatedVotes) -> bool {
        match self.queue.try_send(vote) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "guardian vote dropped");
                false
            }
        }
    }

    /// Validate `vote` and fold it into the best aggregate.
    pub fn process_vote(&self, vote: AggregatedVotes) -> Result<bool, VoteRejection> {
        self.state.lock().process_vote(vote, self.pass_through)
    }

    /// Drain the vote queue until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let Some(mut incoming) = self.incoming.lock().take() else {
            warn!("guardian vote loop already running");
            return;
        };
        loop {
            tokio::select! {
                vote = incoming.recv() => {
                    let Some(vote) = vote else { break };
                    let block = vote.block();
                    match self.process_vote(vote) {
                        Ok(true) => debug!(block = %short_hash(&block), "guardian vote merged"),
                        Ok(false) => {}
                        Err(e) => debug!(
                            block = %short_hash(&block),
                            error = %e,
                            "guardian vote rejected"
                        ),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("guardian vote loop stopped");
    }
}
