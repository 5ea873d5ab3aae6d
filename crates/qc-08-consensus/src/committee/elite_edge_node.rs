//! Elite-edge-node vote engine.
//!
//! Accepts two kinds of input, each on its own bounded queue: single
//! `EENVote`s straight from edge nodes, and aggregates gossiped by peers.
//! A single vote is admitted only if it is for the current block, correctly
//! signed by a member sampled for this block, and not seen before. It then
//! enters the aggregate flow as a one-hot aggregate.

use super::{RoundState, SamplingGate, VoteBookkeeper, VoteRejection};
use crate::domain::{ConsensusConfig, ConsensusError, ConsensusResult};
use crate::ports::LedgerGateway;
use parking_lot::Mutex;
use shared_crypto::BlsKeyPair;
use shared_types::{short_hash, Address, AggregatedEENVotes, EENVote, EliteEdgeNodeScope, Hash};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

struct EliteEdgeNodeState {
    round: RoundState<EliteEdgeNodeScope>,
    bookkeeper: VoteBookkeeper,
    sampling: SamplingGate,
}

type Inbox = (
    mpsc::Receiver<EENVote>,
    mpsc::Receiver<AggregatedEENVotes>,
);

pub struct EliteEdgeNodeEngine<L: LedgerGateway> {
    address: Address,
    key: Arc<BlsKeyPair>,
    ledger: Arc<L>,
    state: Mutex<EliteEdgeNodeState>,
    single_queue: mpsc::Sender<EENVote>,
    aggregate_queue: mpsc::Sender<AggregatedEENVotes>,
    incoming: Mutex<Option<Inbox>>,
}

impl<L: LedgerGateway> EliteEdgeNodeEngine<L> {
    pub fn new(
        address: Address,
        key: Arc<BlsKeyPair>,
        ledger: Arc<L>,
        config: &ConsensusConfig,
    ) -> Self {
        let queue_size = config.message_queue_size.max(1);
        let (single_queue, singles) = mpsc::channel(queue_size);
        let (aggregate_queue, aggregates) = mpsc::channel(queue_size);
        Self {
            address,
            key,
            ledger,
            state: Mutex::new(EliteEdgeNodeState {
                round: RoundState::new(),
                bookkeeper: VoteBookkeeper::new(config.een_vote_cache_size, config.een_vote_ttl),
                sampling: SamplingGate::new(config.een_sample_size),
            }),
            single_queue,
            aggregate_queue,
            incoming: Mutex::new(Some((singles, aggregates))),
        }
    }

    /// Begin collecting votes for checkpoint `block`.
    pub async fn start_new_block(&self, block: Hash) -> ConsensusResult<()> {
        let pool = self
            .ledger
            .elite_edge_node_pool(block)
            .await
            .map_err(ConsensusError::Ledger)?;
        let signer = pool.with_stake().index_of_holder(&self.address);
        let members = pool.with_stake().len();

        self.state.lock().round.start_new_block(
            EliteEdgeNodeScope { block },
            pool,
            signer.map(|index| (self.key.as_ref(), index)),
        );
        info!(
            block = %short_hash(&block),
            members,
            member = signer.is_some(),
            "elite edge node checkpoint started"
        );
        Ok(())
    }

    pub fn start_new_round(&self) {
        self.state.lock().round.start_new_round();
    }

    pub fn vote_to_broadcast(&self) -> Option<AggregatedEENVotes> {
        self.state.lock().round.vote_to_broadcast()
    }

    pub fn best_vote(&self) -> Option<AggregatedEENVotes> {
        self.state.lock().round.best_vote()
    }

    /// Non-blocking enqueue of a single vote; false when the queue is full.
    pub fn handle_vote(&self, vote: EENVote) -> bool {
        match self.single_queue.try_send(vote) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "elite edge node vote dropped");
                false
            }
        }
    }

    /// Non-blocking enqueue of an aggregate; false when the queue is full.
    pub fn handle_aggregated_vote(&self, vote: AggregatedEENVotes) -> bool {
        match self.aggregate_queue.try_send(vote) {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "elite edge node aggregate dropped");
                false
            }
        }
    }

    pub fn process_vote(&self, vote: EENVote) -> Result<bool, VoteRejection> {
        let mut state = self.state.lock();
        state.round.check_block(&vote.block)?;
        let index = vote.validate(state.round.pool())?;
        let stakes = state.round.pool().with_stake().stakes();
        if !state.sampling.is_eligible(&vote.block, &stakes, index) {
            return Err(VoteRejection::NotSampled);
        }
        // Only votes that passed every check may take the signer's slot.
        if !state.bookkeeper.record(&vote.address, &vote.block) {
            return Err(VoteRejection::Duplicate);
        }
        let aggregate = vote.into_aggregate(index, stakes.len());
        state.round.process_vote(aggregate, false)
    }

    pub fn process_aggregated_vote(&self, vote: AggregatedEENVotes) -> Result<bool, VoteRejection> {
        self.state.lock().round.process_vote(vote, false)
    }

    /// Drain both queues until shutdown.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let Some((mut singles, mut aggregates)) = self.incoming.lock().take() else {
            warn!("elite edge node vote loop already running");
            return;
        };
        loop {
            let (block, result) = tokio::select! {
                vote = singles.recv() => {
                    let Some(vote) = vote else { break };
                    (vote.block, self.process_vote(vote))
                }
                vote = aggregates.recv() => {
                    let Some(vote) = vote else { break };
                    (vote.block(), self.process_aggregated_vote(vote))
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };
            match result {
                Ok(true) => debug!(block = %short_hash(&block), "elite edge node vote merged"),
                Ok(false) => {}
                Err(e) => debug!(
                    block = %short_hash(&block),
                    error = %e,
                    "elite edge node vote rejected"
                ),
            }
        }
        debug!("elite edge node vote loop stopped");
    }
}
