//! Main loop and epoch transitions.

use super::*;
use crate::epoch::EpochTick;
use shared_types::{address_hex, short_hash, Vote};
use tokio::sync::watch;
use tracing::{info, info_span, warn, Instrument};

impl<S, V, N, L> ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    /// Spawn the epoch timer, both committee vote loops and the main loop.
    /// All of them stop once `shutdown` flips to true.
    pub fn start(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> ConsensusResult<()> {
        let Some(incoming) = self.incoming.lock().take() else {
            return Err(ConsensusError::AlreadyStarted);
        };
        let config = self.core.config();
        let (manager, ticks, timer) = EpochManager::spawn(
            config.max_epoch_length,
            self.core.epoch(),
            self.core.height(),
            config.message_queue_size,
            shutdown.clone(),
        );
        *self.epoch_manager.lock() = Some(manager);

        let span = info_span!("consensus", node = %self.network.id(), id = %address_hex(&self.id));
        let guardian = Arc::clone(&self.guardian).run(shutdown.clone());
        let guardian = tokio::spawn(guardian.instrument(span.clone()));
        let elite_edge_nodes = Arc::clone(&self.elite_edge_nodes).run(shutdown.clone());
        let elite_edge_nodes = tokio::spawn(elite_edge_nodes.instrument(span.clone()));
        let main = Arc::clone(self).main_loop(incoming, ticks, shutdown);
        let main = tokio::spawn(main.instrument(span));

        self.tasks.lock().extend([timer, guardian, elite_edge_nodes, main]);
        Ok(())
    }

    /// Wait for every spawned task to finish.
    pub async fn wait(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "consensus task failed");
            }
        }
    }

    async fn main_loop(
        self: Arc<Self>,
        mut incoming: mpsc::Receiver<ConsensusMessage>,
        mut ticks: mpsc::Receiver<EpochTick>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(epoch = self.core.epoch(), height = self.core.height(), "consensus engine started");
        self.enter_epoch(self.core.epoch());

        loop {
            tokio::select! {
                message = incoming.recv() => {
                    let Some(message) = message else { break };
                    self.process_message(message).await;
                }
                tick = ticks.recv() => {
                    let Some(tick) = tick else { break };
                    if let Err(e) = self.handle_epoch_tick(tick).await {
                        log_error("epoch tick", &e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!(epoch = self.core.epoch(), "consensus engine stopped");
    }

    pub(crate) async fn process_message(&self, message: ConsensusMessage) {
        let kind = message.kind();
        let result = match message {
            ConsensusMessage::Proposal(proposal) => self.handle_proposal(proposal).await,
            ConsensusMessage::Block(block) => self.handle_block(block).await,
            ConsensusMessage::Vote(vote) => self.handle_vote(vote).await,
            ConsensusMessage::CommitCertificate(cc) => self.handle_commit_certificate(cc).await,
            ConsensusMessage::GuardianVotes(votes) => {
                self.guardian.handle_vote(votes);
                Ok(())
            }
            ConsensusMessage::EliteEdgeNodeVote(vote) => {
                self.elite_edge_nodes.handle_vote(vote);
                Ok(())
            }
            ConsensusMessage::EliteEdgeNodeVotes(votes) => {
                self.elite_edge_nodes.handle_aggregated_vote(votes);
                Ok(())
            }
        };
        if let Err(e) = result {
            log_error(kind, &e);
        }
    }

    /// The timer gave up on the current epoch. Tell peers which epoch expired
    /// so lagging nodes can catch up, then move on.
    pub(crate) async fn handle_epoch_tick(&self, tick: EpochTick) -> ConsensusResult<()> {
        let expired = self.core.epoch();
        if tick.epoch <= expired || !self.core.set_epoch(tick.epoch)? {
            return Ok(());
        }
        info!(epoch = tick.epoch, height = self.core.height(), "epoch timed out");

        let tip = self.core.tip()?;
        let mut vote = Vote::epoch_vote(tip.height, expired, self.id);
        vote.sign(&self.key)?;
        self.broadcast(ConsensusMessage::Vote(vote));

        self.enter_epoch(tick.epoch);
        Ok(())
    }

    /// Jump to `epoch` after a CC or an epoch catch-up. The timer follows.
    pub(crate) fn advance_to_epoch(&self, epoch: u64) -> ConsensusResult<()> {
        if !self.core.set_epoch(epoch)? {
            return Ok(());
        }
        if let Some(timer) = self.epoch_timer() {
            timer.set_height(self.core.height());
            timer.set_epoch(epoch);
        }
        self.enter_epoch(epoch);
        Ok(())
    }

    /// Start committee rounds, gossip their aggregates and propose if it is
    /// our turn.
    fn enter_epoch(&self, epoch: u64) {
        self.guardian.start_new_round();
        if let Some(votes) = self.guardian.vote_to_broadcast() {
            self.network.broadcast(ConsensusMessage::GuardianVotes(votes));
        }
        self.elite_edge_nodes.start_new_round();
        if let Some(votes) = self.elite_edge_nodes.vote_to_broadcast() {
            self.network.broadcast(ConsensusMessage::EliteEdgeNodeVotes(votes));
        }

        if let Err(e) = self.try_propose(epoch) {
            log_error("proposal", &e);
        }
    }

    /// Follow-up work once a CC has been processed.
    pub(crate) async fn after_commit_certificate(&self, outcome: CcOutcome) -> ConsensusResult<()> {
        for block in &outcome.finalized {
            info!(block = %short_hash(&block.hash()), height = block.height, "block finalized");
            if !self.core.config().is_checkpoint(block.height) {
                continue;
            }
            if let Err(e) = self.guardian.start_new_block(block.hash(), block.height).await {
                warn!(height = block.height, error = %e, "guardian checkpoint not started");
            }
            if let Err(e) = self.elite_edge_nodes.start_new_block(block.hash()).await {
                warn!(height = block.height, error = %e, "elite edge node checkpoint not started");
            }
        }

        if outcome.height_advanced {
            self.advance_to_epoch(self.core.epoch() + 1)?;
        }
        Ok(())
    }
}
