//! Replica side: accepting proposals and blocks, voting.

use super::*;
use shared_types::{short_hash, Block, Proposal, Vote};
use tracing::info;

impl<S, V, N, L> ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    pub(crate) async fn handle_proposal(&self, proposal: Proposal) -> ConsensusResult<()> {
        let block = proposal.block;
        let expected = self.core.selector().proposer_for_epoch(block.header.epoch)?;
        if expected.address != proposal.proposer_id
            || block.header.proposer != proposal.proposer_id
        {
            debug!(
                block = %short_hash(&block.hash()),
                epoch = block.header.epoch,
                "proposal not from the epoch's proposer"
            );
            return Ok(());
        }

        let accepted = self.accept_block(block).await?;
        if let Some(cc) = proposal.commit_certificate {
            if let Err(e) = self.handle_commit_certificate(cc).await {
                log_error("embedded commit certificate", &e);
            }
        }
        self.core.recompute_tip()?;

        if let Some(eb) = accepted {
            self.vote_for(&eb)?;
            self.try_form_commit_certificate(&eb.hash()).await?;
        }
        Ok(())
    }

    pub(crate) async fn handle_block(&self, block: Block) -> ConsensusResult<()> {
        if let Some(eb) = self.accept_block(block).await? {
            self.core.recompute_tip()?;
            self.try_form_commit_certificate(&eb.hash()).await?;
        }
        Ok(())
    }

    /// Validate and store `block`. `None` when it is already known.
    async fn accept_block(&self, block: Block) -> ConsensusResult<Option<ExtendedBlock>> {
        let hash = block.hash();
        let tree = self.core.tree();
        if tree.contains(&hash)? {
            return Ok(None);
        }
        self.core.validate_block(&block)?;

        let has_update = self
            .ledger
            .has_validator_update(&block)
            .await
            .map_err(ConsensusError::Ledger)?;
        tree.add_block(block)?;
        if has_update {
            info!(block = %short_hash(&hash), "block updates the validator set");
            tree.set_has_validator_update(&hash)?;
        }
        Ok(Some(tree.mark_valid(&hash)?))
    }

    /// Vote for `eb` unless we already voted at its height.
    fn vote_for(&self, eb: &ExtendedBlock) -> ConsensusResult<()> {
        if !self.core.validators().contains(&self.id) {
            return Ok(());
        }
        if !self.core.record_vote_height(eb.height)? {
            debug!(height = eb.height, "already voted at this height");
            return Ok(());
        }
        let mut vote = Vote::new(eb.hash(), eb.height, self.core.epoch(), self.id);
        vote.sign(&self.key)?;
        debug!(block = %short_hash(&eb.hash()), height = eb.height, "voting");
        self.broadcast(ConsensusMessage::Vote(vote));
        Ok(())
    }
}
