//! Vote collection, commit certificates and epoch catch-up.

use super::*;
use qc_02_block_tree::ChainError;
use shared_types::{address_hex, short_hash, CommitCertificate, Hash, ValidatorSet, Vote, VoteSet};
use tracing::info;

impl<S, V, N, L> ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    /// Record a block or epoch vote from a validator.
    ///
    /// Block votes may complete a CC. Every valid vote also counts toward the
    /// epoch its voter is in, which is how a lagging node catches up.
    pub(crate) async fn handle_vote(&self, vote: Vote) -> ConsensusResult<()> {
        vote.verify_signature()?;
        let validators = self.core.validators();
        if !validators.contains(&vote.id) {
            debug!(voter = %address_hex(&vote.id), "vote from a non-validator");
            return Ok(());
        }

        if !vote.is_epoch_vote() {
            self.core.state_store().add_vote_for_block(&vote)?;
            self.try_form_commit_certificate(&vote.block).await?;
        }

        let epoch_votes = self.core.state_store().add_epoch_vote(&vote)?;
        self.check_epoch_catch_up(&vote, &epoch_votes, &validators)
    }

    pub(crate) async fn handle_commit_certificate(
        &self,
        cc: CommitCertificate,
    ) -> ConsensusResult<()> {
        if cc.is_empty() || !cc.has_votes() {
            return Ok(());
        }
        let outcome = self.core.apply_commit_certificate(&cc)?;
        self.after_commit_certificate(outcome).await
    }

    /// Build a CC for `block` once its collected votes reach a two-thirds
    /// stake majority. Votes may arrive before the block; they wait in the
    /// state store until it does.
    pub(crate) async fn try_form_commit_certificate(&self, block: &Hash) -> ConsensusResult<()> {
        let eb = match self.core.tree().find_block(block) {
            Ok(eb) => eb,
            Err(ChainError::NotFound(_)) => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if eb.commit_certificate.is_some() {
            return Ok(());
        }

        let validators = self.core.validators();
        let votes = self
            .core
            .state_store()
            .votes_for_block(block)?
            .unique_voter()
            .filter_by_validators(&validators);
        if !validators.has_majority(&votes) {
            return Ok(());
        }

        info!(
            block = %short_hash(block),
            height = eb.height,
            votes = votes.size(),
            "commit certificate formed"
        );
        self.handle_commit_certificate(CommitCertificate::new(*block, votes)).await
    }

    /// Jump past `vote.epoch` when a majority has already moved beyond it.
    fn check_epoch_catch_up(
        &self,
        vote: &Vote,
        epoch_votes: &VoteSet,
        validators: &ValidatorSet,
    ) -> ConsensusResult<()> {
        let current = self.core.epoch();
        if vote.epoch <= current {
            return Ok(());
        }
        let ahead = epoch_votes.from_epoch(vote.epoch).filter_by_validators(validators);
        if !validators.has_majority(&ahead) {
            return Ok(());
        }
        info!(from = current, to = vote.epoch + 1, "catching up on epoch");
        self.advance_to_epoch(vote.epoch + 1)
    }
}
