//! Block proposal.

use super::*;
use shared_types::{
    short_hash, tx_root, Block, BlockHeader, CommitCertificate, CommitteeVotes, HeaderFields,
    Proposal, ZERO_HASH,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

impl<S, V, N, L> ConsensusEngine<S, V, N, L>
where
    S: KeyValueStore + 'static,
    V: ValidatorSelector + 'static,
    N: Network + 'static,
    L: LedgerGateway + 'static,
{
    /// Propose a child of the tip if we are the proposer for `epoch`.
    ///
    /// Skipped when we already voted at the next height, when our epoch lags
    /// the tip's, or when the tip changed the validator set but is not yet
    /// certified: its child must carry the tip itself as HCC.
    pub(crate) fn try_propose(&self, epoch: u64) -> ConsensusResult<()> {
        let proposer = self.core.selector().proposer_for_epoch(epoch)?;
        if proposer.address != self.id {
            return Ok(());
        }

        let tip = self.core.tip()?;
        let highest = self.core.highest_cc()?;
        let height = tip.height + 1;
        if tip.has_validator_update && tip.hash() != highest.hash() {
            debug!(tip = %short_hash(&tip.hash()), "tip awaits a CC before extension");
            return Ok(());
        }
        if self.core.last_vote_height() >= height {
            debug!(height, "already voted at this height");
            return Ok(());
        }
        if epoch < tip.header().epoch {
            debug!(epoch, tip_epoch = tip.header().epoch, "epoch behind the tip");
            return Ok(());
        }

        let hcc = highest
            .commit_certificate
            .clone()
            .unwrap_or_else(|| CommitCertificate::reference(highest.hash()));
        let config = self.core.config();
        let version = config.fork_schedule.header_version(height);
        let mut header = BlockHeader::new(HeaderFields {
            chain_id: config.chain_id.clone(),
            epoch,
            height,
            parent: tip.hash(),
            hcc: hcc.clone(),
            committee_votes: CommitteeVotes::for_version(
                version,
                self.guardian.best_vote(),
                self.elite_edge_nodes.best_vote(),
            ),
            tx_hash: tx_root(&[]),
            state_hash: ZERO_HASH,
            timestamp: Some(unix_now()),
            proposer: self.id,
            signature: None,
        });
        header.sign(&self.key)?;
        let block = Block::new(header, Vec::new());

        info!(
            block = %short_hash(&block.hash()),
            height,
            epoch,
            hcc = %short_hash(&hcc.block_hash),
            "proposing block"
        );
        self.broadcast(ConsensusMessage::Proposal(Proposal {
            block,
            proposer_id: self.id,
            commit_certificate: hcc.has_votes().then_some(hcc),
        }));
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
