//! Consensus engine configuration.

use shared_types::ForkSchedule;
use std::time::Duration;

/// Default chain id of a local devnet.
pub const DEFAULT_CHAIN_ID: &str = "qc-devnet";

/// Votes remembered by the elite-edge-node bookkeeper.
pub const DEFAULT_MAX_NUM_VOTES_CACHED: usize = 200_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsensusConfig {
    pub chain_id: String,
    /// Epoch timer period; an epoch with no CC progress ends after this long
    pub max_epoch_length: Duration,
    /// Capacity of every bounded message queue
    pub message_queue_size: usize,
    /// Block budget of the fork-choice descendant search
    pub max_descendant_search: usize,
    /// Parent links walked when checking HCC linkage
    pub max_hcc_distance: u64,
    /// Finalized heights that start a committee checkpoint
    pub committee_checkpoint_interval: u64,
    /// Non-member guardians forward the larger aggregate instead of merging
    pub pass_through_guardian_vote: bool,
    /// Samples drawn by the elite-edge-node sampling gate
    pub een_sample_size: usize,
    pub een_vote_cache_size: usize,
    pub een_vote_ttl: Duration,
    pub fork_schedule: ForkSchedule,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            max_epoch_length: Duration::from_secs(10),
            message_queue_size: 512,
            max_descendant_search: 100_000,
            max_hcc_distance: 1_000,
            committee_checkpoint_interval: 100,
            pass_through_guardian_vote: false,
            een_sample_size: 400,
            een_vote_cache_size: DEFAULT_MAX_NUM_VOTES_CACHED,
            een_vote_ttl: Duration::from_secs(5 * 60),
            fork_schedule: ForkSchedule::default(),
        }
    }
}

impl ConsensusConfig {
    /// Whether a block finalized at `height` starts a committee checkpoint.
    pub fn is_checkpoint(&self, height: u64) -> bool {
        self.committee_checkpoint_interval != 0 && height % self.committee_checkpoint_interval == 0
    }
}
