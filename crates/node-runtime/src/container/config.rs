//! # Devnet Configuration
//!
//! Parameters of an in-process devnet. Every field has a default; the
//! `QC_*` environment variables override them at startup.

use qc_08_consensus::ConsensusConfig;
use shared_types::stake::WEI_PER_TOKEN;
use std::time::Duration;
use tracing::warn;

/// Complete devnet configuration.
#[derive(Debug, Clone)]
pub struct DevnetConfig {
    /// Validators run in this process.
    pub validators: usize,
    /// Stop after every node finalized this height. 0 runs until Ctrl+C.
    pub max_blocks: u64,
    /// Consensus stake of each validator.
    pub validator_stake: u128,
    /// Deposit each node places in both committee pools.
    pub committee_stake: u128,
    /// Consensus engine configuration, shared by every node.
    pub consensus: ConsensusConfig,
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            validators: 4,
            max_blocks: 0,
            validator_stake: 100 * WEI_PER_TOKEN,
            committee_stake: 10_000 * WEI_PER_TOKEN,
            consensus: ConsensusConfig {
                max_epoch_length: Duration::from_secs(1),
                committee_checkpoint_interval: 10,
                ..ConsensusConfig::default()
            },
        }
    }
}

impl DevnetConfig {
    /// Apply `QC_VALIDATORS`, `QC_EPOCH_MS`, `QC_MAX_BLOCKS` and `QC_CHAIN_ID`
    /// from `lookup`. Unparsable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup("QC_VALIDATORS") {
            match value.parse() {
                Ok(n) => self.validators = n,
                Err(_) => warn!(value, "QC_VALIDATORS must be a number"),
            }
        }
        if let Some(value) = lookup("QC_EPOCH_MS") {
            match value.parse() {
                Ok(ms) => self.consensus.max_epoch_length = Duration::from_millis(ms),
                Err(_) => warn!(value, "QC_EPOCH_MS must be a number of milliseconds"),
            }
        }
        if let Some(value) = lookup("QC_MAX_BLOCKS") {
            match value.parse() {
                Ok(n) => self.max_blocks = n,
                Err(_) => warn!(value, "QC_MAX_BLOCKS must be a number"),
            }
        }
        if let Some(value) = lookup("QC_CHAIN_ID") {
            self.consensus.chain_id = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.validators == 0 {
            return Err(ConfigError::NoValidators);
        }
        if self.consensus.max_epoch_length.is_zero() {
            return Err(ConfigError::ZeroEpochLength);
        }
        if self.consensus.chain_id.is_empty() {
            return Err(ConfigError::EmptyChainId);
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("A devnet needs at least one validator")]
    NoValidators,

    #[error("Epoch length must be positive")]
    ZeroEpochLength,

    #[error("Chain id must not be empty")]
    EmptyChainId,
}
