//! # Genesis Builder
//!
//! Creates the genesis block together with the initial validator set and
//! committee pools of a devnet.

use shared_crypto::BlsPublicKeyBytes;
use shared_types::{
    Address, Block, EliteEdgeNodePool, ForkSchedule, GuardianCandidatePool, StakeError, Validator,
    ValidatorSet,
};
use thiserror::Error;

/// Genesis creation errors.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// Invalid genesis configuration.
    #[error("Invalid genesis configuration: {0}")]
    InvalidConfig(String),

    /// A committee deposit was rejected.
    #[error("Committee deposit rejected: {0}")]
    Deposit(#[from] StakeError),
}

/// Genesis configuration.
#[derive(Debug, Clone)]
pub struct GenesisConfig {
    pub chain_id: String,
    pub fork_schedule: ForkSchedule,
    /// Consensus stake of every validator.
    pub validator_stake: u128,
    /// Deposit each validator self-stakes into both committee pools.
    pub committee_stake: u128,
}

/// Everything a node needs to open the chain.
#[derive(Debug, Clone)]
pub struct Genesis {
    pub block: Block,
    pub validators: ValidatorSet,
    pub guardians: GuardianCandidatePool,
    pub elite_edge_nodes: EliteEdgeNodePool,
}

/// Builder for the genesis state.
pub struct GenesisBuilder {
    config: GenesisConfig,
    members: Vec<(Address, BlsPublicKeyBytes)>,
}

impl GenesisBuilder {
    pub fn new(config: GenesisConfig) -> Self {
        Self {
            config,
            members: Vec::new(),
        }
    }

    /// Register a validator that also joins both committees with `bls_key`.
    pub fn validator(mut self, address: Address, bls_key: BlsPublicKeyBytes) -> Self {
        self.members.push((address, bls_key));
        self
    }

    pub fn build(self) -> Result<Genesis, GenesisError> {
        if self.config.chain_id.is_empty() {
            return Err(GenesisError::InvalidConfig("chain id is empty".to_string()));
        }
        if self.members.is_empty() {
            return Err(GenesisError::InvalidConfig("no validators".to_string()));
        }
        if self.config.validator_stake == 0 {
            return Err(GenesisError::InvalidConfig("validator stake is zero".to_string()));
        }

        let forks = &self.config.fork_schedule;
        let stake = self.config.committee_stake;
        let mut guardians = GuardianCandidatePool::new();
        let mut elite_edge_nodes = EliteEdgeNodePool::new();
        for (address, bls_key) in &self.members {
            guardians.deposit_stake(*address, *address, stake, *bls_key, 0, forks)?;
            elite_edge_nodes.deposit_stake(*address, *address, stake, *bls_key, 0, forks)?;
        }

        let validators = ValidatorSet::from_validators(
            self.members
                .iter()
                .map(|(address, _)| Validator::new(*address, self.config.validator_stake)),
        );

        Ok(Genesis {
            block: Block::genesis(self.config.chain_id.clone(), forks),
            validators,
            guardians,
            elite_edge_nodes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::BlsKeyPair;
    use shared_types::stake::WEI_PER_TOKEN;

    fn config() -> GenesisConfig {
        GenesisConfig {
            chain_id: "devnet".to_string(),
            fork_schedule: ForkSchedule::default(),
            validator_stake: 100,
            committee_stake: 10_000 * WEI_PER_TOKEN,
        }
    }

    #[test]
    fn test_genesis_with_validators() {
        let keys: Vec<BlsKeyPair> = (0..3).map(|_| BlsKeyPair::generate().unwrap()).collect();
        let genesis = keys
            .iter()
            .enumerate()
            .fold(GenesisBuilder::new(config()), |builder, (i, key)| {
                builder.validator([i as u8 + 1; 20], key.public_key())
            })
            .build()
            .unwrap();

        assert_eq!(genesis.block.height(), 0);
        assert_eq!(genesis.validators.size(), 3);
        assert_eq!(genesis.guardians.with_stake().len(), 3);
        assert_eq!(genesis.elite_edge_nodes.with_stake().len(), 3);
        assert_eq!(genesis.guardians.index_of_holder(&[1; 20]), Some(0));
    }

    #[test]
    fn test_genesis_hash_deterministic() {
        let key = BlsKeyPair::generate().unwrap();
        let a = GenesisBuilder::new(config()).validator([1; 20], key.public_key()).build().unwrap();
        let b = GenesisBuilder::new(config()).validator([1; 20], key.public_key()).build().unwrap();
        assert_eq!(a.block.hash(), b.block.hash());
    }

    #[test]
    fn test_config_validation() {
        assert!(matches!(
            GenesisBuilder::new(config()).build(),
            Err(GenesisError::InvalidConfig(_))
        ));

        let key = BlsKeyPair::generate().unwrap();
        let low_deposit = GenesisConfig {
            committee_stake: 1,
            ..config()
        };
        assert!(matches!(
            GenesisBuilder::new(low_deposit).validator([1; 20], key.public_key()).build(),
            Err(GenesisError::Deposit(_))
        ));
    }
}
