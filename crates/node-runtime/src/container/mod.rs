//! # Devnet Container
//!
//! Builds every validator of an in-process devnet with its dependencies:
//!
//! - one secp256k1 consensus key and one BLS committee key per node
//! - one in-memory store and block tree per node, rooted at the shared genesis
//! - a `LocalNetworkHub` connecting all nodes
//! - one `StaticLedger` serving the genesis committee pools
//!
//! A container can be `restart`ed: the nodes are rebuilt over the same stores
//! and keys, which is how a node crash is exercised without a disk.

pub mod config;

pub use config::{ConfigError, DevnetConfig};

use crate::genesis::{Genesis, GenesisBuilder, GenesisConfig, GenesisError};
use qc_02_block_tree::{BlockTree, ChainError, InMemoryKVStore};
use qc_08_consensus::{
    ConsensusDependencies, ConsensusEngine, ConsensusError, LocalNetwork, LocalNetworkHub,
    RotatingValidatorManager, StaticLedger,
};
use shared_crypto::{BlsKeyPair, CryptoError, Secp256k1KeyPair};
use shared_types::{address_hex, Address};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// The engine type every devnet node runs.
pub type DevnetEngine =
    ConsensusEngine<InMemoryKVStore, RotatingValidatorManager, LocalNetwork, StaticLedger>;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Genesis error: {0}")]
    Genesis(#[from] GenesisError),

    #[error("Block tree error: {0}")]
    Chain(#[from] ChainError),

    #[error("Consensus error: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Key error: {0}")]
    Crypto(#[from] CryptoError),
}

#[derive(Clone)]
struct NodeKeys {
    validator: Secp256k1KeyPair,
    bls_secret: [u8; 32],
}

/// One validator of the devnet.
pub struct DevnetNode {
    pub name: String,
    pub address: Address,
    pub store: Arc<InMemoryKVStore>,
    pub tree: Arc<BlockTree<InMemoryKVStore>>,
    pub engine: Arc<DevnetEngine>,
}

/// All nodes of a devnet and what they share.
pub struct DevnetContainer {
    pub config: DevnetConfig,
    pub genesis: Genesis,
    pub hub: Arc<LocalNetworkHub>,
    pub ledger: Arc<StaticLedger>,
    keys: Vec<NodeKeys>,
    nodes: Vec<DevnetNode>,
}

impl DevnetContainer {
    /// Generate keys and genesis, then build every node on a fresh store.
    pub fn new(config: DevnetConfig) -> Result<Self, ContainerError> {
        config.validate()?;

        let mut keys = Vec::with_capacity(config.validators);
        let mut builder = GenesisBuilder::new(GenesisConfig {
            chain_id: config.consensus.chain_id.clone(),
            fork_schedule: config.consensus.fork_schedule.clone(),
            validator_stake: config.validator_stake,
            committee_stake: config.committee_stake,
        });
        for _ in 0..config.validators {
            let validator = Secp256k1KeyPair::generate();
            let bls = BlsKeyPair::generate()?;
            builder = builder.validator(validator.address(), bls.public_key());
            keys.push(NodeKeys {
                validator,
                bls_secret: bls.secret_bytes(),
            });
        }
        let genesis = builder.build()?;
        info!(
            chain_id = %config.consensus.chain_id,
            genesis = %hex::encode(&genesis.block.hash()[..8]),
            validators = config.validators,
            "devnet genesis created"
        );

        let stores = (0..keys.len())
            .map(|_| Arc::new(InMemoryKVStore::new()))
            .collect();
        Self::assemble(config, genesis, keys, stores)
    }

    /// Rebuild every node over its existing store, as after a crash of the
    /// whole devnet. The old engines must be shut down first.
    pub fn restart(&self) -> Result<Self, ContainerError> {
        let stores = self.nodes.iter().map(|n| Arc::clone(&n.store)).collect();
        Self::assemble(
            self.config.clone(),
            self.genesis.clone(),
            self.keys.clone(),
            stores,
        )
    }

    fn assemble(
        config: DevnetConfig,
        genesis: Genesis,
        keys: Vec<NodeKeys>,
        stores: Vec<Arc<InMemoryKVStore>>,
    ) -> Result<Self, ContainerError> {
        let hub = LocalNetworkHub::new();
        let ledger = Arc::new(StaticLedger::new(
            genesis.guardians.clone(),
            genesis.elite_edge_nodes.clone(),
        ));
        let selector = Arc::new(RotatingValidatorManager::new(genesis.validators.clone()));

        let mut nodes = Vec::with_capacity(keys.len());
        for (index, (key, store)) in keys.iter().zip(stores).enumerate() {
            let name = format!("node-{index}");
            let tree = Arc::new(BlockTree::new(
                config.consensus.chain_id.clone(),
                Arc::clone(&store),
                genesis.block.clone(),
            )?);
            let deps = ConsensusDependencies {
                tree: Arc::clone(&tree),
                selector: Arc::clone(&selector),
                network: Arc::new(hub.connect(name.clone())),
                ledger: Arc::clone(&ledger),
                config: config.consensus.clone(),
            };
            let bls = BlsKeyPair::from_secret_bytes(&key.bls_secret)?;
            let engine = Arc::new(ConsensusEngine::new(deps, key.validator.clone(), bls)?);

            let address = key.validator.address();
            info!(node = %name, address = %address_hex(&address), "validator ready");
            nodes.push(DevnetNode {
                name,
                address,
                store,
                tree,
                engine,
            });
        }

        Ok(Self {
            config,
            genesis,
            hub,
            ledger,
            keys,
            nodes,
        })
    }

    pub fn nodes(&self) -> &[DevnetNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&DevnetNode> {
        self.nodes.get(index)
    }
}
