//! Fixtures shared by the block tree and consensus test suites.

use crate::adapters::InMemoryKVStore;
use crate::service::BlockTree;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{
    tx_root, Address, Block, BlockHeader, CommitCertificate, CommitteeVotes, ForkSchedule,
    HeaderFields, Validator, ValidatorSet, ZERO_ADDRESS, ZERO_HASH,
};
use std::sync::Arc;

pub const TEST_CHAIN_ID: &str = "testnet";

pub fn genesis() -> Block {
    Block::genesis(TEST_CHAIN_ID, &ForkSchedule::default())
}

/// Fresh tree rooted at `genesis()` over an in-memory store.
pub fn new_tree() -> (Arc<InMemoryKVStore>, BlockTree<InMemoryKVStore>) {
    let store = Arc::new(InMemoryKVStore::new());
    let tree = BlockTree::new(TEST_CHAIN_ID, store.clone(), genesis())
        .unwrap_or_else(|e| panic!("open test tree: {e}"));
    (store, tree)
}

/// `n` validator keys sorted by address.
pub fn validator_keys(n: usize) -> Vec<Secp256k1KeyPair> {
    let mut keys: Vec<Secp256k1KeyPair> = (0..n).map(|_| Secp256k1KeyPair::generate()).collect();
    keys.sort_by_key(|k| k.address());
    keys
}

/// Equal-stake validator set over `keys`.
pub fn validator_set(keys: &[Secp256k1KeyPair]) -> ValidatorSet {
    ValidatorSet::from_validators(keys.iter().map(|k| Validator::new(k.address(), 100)))
}

/// Builds a child block. Defaults: next height, next epoch, HCC referencing the
/// parent, no transactions, no proposer, unsigned.
pub struct BlockBuilder {
    fields: HeaderFields,
    txs: Vec<Vec<u8>>,
    signer: Option<Secp256k1KeyPair>,
}

impl BlockBuilder {
    pub fn child_of(parent: &Block) -> Self {
        let height = parent.height() + 1;
        Self {
            fields: HeaderFields {
                chain_id: parent.header.chain_id.clone(),
                epoch: parent.header.epoch + 1,
                height,
                parent: parent.hash(),
                hcc: CommitCertificate::reference(parent.hash()),
                committee_votes: CommitteeVotes::for_version(
                    ForkSchedule::default().header_version(height),
                    None,
                    None,
                ),
                tx_hash: tx_root(&[]),
                state_hash: ZERO_HASH,
                timestamp: Some(1_700_000_000 + height),
                proposer: ZERO_ADDRESS,
                signature: None,
            },
            txs: Vec::new(),
            signer: None,
        }
    }

    pub fn epoch(mut self, epoch: u64) -> Self {
        self.fields.epoch = epoch;
        self
    }

    pub fn hcc(mut self, hcc: CommitCertificate) -> Self {
        self.fields.hcc = hcc;
        self
    }

    pub fn chain_id(mut self, chain_id: &str) -> Self {
        self.fields.chain_id = chain_id.to_string();
        self
    }

    /// Distinguishes siblings that would otherwise hash identically.
    pub fn state_hash(mut self, state_hash: [u8; 32]) -> Self {
        self.fields.state_hash = state_hash;
        self
    }

    pub fn txs(mut self, txs: Vec<Vec<u8>>) -> Self {
        self.fields.tx_hash = tx_root(&txs);
        self.txs = txs;
        self
    }

    pub fn proposer(mut self, proposer: Address) -> Self {
        self.fields.proposer = proposer;
        self
    }

    /// Sign with `key`, which also becomes the proposer unless overridden
    /// afterwards.
    pub fn signed_by(mut self, key: &Secp256k1KeyPair) -> Self {
        self.fields.proposer = key.address();
        self.signer = Some(key.clone());
        self
    }

    pub fn build(self) -> Block {
        let mut header = BlockHeader::new(self.fields);
        if let Some(key) = &self.signer {
            header
                .sign(key)
                .unwrap_or_else(|e| panic!("sign test block: {e}"));
        }
        Block::new(header, self.txs)
    }
}

/// Linear chain of `len` blocks on top of `parent`, each added to `tree`.
pub fn extend_chain(
    tree: &BlockTree<InMemoryKVStore>,
    parent: &Block,
    len: usize,
    branch: u8,
) -> Vec<Block> {
    let mut blocks = Vec::with_capacity(len);
    let mut tip = parent.clone();
    for _ in 0..len {
        let block = BlockBuilder::child_of(&tip).state_hash([branch; 32]).build();
        tree.add_block(block.clone())
            .unwrap_or_else(|e| panic!("add test block: {e}"));
        tip = block.clone();
        blocks.push(block);
    }
    blocks
}
