//! In-memory ledger adapter

use crate::ports::LedgerGateway;
use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Block, EliteEdgeNodePool, GuardianCandidatePool, Hash};
use std::collections::HashSet;

/// Fixed committee pools and a configured set of validator-update heights.
#[derive(Default)]
pub struct StaticLedger {
    guardians: RwLock<GuardianCandidatePool>,
    elite_edge_nodes: RwLock<EliteEdgeNodePool>,
    validator_update_heights: RwLock<HashSet<u64>>,
}

impl StaticLedger {
    pub fn new(guardians: GuardianCandidatePool, elite_edge_nodes: EliteEdgeNodePool) -> Self {
        Self {
            guardians: RwLock::new(guardians),
            elite_edge_nodes: RwLock::new(elite_edge_nodes),
            validator_update_heights: RwLock::new(HashSet::new()),
        }
    }

    pub fn set_guardian_pool(&self, pool: GuardianCandidatePool) {
        *self.guardians.write() = pool;
    }

    pub fn set_elite_edge_node_pool(&self, pool: EliteEdgeNodePool) {
        *self.elite_edge_nodes.write() = pool;
    }

    /// Blocks at `height` report a validator update.
    pub fn mark_validator_update(&self, height: u64) {
        self.validator_update_heights.write().insert(height);
    }
}

#[async_trait]
impl LedgerGateway for StaticLedger {
    async fn guardian_candidate_pool(&self, _block: Hash) -> Result<GuardianCandidatePool, String> {
        Ok(self.guardians.read().clone())
    }

    async fn elite_edge_node_pool(&self, _block: Hash) -> Result<EliteEdgeNodePool, String> {
        Ok(self.elite_edge_nodes.read().clone())
    }

    async fn has_validator_update(&self, block: &Block) -> Result<bool, String> {
        Ok(self.validator_update_heights.read().contains(&block.height()))
    }
}
