//! Consensus state machine over the block tree.
//!
//! Tracks `{highest_cc, last_finalized, tip, height, epoch, last_vote_height}`
//! and persists it after every change. All transitions run under one mutex;
//! the block tree has its own lock and never calls back into the core.

use crate::domain::{
    BlockValidationError, ConsensusConfig, ConsensusError, ConsensusResult, ValidatorSelector,
};
use crate::state::{StateStore, StateStub};
use parking_lot::Mutex;
use qc_02_block_tree::{BlockTree, ChainError, KeyValueStore};
use shared_types::{
    is_empty_address, is_empty_hash, short_hash, Block, CommitCertificate, ExtendedBlock, Hash,
    ValidatorSet,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct CoreState {
    highest_cc: Hash,
    highest_cc_height: u64,
    last_finalized: Hash,
    last_finalized_height: u64,
    tip: Hash,
    /// Height the chain is working on: highest CC height + 1
    height: u64,
    epoch: u64,
    last_vote_height: u64,
}

/// What a new commit certificate changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CcOutcome {
    /// Newly finalized blocks, ascending by height
    pub finalized: Vec<ExtendedBlock>,
    pub height_advanced: bool,
}

pub struct ConsensusCore<S: KeyValueStore, V: ValidatorSelector> {
    config: ConsensusConfig,
    tree: Arc<BlockTree<S>>,
    state_store: StateStore<S>,
    selector: Arc<V>,
    state: Mutex<CoreState>,
    finalized: mpsc::Sender<ExtendedBlock>,
}

impl<S: KeyValueStore, V: ValidatorSelector> ConsensusCore<S, V> {
    /// Load persisted state for `tree`'s chain, or start from its root.
    ///
    /// State persisted for a different root is discarded. Either way the tip
    /// is recomputed from the highest CC block.
    pub fn new(
        config: ConsensusConfig,
        tree: Arc<BlockTree<S>>,
        selector: Arc<V>,
    ) -> ConsensusResult<(Self, mpsc::Receiver<ExtendedBlock>)> {
        let state_store = StateStore::new(Arc::clone(tree.store()));
        let root = tree.root()?;

        let stub = match state_store.load()? {
            Some(stub) if stub.root == root.hash() => Some(stub),
            Some(stub) => {
                warn!(
                    persisted_root = %short_hash(&stub.root),
                    root = %short_hash(&root.hash()),
                    "discarding consensus state of a different chain"
                );
                None
            }
            None => None,
        };

        let (highest, last_finalized, epoch, last_vote_height) = match stub {
            Some(stub) => (
                tree.find_block(&stub.highest_cc_block)?,
                tree.find_block(&stub.last_finalized_block)?,
                stub.epoch,
                stub.last_vote_height,
            ),
            None => (root.clone(), root, 0, 0),
        };
        let (tip, _) = tree.deepest_descendant(&highest.hash(), config.max_descendant_search)?;

        let state = CoreState {
            highest_cc: highest.hash(),
            highest_cc_height: highest.height,
            last_finalized: last_finalized.hash(),
            last_finalized_height: last_finalized.height,
            tip: tip.hash(),
            height: highest.height + 1,
            epoch,
            last_vote_height,
        };
        let (finalized, finalized_rx) = mpsc::channel(config.message_queue_size.max(1));
        let core = Self {
            config,
            tree,
            state_store,
            selector,
            state: Mutex::new(state),
            finalized,
        };
        core.persist(&state)?;
        info!(
            highest_cc = %short_hash(&state.highest_cc),
            tip = %short_hash(&state.tip),
            height = state.height,
            epoch = state.epoch,
            "consensus state loaded"
        );
        Ok((core, finalized_rx))
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    pub fn tree(&self) -> &Arc<BlockTree<S>> {
        &self.tree
    }

    pub fn state_store(&self) -> &StateStore<S> {
        &self.state_store
    }

    pub fn selector(&self) -> &Arc<V> {
        &self.selector
    }

    /// Validators for the current epoch.
    pub fn validators(&self) -> ValidatorSet {
        self.selector.validator_set_for_epoch(self.epoch())
    }

    pub fn tip(&self) -> ConsensusResult<ExtendedBlock> {
        let tip = self.state.lock().tip;
        Ok(self.tree.find_block(&tip)?)
    }

    pub fn highest_cc(&self) -> ConsensusResult<ExtendedBlock> {
        let hash = self.state.lock().highest_cc;
        Ok(self.tree.find_block(&hash)?)
    }

    pub fn last_finalized(&self) -> ConsensusResult<ExtendedBlock> {
        let hash = self.state.lock().last_finalized;
        Ok(self.tree.find_block(&hash)?)
    }

    pub fn height(&self) -> u64 {
        self.state.lock().height
    }

    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    pub fn last_vote_height(&self) -> u64 {
        self.state.lock().last_vote_height
    }

    // =========================================================================
    // EPOCH & VOTING
    // =========================================================================

    /// Move to `epoch`. Returns false, changing nothing, unless it is ahead.
    pub fn set_epoch(&self, epoch: u64) -> ConsensusResult<bool> {
        let mut state = self.state.lock();
        if epoch <= state.epoch {
            return Ok(false);
        }
        state.epoch = epoch;
        self.persist(&state)?;
        debug!(epoch, "entered epoch");
        Ok(true)
    }

    /// Claim the right to vote at `height`. At most one vote per height, and
    /// never below a height already voted at.
    pub fn record_vote_height(&self, height: u64) -> ConsensusResult<bool> {
        let mut state = self.state.lock();
        if height <= state.last_vote_height {
            return Ok(false);
        }
        state.last_vote_height = height;
        self.persist(&state)?;
        Ok(true)
    }

    /// Fork choice: the deepest descendant of the highest CC block.
    pub fn recompute_tip(&self) -> ConsensusResult<ExtendedBlock> {
        let mut state = self.state.lock();
        let (tip, _) = self
            .tree
            .deepest_descendant(&state.highest_cc, self.config.max_descendant_search)?;
        if tip.hash() != state.tip {
            state.tip = tip.hash();
            self.persist(&state)?;
        }
        Ok(tip)
    }

    // =========================================================================
    // BLOCK VALIDATION
    // =========================================================================

    /// Check `block` against its stored parent. The checks run in a fixed
    /// order and the first failure is returned as `InvalidBlock`.
    pub fn validate_block(&self, block: &Block) -> ConsensusResult<()> {
        let header = &block.header;
        if header.chain_id != self.config.chain_id {
            return invalid(BlockValidationError::ChainIdMismatch {
                expected: self.config.chain_id.clone(),
                actual: header.chain_id.clone(),
            });
        }

        if header.height == 0 {
            return invalid(BlockValidationError::MissingHeight);
        }
        let expected_version = self.config.fork_schedule.header_version(header.height);
        if header.committee_votes.version() != expected_version {
            return invalid(BlockValidationError::VersionMismatch {
                height: header.height,
            });
        }

        if is_empty_hash(&header.parent) {
            return invalid(BlockValidationError::EmptyParent);
        }
        let parent = match self.tree.find_block(&header.parent) {
            Ok(parent) => parent,
            Err(ChainError::NotFound(_)) => {
                return invalid(BlockValidationError::UnknownParent(header.parent));
            }
            Err(e) => return Err(e.into()),
        };
        if header.height != parent.height + 1 {
            return invalid(BlockValidationError::HeightMismatch {
                parent: parent.height,
                height: header.height,
            });
        }
        if header.epoch < parent.header().epoch {
            return invalid(BlockValidationError::EpochRegression {
                parent: parent.header().epoch,
                epoch: header.epoch,
            });
        }

        if header.hcc.is_empty() {
            return invalid(BlockValidationError::EmptyHcc);
        }
        if header.timestamp.is_none() {
            return invalid(BlockValidationError::MissingTimestamp);
        }
        if is_empty_address(&header.proposer) {
            return invalid(BlockValidationError::EmptyProposer);
        }

        if header.signature.is_none() {
            return invalid(BlockValidationError::MissingSignature);
        }
        match header.signer() {
            Ok(signer) if signer == header.proposer => {}
            _ => return invalid(BlockValidationError::InvalidSignature),
        }

        if !block.tx_root_matches() {
            return invalid(BlockValidationError::TxRootMismatch);
        }

        self.check_hcc_linkage(block, &parent)
    }

    pub fn is_valid_block(&self, block: &Block) -> bool {
        match self.validate_block(block) {
            Ok(()) => true,
            Err(e) => {
                debug!(block = %short_hash(&block.hash()), error = %e, "invalid block");
                false
            }
        }
    }

    /// A block whose parent changed the validator set must reference that
    /// parent as its HCC. Otherwise the HCC may be any ancestor, as long as
    /// no validator-update block lies strictly between the parent and it.
    fn check_hcc_linkage(&self, block: &Block, parent: &ExtendedBlock) -> ConsensusResult<()> {
        let hcc = &block.header.hcc;
        let target = hcc.block_hash;

        if parent.has_validator_update {
            if target != parent.hash() {
                return invalid(BlockValidationError::HccMustReferenceParent);
            }
        } else if !self.hcc_is_reachable(parent, &target)? {
            return invalid(BlockValidationError::HccNotAncestor);
        }

        if hcc.has_votes() {
            let validators = self.selector.validator_set_for_epoch(block.header.epoch);
            if let Err(e) = hcc.validate(&validators) {
                return invalid(BlockValidationError::InvalidHcc(e));
            }
        }
        Ok(())
    }

    /// Walk up from `parent` toward `target`. Crossing a validator-update
    /// block on the way is a linkage error.
    fn hcc_is_reachable(&self, parent: &ExtendedBlock, target: &Hash) -> ConsensusResult<bool> {
        let mut current = parent.clone();
        for _ in 0..=self.config.max_hcc_distance {
            if current.hash() == *target {
                return Ok(true);
            }
            if current.has_validator_update {
                return invalid(BlockValidationError::HccSkipsValidatorUpdate(current.hash()));
            }
            if current.height == 0 {
                return Ok(false);
            }
            current = match self.tree.find_block(&current.parent) {
                Ok(eb) => eb,
                Err(ChainError::NotFound(_)) => return Ok(false),
                Err(e) => return Err(e.into()),
            };
        }
        Ok(false)
    }

    // =========================================================================
    // COMMIT CERTIFICATES & FINALIZATION
    // =========================================================================

    /// Validate `cc`, attach it to its block and process the block.
    pub fn apply_commit_certificate(&self, cc: &CommitCertificate) -> ConsensusResult<CcOutcome> {
        cc.validate(&self.validators())?;
        let mut eb = self.tree.find_block(&cc.block_hash)?;
        if eb.commit_certificate.is_none() {
            eb = self.tree.attach_commit_certificate(cc)?;
            for vote in cc.votes.iter() {
                self.tree.add_vote_to_index(vote)?;
            }
            debug!(
                block = %short_hash(&cc.block_hash),
                votes = cc.votes.size(),
                "commit certificate attached"
            );
        }
        self.process_cc_block(&eb)
    }

    /// Advance consensus state for a block that just got a CC.
    ///
    /// Blocks at or below the highest CC height are ignored, so the highest
    /// CC height never decreases. Two consecutive certified blocks finalize
    /// the first of them.
    pub fn process_cc_block(&self, cc_block: &ExtendedBlock) -> ConsensusResult<CcOutcome> {
        let mut state = self.state.lock();
        if cc_block.height <= state.highest_cc_height {
            return Ok(CcOutcome::default());
        }
        let cc_hash = cc_block.hash();
        state.highest_cc = cc_hash;
        state.highest_cc_height = cc_block.height;
        info!(block = %short_hash(&cc_hash), height = cc_block.height, "new highest CC block");

        let mut outcome = CcOutcome::default();
        let parent = self.tree.find_block(&cc_block.parent)?;
        if parent.commit_certificate.is_some() {
            outcome.finalized = self.finalize_locked(&mut state, &parent)?;
        }

        let distance = self.config.max_hcc_distance;
        let on_tip_branch = self.tree.is_descendant(&state.tip, &cc_hash, distance)?
            || self.tree.is_descendant(&cc_hash, &state.tip, distance)?;
        if !on_tip_branch {
            info!(
                from = %short_hash(&state.tip),
                to = %short_hash(&cc_hash),
                "switching fork"
            );
        }

        if cc_block.height >= state.height {
            state.height = cc_block.height + 1;
            outcome.height_advanced = true;
        }

        let (tip, _) = self
            .tree
            .deepest_descendant(&cc_hash, self.config.max_descendant_search)?;
        state.tip = tip.hash();
        self.persist(&state)?;
        Ok(outcome)
    }

    /// Finalize `block` and its unfinalized ancestors.
    pub fn finalize_block(&self, block: &ExtendedBlock) -> ConsensusResult<Vec<ExtendedBlock>> {
        let mut state = self.state.lock();
        let finalized = self.finalize_locked(&mut state, block)?;
        self.persist(&state)?;
        Ok(finalized)
    }

    fn finalize_locked(
        &self,
        state: &mut CoreState,
        block: &ExtendedBlock,
    ) -> ConsensusResult<Vec<ExtendedBlock>> {
        let hash = block.hash();
        if hash == state.last_finalized {
            return Ok(Vec::new());
        }
        let was_finalized = block.status.is_finalized();
        let finalized = self.tree.finalize_ancestors(&hash)?;

        if block.height > state.last_finalized_height {
            state.last_finalized = hash;
            state.last_finalized_height = block.height;
        }

        let pruned = self.state_store.prune_votes_through(state.last_finalized_height)?;
        if pruned > 0 {
            debug!(height = state.last_finalized_height, pruned, "pruned collected votes");
        }
        if !was_finalized {
            for eb in &finalized {
                self.emit_finalized(eb.clone());
            }
        }
        Ok(finalized)
    }

    fn emit_finalized(&self, block: ExtendedBlock) {
        let height = block.height;
        match self.finalized.try_send(block) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(height, "finalized block consumer is behind; block not delivered");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(height, "no finalized block consumer");
            }
        }
    }

    fn persist(&self, state: &CoreState) -> ConsensusResult<()> {
        self.state_store.commit(&StateStub {
            root: self.tree.root_hash(),
            highest_cc_block: state.highest_cc,
            last_finalized_block: state.last_finalized,
            last_vote_height: state.last_vote_height,
            epoch: state.epoch,
        })
    }
}

fn invalid<T>(e: BlockValidationError) -> ConsensusResult<T> {
    Err(ConsensusError::InvalidBlock(e))
}
