//! Status moves and finalization.

use super::*;
use shared_types::CommitCertificate;
use tracing::info;

impl<S: KeyValueStore> BlockTree<S> {
    /// Move a block to `status`, rejecting moves the lifecycle forbids.
    pub fn set_status(&self, hash: &Hash, status: BlockStatus) -> ChainResult<ExtendedBlock> {
        self.modify_block(hash, |eb| {
            apply_status(eb, status)?;
            Ok(eb.clone())
        })
    }

    pub fn mark_valid(&self, hash: &Hash) -> ChainResult<ExtendedBlock> {
        self.set_status(hash, BlockStatus::Valid)
    }

    pub fn mark_invalid(&self, hash: &Hash) -> ChainResult<ExtendedBlock> {
        self.set_status(hash, BlockStatus::Invalid)
    }

    pub fn mark_committed(&self, hash: &Hash) -> ChainResult<ExtendedBlock> {
        self.set_status(hash, BlockStatus::Committed)
    }

    /// Store the certificate on its block and move the block to at least
    /// `Committed`. Finalized blocks keep their status.
    pub fn attach_commit_certificate(&self, cc: &CommitCertificate) -> ChainResult<ExtendedBlock> {
        self.modify_block(&cc.block_hash, |eb| {
            if !eb.status.is_finalized() {
                apply_status(eb, BlockStatus::Committed)?;
            }
            eb.commit_certificate = Some(cc.clone());
            Ok(eb.clone())
        })
    }

    pub fn set_has_validator_update(&self, hash: &Hash) -> ChainResult<ExtendedBlock> {
        self.modify_block(hash, |eb| {
            eb.has_validator_update = true;
            Ok(eb.clone())
        })
    }

    /// Finalize `from` directly and every unfinalized ancestor indirectly.
    ///
    /// The walk stops at the first finalized ancestor, so repeated calls only
    /// touch the new suffix. Returns the newly finalized records in ascending
    /// height order; empty when `from` was already finalized.
    pub fn finalize_ancestors(&self, from: &Hash) -> ChainResult<Vec<ExtendedBlock>> {
        let _guard = self.lock.lock();

        let mut finalized = Vec::new();
        let mut current = self.find_block(from)?;
        match current.status {
            BlockStatus::DirectlyFinalized | BlockStatus::Trusted => return Ok(finalized),
            BlockStatus::IndirectlyFinalized => {
                // Ancestors of an indirectly finalized block are finalized.
                apply_status(&mut current, BlockStatus::DirectlyFinalized)?;
                self.put_block(&current)?;
                return Ok(vec![current]);
            }
            _ => apply_status(&mut current, BlockStatus::DirectlyFinalized)?,
        }

        loop {
            let parent_hash = current.parent;
            finalized.push(current);

            let mut parent = match self.get_block(&parent_hash)? {
                Some(parent) => parent,
                // Only the root lacks a stored parent, and it is Trusted.
                None => return Err(ChainError::NotFound(parent_hash)),
            };
            if parent.status.is_finalized() {
                break;
            }
            apply_status(&mut parent, BlockStatus::IndirectlyFinalized)?;
            current = parent;
        }

        let mut ops = Vec::with_capacity(finalized.len());
        for eb in &finalized {
            ops.push(BatchOperation::put(KeyPrefix::block_key(&eb.hash()), encode(eb)?));
        }
        self.store.atomic_batch_write(ops)?;

        finalized.reverse();
        if let (Some(first), Some(last)) = (finalized.first(), finalized.last()) {
            info!(
                from_height = first.height,
                to_height = last.height,
                block = %short_hash(&last.hash()),
                "finalized blocks"
            );
        }
        Ok(finalized)
    }
}

fn apply_status(eb: &mut ExtendedBlock, status: BlockStatus) -> ChainResult<()> {
    if !eb.status.can_transition_to(status) {
        return Err(ChainError::StatusRegression {
            block: eb.hash(),
            from: eb.status,
            to: status,
        });
    }
    eb.status = status;
    Ok(())
}
