//! Bounded tree searches.

use super::*;
use tracing::warn;

impl<S: KeyValueStore> BlockTree<S> {
    /// Deepest valid-or-pending block below `hash`, with its depth.
    ///
    /// Iterative depth-first search over child links. Invalid blocks and their
    /// subtrees are skipped. At most `max_nodes` records are loaded; when the
    /// budget runs out the deepest block seen so far is returned. Among equally
    /// deep blocks the first one reached wins.
    pub fn deepest_descendant(
        &self,
        hash: &Hash,
        max_nodes: usize,
    ) -> ChainResult<(ExtendedBlock, u64)> {
        let start = self.find_block(hash)?;
        let mut stack: Vec<(Hash, u64)> = start.children.iter().rev().map(|c| (*c, 1)).collect();
        let mut best = (start, 0u64);
        let mut visited = 0usize;

        while let Some((current, depth)) = stack.pop() {
            if visited >= max_nodes {
                warn!(
                    start = %short_hash(hash),
                    max_nodes,
                    depth = best.1,
                    "descendant search budget exhausted"
                );
                break;
            }
            visited += 1;

            let Some(eb) = self.get_block(&current)? else {
                continue;
            };
            if eb.status.is_invalid() {
                continue;
            }
            stack.extend(eb.children.iter().rev().map(|c| (*c, depth + 1)));
            if depth > best.1 {
                best = (eb, depth);
            }
        }
        Ok(best)
    }

    /// Whether `ancestor` is reachable from `descendant` within `max_distance`
    /// parent links. A block is its own descendant at distance zero.
    pub fn is_descendant(
        &self,
        ancestor: &Hash,
        descendant: &Hash,
        max_distance: u64,
    ) -> ChainResult<bool> {
        let Some(target) = self.get_block(ancestor)? else {
            return Ok(false);
        };
        let mut current = *descendant;
        for _ in 0..=max_distance {
            if current == *ancestor {
                return Ok(true);
            }
            let Some(eb) = self.get_block(&current)? else {
                return Ok(false);
            };
            if eb.height <= target.height {
                return Ok(false);
            }
            current = eb.parent;
        }
        Ok(false)
    }
}
