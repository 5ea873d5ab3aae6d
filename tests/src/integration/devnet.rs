//! # Devnet Scenarios
//!
//! - Every node finalizes the same chain
//! - A restarted devnet resumes from its persisted state
//! - A node that stops receiving cannot stall the others

use node_runtime::{DevnetConfig, DevnetContainer, DevnetRuntime};
use std::time::Duration;

/// Short epochs keep proposer rotation fast in tests.
pub fn test_config(validators: usize) -> DevnetConfig {
    let mut config = DevnetConfig {
        validators,
        ..DevnetConfig::default()
    };
    config.consensus.max_epoch_length = Duration::from_millis(200);
    config.consensus.committee_checkpoint_interval = 2;
    config
}

/// The finalized block hash of every node at each height in `1..=up_to`.
///
/// Panics if a node has no finalized block, or more than one, at a height.
pub fn finalized_chain(container: &DevnetContainer, node: usize, up_to: u64) -> Vec<[u8; 32]> {
    let tree = &container.nodes()[node].tree;
    (1..=up_to)
        .map(|height| {
            let finalized: Vec<_> = tree
                .find_blocks_by_height(height)
                .unwrap_or_else(|e| panic!("read height {height}: {e}"))
                .into_iter()
                .filter(|eb| eb.status.is_finalized())
                .collect();
            assert_eq!(
                finalized.len(),
                1,
                "node {node} has {} finalized blocks at height {height}",
                finalized.len()
            );
            finalized[0].hash()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qc_08_consensus::ConsensusEngineApi;
    use tokio::time::timeout;

    const DEADLINE: Duration = Duration::from_secs(60);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_four_validators_finalize_the_same_chain() {
        let container = DevnetContainer::new(test_config(4)).unwrap();
        let runtime = DevnetRuntime::new(container);
        runtime.start().unwrap();

        timeout(DEADLINE, runtime.wait_for_finalized(5))
            .await
            .expect("devnet did not finalize height 5 in time")
            .unwrap();
        runtime.shutdown().await;

        let container = runtime.container();
        let reference = finalized_chain(container, 0, 5);
        for node in 1..4 {
            assert_eq!(finalized_chain(container, node, 5), reference);
        }

        // Blocks are emitted to the finalized stream parent first.
        for node in 0..4 {
            let emitted = runtime.finalized_hashes(node);
            let prefix: Vec<_> = emitted.iter().take(5).copied().collect();
            assert_eq!(prefix, reference);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_restarted_devnet_resumes() {
        let container = DevnetContainer::new(test_config(4)).unwrap();
        let runtime = DevnetRuntime::new(container);
        runtime.start().unwrap();
        timeout(DEADLINE, runtime.wait_for_finalized(3))
            .await
            .expect("devnet did not finalize height 3 in time")
            .unwrap();
        runtime.shutdown().await;

        let before: Vec<u64> = runtime
            .container()
            .nodes()
            .iter()
            .map(|n| n.engine.core().last_finalized().unwrap().height)
            .collect();
        let before_chain = finalized_chain(runtime.container(), 0, 3);

        let restarted = DevnetRuntime::new(runtime.container().restart().unwrap());
        for (node, height) in restarted.container().nodes().iter().zip(&before) {
            assert_eq!(node.engine.core().last_finalized().unwrap().height, *height);
            assert!(node.engine.tip().unwrap().height >= *height);
        }

        restarted.start().unwrap();
        let target = before.iter().max().copied().unwrap_or(0) + 2;
        timeout(DEADLINE, restarted.wait_for_finalized(target))
            .await
            .expect("restarted devnet did not make progress")
            .unwrap();
        restarted.shutdown().await;

        let after_chain = finalized_chain(restarted.container(), 0, target);
        assert_eq!(&after_chain[..3], &before_chain[..]);
        for node in 1..4 {
            assert_eq!(finalized_chain(restarted.container(), node, target), after_chain);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_isolated_node_does_not_stall_finality() {
        let container = DevnetContainer::new(test_config(4)).unwrap();
        let runtime = DevnetRuntime::new(container);
        runtime.start().unwrap();

        // Three of four equal stakes still hold a two-thirds majority.
        assert!(runtime.container().hub.disconnect("node-3"));

        for node in 0..3 {
            timeout(DEADLINE, runtime.wait_for_node(node, 4))
                .await
                .expect("connected nodes did not finalize height 4")
                .unwrap();
        }
        runtime.shutdown().await;

        let reference = finalized_chain(runtime.container(), 0, 4);
        for node in 1..3 {
            assert_eq!(finalized_chain(runtime.container(), node, 4), reference);
        }
    }
}
