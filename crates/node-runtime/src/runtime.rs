//! # Devnet Runtime
//!
//! Starts every engine of a `DevnetContainer`, follows each node's finalized
//! blocks, and shuts all of them down through one watch channel.

use crate::container::{DevnetContainer, DevnetNode};
use parking_lot::Mutex;
use qc_08_consensus::{ConsensusEngineApi, ConsensusError};
use shared_types::{short_hash, Hash};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

/// Finalization progress of one node.
struct NodeProgress {
    height: watch::Receiver<u64>,
    finalized: Arc<Mutex<Vec<Hash>>>,
}

pub struct DevnetRuntime {
    container: DevnetContainer,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    progress: Mutex<Vec<NodeProgress>>,
    watchers: Mutex<Vec<JoinHandle<()>>>,
}

impl DevnetRuntime {
    pub fn new(container: DevnetContainer) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            container,
            shutdown_tx,
            shutdown_rx,
            progress: Mutex::new(Vec::new()),
            watchers: Mutex::new(Vec::new()),
        }
    }

    pub fn container(&self) -> &DevnetContainer {
        &self.container
    }

    /// Start every engine and a watcher per node that records its finalized
    /// blocks.
    pub fn start(&self) -> Result<(), ConsensusError> {
        info!(
            validators = self.container.nodes().len(),
            epoch_ms = self.container.config.consensus.max_epoch_length.as_millis() as u64,
            "starting devnet"
        );

        for node in self.container.nodes() {
            let finalized_rx = node
                .engine
                .take_finalized_blocks()
                .ok_or(ConsensusError::AlreadyStarted)?;
            node.engine.start(self.shutdown_rx.clone())?;

            let initial = node.engine.core().last_finalized()?.height;
            let (height_tx, height) = watch::channel(initial);
            let finalized = Arc::new(Mutex::new(Vec::new()));
            let watcher = spawn_watcher(node, finalized_rx, height_tx, Arc::clone(&finalized));

            self.progress.lock().push(NodeProgress { height, finalized });
            self.watchers.lock().push(watcher);
        }
        Ok(())
    }

    /// Resolve once every node finalized `height`. Fails only if a node
    /// stopped emitting blocks before reaching it.
    pub async fn wait_for_finalized(&self, height: u64) -> Result<(), watch::error::RecvError> {
        let receivers: Vec<_> = self
            .progress
            .lock()
            .iter()
            .map(|p| p.height.clone())
            .collect();
        for mut rx in receivers {
            rx.wait_for(|h| *h >= height).await?;
        }
        Ok(())
    }

    /// Resolve once node `index` finalized `height`.
    pub async fn wait_for_node(
        &self,
        index: usize,
        height: u64,
    ) -> Result<(), watch::error::RecvError> {
        let receiver = self.progress.lock().get(index).map(|p| p.height.clone());
        if let Some(mut rx) = receiver {
            rx.wait_for(|h| *h >= height).await?;
        }
        Ok(())
    }

    /// Lowest finalized height across the nodes.
    pub fn finalized_height(&self) -> u64 {
        self.progress
            .lock()
            .iter()
            .map(|p| *p.height.borrow())
            .min()
            .unwrap_or(0)
    }

    /// Hashes node `index` finalized since `start`, in finalization order.
    pub fn finalized_hashes(&self, index: usize) -> Vec<Hash> {
        self.progress
            .lock()
            .get(index)
            .map(|p| p.finalized.lock().clone())
            .unwrap_or_default()
    }

    /// Signal shutdown and wait for every engine and watcher to finish.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }

        for node in self.container.nodes() {
            node.engine.wait().await;
        }
        let watchers = std::mem::take(&mut *self.watchers.lock());
        for watcher in watchers {
            watcher.abort();
        }
        info!("Shutdown complete");
    }
}

fn spawn_watcher(
    node: &DevnetNode,
    mut finalized_rx: tokio::sync::mpsc::Receiver<shared_types::ExtendedBlock>,
    height_tx: watch::Sender<u64>,
    finalized: Arc<Mutex<Vec<Hash>>>,
) -> JoinHandle<()> {
    let span = tracing::info_span!("devnet", node = %node.name);
    tokio::spawn(
        async move {
            while let Some(block) = finalized_rx.recv().await {
                debug!(block = %short_hash(&block.hash()), height = block.height, "finalized");
                finalized.lock().push(block.hash());
                height_tx.send_modify(|h| *h = (*h).max(block.height));
            }
        }
        .instrument(span),
    )
}
