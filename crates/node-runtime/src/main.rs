//! # Quantum-Chain Devnet
//!
//! Runs `QC_VALIDATORS` consensus engines in one process, connected by an
//! in-memory network, until `QC_MAX_BLOCKS` blocks are finalized on every
//! node or Ctrl+C is pressed.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration (defaults, then `QC_*` environment overrides)
//! 2. Generate validator keys and the genesis state
//! 3. Build one block tree and engine per validator
//! 4. Start the engines and follow finalization

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use node_runtime::{DevnetConfig, DevnetContainer, DevnetRuntime};

/// Load configuration from the environment.
fn load_config() -> DevnetConfig {
    let mut config = DevnetConfig::default();
    config.apply_overrides(|key| std::env::var(key).ok());
    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = load_config();
    config.validate().context("Invalid devnet configuration")?;
    let max_blocks = config.max_blocks;

    let container = DevnetContainer::new(config).context("Failed to build devnet")?;
    let runtime = DevnetRuntime::new(container);
    runtime.start().context("Failed to start consensus engines")?;

    if max_blocks == 0 {
        info!("Devnet is running. Press Ctrl+C to stop.");
        tokio::signal::ctrl_c().await?;
    } else {
        info!(max_blocks, "Devnet is running until every node finalized the target height");
        tokio::select! {
            result = runtime.wait_for_finalized(max_blocks) => {
                result.context("A node stopped before reaching the target height")?;
                info!(height = max_blocks, "target height finalized");
            }
            _ = report_progress(&runtime) => {}
            signal = tokio::signal::ctrl_c() => signal?,
        }
    }

    runtime.shutdown().await;
    Ok(())
}

/// Log the lowest finalized height every few seconds. Never returns.
async fn report_progress(runtime: &DevnetRuntime) {
    let mut interval = tokio::time::interval(Duration::from_secs(5));
    interval.tick().await;
    loop {
        interval.tick().await;
        info!(finalized = runtime.finalized_height(), "devnet progress");
    }
}
