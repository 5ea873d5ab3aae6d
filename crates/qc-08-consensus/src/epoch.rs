//! Epoch timer.
//!
//! Fires every `max_epoch_length` without progress, advancing the epoch so a
//! silent proposer cannot stall the chain. CC progress and epoch catch-up
//! reset the deadline through `set_epoch`/`set_height`.

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{debug, warn};

/// Emitted when an epoch ends without progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochTick {
    /// The epoch just entered
    pub epoch: u64,
    pub height: u64,
}

#[derive(Debug)]
enum EpochCommand {
    SetEpoch(u64),
    SetHeight(u64),
}

/// Handle to a running epoch timer task.
#[derive(Clone)]
pub struct EpochManager {
    commands: mpsc::Sender<EpochCommand>,
}

impl EpochManager {
    /// Spawn the timer starting at `epoch`. Ticks are delivered on the
    /// returned receiver; the task exits on shutdown.
    pub fn spawn(
        period: Duration,
        epoch: u64,
        height: u64,
        queue_size: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, mpsc::Receiver<EpochTick>, JoinHandle<()>) {
        let (commands_tx, commands_rx) = mpsc::channel(queue_size.max(1));
        let (ticks_tx, ticks_rx) = mpsc::channel(queue_size.max(1));
        let timer = EpochTimer {
            period,
            epoch,
            height,
        };
        let handle = tokio::spawn(timer.run(commands_rx, ticks_tx, shutdown));
        (
            Self {
                commands: commands_tx,
            },
            ticks_rx,
            handle,
        )
    }

    /// Move to `epoch` (never backwards) and restart the deadline.
    pub fn set_epoch(&self, epoch: u64) -> bool {
        self.send(EpochCommand::SetEpoch(epoch))
    }

    /// Record CC progress and restart the deadline.
    pub fn set_height(&self, height: u64) -> bool {
        self.send(EpochCommand::SetHeight(height))
    }

    fn send(&self, command: EpochCommand) -> bool {
        match self.commands.try_send(command) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "epoch timer command dropped");
                false
            }
        }
    }
}

struct EpochTimer {
    period: Duration,
    epoch: u64,
    height: u64,
}

impl EpochTimer {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<EpochCommand>,
        ticks: mpsc::Sender<EpochTick>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut deadline = Instant::now() + self.period;
        loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    self.epoch += 1;
                    deadline = Instant::now() + self.period;
                    debug!(epoch = self.epoch, height = self.height, "epoch timeout");
                    let tick = EpochTick { epoch: self.epoch, height: self.height };
                    if ticks.try_send(tick).is_err() {
                        warn!(epoch = self.epoch, "epoch tick dropped");
                    }
                }
                command = commands.recv() => {
                    match command {
                        Some(EpochCommand::SetEpoch(epoch)) => self.epoch = self.epoch.max(epoch),
                        Some(EpochCommand::SetHeight(height)) => self.height = height,
                        None => break,
                    }
                    deadline = Instant::now() + self.period;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(epoch = self.epoch, "epoch timer stopped");
    }
}
