//! Restart loop for replica workers
//!
//! Keeps one destination connected for as long as the relay runs: every time
//! a connection ends with an error it waits out the restart delay and dials
//! again. Shutdown and queue closure end the loop.

use std::time::Duration;

use tokio::task::JoinHandle;

use super::worker::{Exit, ReplicaWorker};

/// Supervises one replica worker
pub struct Supervisor {
    worker: ReplicaWorker,
    restart_delay: Duration,
    restarts: u64,
}

impl Supervisor {
    pub fn new(worker: ReplicaWorker, restart_delay: Duration) -> Self {
        Self {
            worker,
            restart_delay,
            restarts: 0,
        }
    }

    /// Spawn the restart loop as its own task
    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }

    /// Run until shutdown; returns the number of restarts
    pub async fn run(mut self) -> u64 {
        loop {
            if self.worker.is_shutdown() {
                break;
            }

            match self.worker.run_connection().await {
                Ok(Exit::Shutdown) => break,
                Ok(Exit::QueueClosed) => {
                    tracing::debug!(replica = self.worker.slot(), "Replica queue closed");
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        replica = self.worker.slot(),
                        target = %self.worker.target(),
                        error = %e,
                        retry_ms = self.restart_delay.as_millis() as u64,
                        "Replica connection failed"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.restart_delay) => {}
                _ = self.worker.shutdown_signalled() => break,
            }
            self.restarts += 1;
        }

        tracing::debug!(
            replica = self.worker.slot(),
            restarts = self.restarts,
            "Replica supervisor stopped"
        );
        self.restarts
    }
}
