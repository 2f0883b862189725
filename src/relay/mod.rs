//! Relay engine: sequencer, fan-out and replica workers
//!
//! # Architecture
//!
//! ```text
//!   [IngestSession] ──► intake (cap 10) ──► [Broadcaster]
//!                                              │  assign sequence
//!                    ┌─────────────────────────┼──────────────────────┐
//!                    ▼                         ▼                      ▼
//!              queue (cap 100)           queue (cap 100)        queue (cap 100)
//!                    │                         │                      │
//!              [Supervisor]              [Supervisor]           [Supervisor]
//!               TCP worker                UDP worker             TCP worker
//! ```
//!
//! Replica queues are filled with `try_send`, so a stuck destination only
//! loses its own PDUs. Shutdown is a `watch` flag raised by the broadcaster
//! when the intake closes or stalls.

pub mod broadcaster;
pub mod config;
pub mod supervisor;
pub mod worker;

pub use broadcaster::{Broadcaster, Intake, Sequencer};
pub use config::{RelayConfig, ReplicaAddr, Transport, MAX_REPLICAS};
pub use supervisor::Supervisor;
pub use worker::{Exit, ReplicaWorker};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{RelayError, Result};
use crate::stats::BroadcastStats;

/// Running relay tasks
pub struct RelayHandle {
    broadcaster: JoinHandle<Result<BroadcastStats>>,
    supervisors: Vec<JoinHandle<u64>>,
    shutdown: watch::Receiver<bool>,
}

impl RelayHandle {
    /// Wait for the broadcaster and every supervisor to finish
    ///
    /// Returns the broadcaster's outcome.
    pub async fn join(self) -> Result<BroadcastStats> {
        let outcome = self
            .broadcaster
            .await
            .map_err(|e| RelayError::TaskFailed(e.to_string()))?;

        for supervisor in self.supervisors {
            if let Err(e) = supervisor.await {
                tracing::warn!(error = %e, "Replica supervisor failed");
            }
        }

        outcome
    }

    /// Resolve once the broadcaster has stopped the replicas
    ///
    /// Fires on intake close and on an ingest stall, so callers blocked on
    /// the source can notice the relay is gone.
    pub async fn stopped(&self) {
        let mut shutdown = self.shutdown.clone();
        // An Err means the broadcaster dropped the sender, which is also a stop
        let _ = shutdown.wait_for(|stopped| *stopped).await;
    }

    /// Abort every relay task
    pub fn abort(&self) {
        self.broadcaster.abort();
        for supervisor in &self.supervisors {
            supervisor.abort();
        }
    }
}

/// Relay entry point
pub struct Relay;

impl Relay {
    /// Start the broadcaster and one supervised worker per replica
    ///
    /// PDUs sent into the returned intake are sequenced and fanned out.
    /// Dropping the intake shuts the relay down.
    pub fn start(config: RelayConfig) -> Result<(Intake, RelayHandle)> {
        config.validate()?;

        let (intake, intake_rx) = mpsc::channel(config.intake_capacity);
        let (shutdown, shutdown_rx) = watch::channel(false);

        let mut queues = Vec::with_capacity(config.replicas.len());
        let mut supervisors = Vec::with_capacity(config.replicas.len());

        for (slot, target) in config.replicas.iter().enumerate() {
            let (tx, rx) = mpsc::channel(config.replica_queue_capacity);
            queues.push(tx);

            tracing::info!(replica = slot, target = %target, "Starting replica");

            let worker = ReplicaWorker::new(slot as u8, target.clone(), rx, shutdown_rx.clone(), &config);
            supervisors.push(Supervisor::new(worker, config.restart_delay).spawn());
        }

        let stopped = shutdown.subscribe();
        let broadcaster = Broadcaster::new(queues, shutdown, config.stall_timeout);
        let broadcaster = tokio::spawn(broadcaster.run(intake_rx));

        Ok((
            intake,
            RelayHandle {
                broadcaster,
                supervisors,
                shutdown: stopped,
            },
        ))
    }
}
