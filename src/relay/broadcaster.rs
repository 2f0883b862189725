//! Sequencer and fan-out broadcaster
//!
//! The broadcaster is the only place sequence numbers are assigned. Every PDU
//! taken from the intake gets the next number and is then offered to each
//! replica queue with `try_send`: a full queue loses that PDU for that replica
//! only, and ingest never waits on a replica.

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

use crate::error::{RelayError, Result};
use crate::protocol::Pdu;
use crate::stats::BroadcastStats;

/// Sending half of the ingest-to-broadcaster queue
pub type Intake = mpsc::Sender<Pdu>;

/// Global sequence counter
///
/// Starts at zero and only moves forward, one step per assigned PDU.
#[derive(Debug, Default)]
pub struct Sequencer {
    next: u64,
}

impl Sequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the next sequence number
    pub fn assign(&mut self) -> u64 {
        let sequence = self.next;
        self.next += 1;
        sequence
    }

    /// Number of sequence numbers handed out so far
    pub fn assigned(&self) -> u64 {
        self.next
    }
}

/// Fans sequenced PDUs out to the replica queues
pub struct Broadcaster {
    sequencer: Sequencer,
    replicas: Vec<mpsc::Sender<Bytes>>,
    shutdown: watch::Sender<bool>,
    stall_timeout: Duration,
    stats: BroadcastStats,
}

impl Broadcaster {
    /// Create a broadcaster over the given replica queues
    ///
    /// Queue index is the replica slot stamped into each PDU.
    pub fn new(
        replicas: Vec<mpsc::Sender<Bytes>>,
        shutdown: watch::Sender<bool>,
        stall_timeout: Duration,
    ) -> Self {
        let stats = BroadcastStats::new(replicas.len());
        Self {
            sequencer: Sequencer::new(),
            replicas,
            shutdown,
            stall_timeout,
            stats,
        }
    }

    /// Sequence one PDU and offer it to every replica
    ///
    /// Never blocks. Returns the assigned sequence number.
    pub fn dispatch(&mut self, mut pdu: Pdu) -> u64 {
        let sequence = self.sequencer.assign();
        self.stats.sequenced += 1;
        pdu.sequence = sequence;

        for (slot, queue) in self.replicas.iter().enumerate() {
            pdu.replica = slot as u8;

            match queue.try_send(pdu.encode()) {
                Ok(()) => self.stats.record_enqueued(slot),
                Err(TrySendError::Full(_)) => {
                    self.stats.record_dropped(slot);
                    tracing::debug!(replica = slot, sequence = sequence, "Replica queue full, PDU dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    self.stats.record_dropped(slot);
                    tracing::trace!(replica = slot, sequence = sequence, "Replica queue closed");
                }
            }
        }

        tracing::trace!(
            sequence = sequence,
            pdu_type = ?pdu.pdu_type(),
            "PDU dispatched"
        );

        sequence
    }

    /// Statistics so far
    pub fn stats(&self) -> &BroadcastStats {
        &self.stats
    }

    /// Drain the intake until it closes or stalls
    ///
    /// Either way every replica worker is told to stop before this returns.
    pub async fn run(mut self, mut intake: mpsc::Receiver<Pdu>) -> Result<BroadcastStats> {
        let outcome = loop {
            match tokio::time::timeout(self.stall_timeout, intake.recv()).await {
                Ok(Some(pdu)) => {
                    self.dispatch(pdu);
                }
                Ok(None) => {
                    tracing::info!(sequenced = self.stats.sequenced, "Intake closed");
                    break Ok(());
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = self.stall_timeout.as_secs(),
                        sequenced = self.stats.sequenced,
                        "Ingest stalled"
                    );
                    break Err(RelayError::IngestStalled(self.stall_timeout));
                }
            }
        };

        self.stop_replicas();
        outcome?;
        Ok(self.stats)
    }

    fn stop_replicas(&mut self) {
        self.shutdown.send_replace(true);
        self.replicas.clear();
        tracing::info!(
            dropped = self.stats.total_dropped(),
            "Replica workers signalled to stop"
        );
    }
}
