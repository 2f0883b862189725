//! Statistics for the ingest session, the broadcaster and replica connections
//!
//! Each counter set is owned by the task that updates it and handed out as a
//! snapshot when that task finishes.

use std::time::{Duration, Instant};

/// Ingest session statistics
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Session start time
    pub started_at: Instant,
    /// Audio bytes received from the source
    pub bytes_received: u64,
    /// Audio frames produced by the synchronizer
    pub frames: u64,
    /// Metadata blocks received
    pub metadata_blocks: u64,
    /// PDUs handed to the intake
    pub pdus_sent: u64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            bytes_received: 0,
            frames: 0,
            metadata_blocks: 0,
            pdus_sent: 0,
        }
    }

    /// Get duration since the session started
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Calculate the source bitrate in bits per second
    pub fn bitrate(&self) -> u64 {
        let secs = self.duration().as_secs();
        if secs > 0 {
            (self.bytes_received * 8) / secs
        } else {
            0
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-replica fan-out counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicaCounters {
    /// PDUs placed on the replica queue
    pub enqueued: u64,
    /// PDUs dropped because the replica queue was full
    pub dropped: u64,
}

/// Broadcaster statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// PDUs that received a sequence number
    pub sequenced: u64,
    /// Counters indexed by replica slot
    pub replicas: Vec<ReplicaCounters>,
}

impl BroadcastStats {
    pub fn new(replicas: usize) -> Self {
        Self {
            sequenced: 0,
            replicas: vec![ReplicaCounters::default(); replicas],
        }
    }

    /// Total drops across all replicas
    pub fn total_dropped(&self) -> u64 {
        self.replicas.iter().map(|r| r.dropped).sum()
    }

    pub(crate) fn record_enqueued(&mut self, replica: usize) {
        if let Some(r) = self.replicas.get_mut(replica) {
            r.enqueued += 1;
        }
    }

    pub(crate) fn record_dropped(&mut self, replica: usize) {
        if let Some(r) = self.replicas.get_mut(replica) {
            r.dropped += 1;
        }
    }
}

/// Statistics for one replica connection attempt
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    /// Connection start time
    pub started_at: Instant,
    /// PDUs written to the socket
    pub pdus_sent: u64,
    /// Bytes written to the socket, including framing
    pub bytes_sent: u64,
    /// PDUs skipped because they could not be framed
    pub skipped: u64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            pdus_sent: 0,
            bytes_sent: 0,
            skipped: 0,
        }
    }

    /// Get duration since the connection opened
    pub fn duration(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn record_sent(&mut self, bytes: usize) {
        self.pdus_sent += 1;
        self.bytes_sent += bytes as u64;
    }
}

impl Default for ConnectionStats {
    fn default() -> Self {
        Self::new()
    }
}
