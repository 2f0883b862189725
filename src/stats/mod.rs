//! Relay statistics

pub mod metrics;

pub use metrics::{BroadcastStats, ConnectionStats, ReplicaCounters, SessionStats};
