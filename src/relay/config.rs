//! Relay configuration

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, RelayError, Result};

/// Largest replica count the 1-byte replica index can address
pub const MAX_REPLICAS: usize = u8::MAX as usize + 1;

/// Transport used to reach a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Length-prefixed PDUs over one TCP connection
    Tcp,
    /// One PDU per datagram
    Udp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => write!(f, "tcp"),
            Transport::Udp => write!(f, "udp"),
        }
    }
}

/// One downstream destination
///
/// `host:port` selects TCP; `host@port` selects UDP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicaAddr {
    pub transport: Transport,
    /// Dialable `host:port`
    pub addr: String,
}

impl ReplicaAddr {
    pub fn tcp(addr: impl Into<String>) -> Self {
        Self {
            transport: Transport::Tcp,
            addr: addr.into(),
        }
    }

    pub fn udp(addr: impl Into<String>) -> Self {
        Self {
            transport: Transport::Udp,
            addr: addr.into(),
        }
    }
}

impl FromStr for ReplicaAddr {
    type Err = RelayError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (transport, addr) = if s.contains('@') {
            (Transport::Udp, s.replacen('@', ":", 1))
        } else {
            (Transport::Tcp, s.to_string())
        };

        let valid = match addr.rsplit_once(':') {
            Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
            None => false,
        };
        if !valid {
            return Err(RelayError::InvalidReplicaAddr(s.to_string()));
        }

        Ok(Self { transport, addr })
    }
}

impl fmt::Display for ReplicaAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.transport, self.addr)
    }
}

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Destinations, in replica slot order
    pub replicas: Vec<ReplicaAddr>,

    /// Capacity of the ingest-to-broadcaster queue
    pub intake_capacity: usize,

    /// Capacity of each replica's outbound queue
    pub replica_queue_capacity: usize,

    /// Broadcaster gives up when no PDU arrives within this time
    pub stall_timeout: Duration,

    /// Delay before a failed replica connection is retried
    pub restart_delay: Duration,

    /// Time allowed for a TCP dial
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY on replica connections
    pub tcp_nodelay: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            replicas: Vec::new(),
            intake_capacity: 10,
            replica_queue_capacity: 100,
            stall_timeout: Duration::from_secs(30),
            restart_delay: Duration::from_secs(3),
            connect_timeout: Duration::from_secs(10),
            tcp_nodelay: true,
        }
    }
}

impl RelayConfig {
    /// Create a config for the given destinations
    pub fn with_replicas(replicas: Vec<ReplicaAddr>) -> Self {
        Self {
            replicas,
            ..Default::default()
        }
    }

    /// Add a destination
    pub fn replica(mut self, replica: ReplicaAddr) -> Self {
        self.replicas.push(replica);
        self
    }

    /// Set intake queue capacity
    pub fn intake_capacity(mut self, capacity: usize) -> Self {
        self.intake_capacity = capacity;
        self
    }

    /// Set per-replica queue capacity
    pub fn replica_queue_capacity(mut self, capacity: usize) -> Self {
        self.replica_queue_capacity = capacity;
        self
    }

    /// Set ingest stall timeout
    pub fn stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Set replica restart delay
    pub fn restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Set TCP connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Check the configuration before starting a relay
    pub fn validate(&self) -> Result<()> {
        if self.replicas.len() > MAX_REPLICAS {
            return Err(RelayError::TooManyReplicas(self.replicas.len()).into());
        }
        if self.intake_capacity == 0 {
            return Err(Error::Config("intake capacity must be non-zero".into()));
        }
        if self.replica_queue_capacity == 0 {
            return Err(Error::Config("replica queue capacity must be non-zero".into()));
        }
        Ok(())
    }
}
