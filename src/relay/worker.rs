//! Replica transport worker
//!
//! A worker owns one connection attempt to one destination. It dials, then
//! moves encoded PDUs from its queue onto the socket until the socket fails,
//! the queue closes or shutdown is signalled.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio::sync::{mpsc, watch};

use crate::error::{Error, ProtocolError, RelayError, Result};
use crate::protocol::constants::MAX_DATAGRAM_SIZE;
use crate::protocol::frame_for_tcp;
use crate::stats::ConnectionStats;

use super::config::{RelayConfig, ReplicaAddr, Transport};

/// Why a connection ended without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The broadcaster signalled shutdown
    Shutdown,
    /// The replica queue was closed
    QueueClosed,
}

/// Connected socket
enum Link {
    Tcp(TcpStream),
    Udp(UdpSocket),
}

impl Link {
    async fn dial(target: &ReplicaAddr, connect_timeout: Duration, tcp_nodelay: bool) -> Result<Self> {
        match target.transport {
            Transport::Tcp => {
                let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&target.addr))
                    .await
                    .map_err(|_| {
                        std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out")
                    })??;
                if tcp_nodelay {
                    stream.set_nodelay(true)?;
                }
                Ok(Link::Tcp(stream))
            }
            Transport::Udp => {
                let peer = resolve(&target.addr).await?;
                let local: SocketAddr = if peer.is_ipv4() {
                    (Ipv4Addr::UNSPECIFIED, 0).into()
                } else {
                    (Ipv6Addr::UNSPECIFIED, 0).into()
                };
                let socket = UdpSocket::bind(local).await?;
                socket.connect(peer).await?;
                Ok(Link::Udp(socket))
            }
        }
    }

    /// Send one encoded PDU; returns the bytes put on the wire
    async fn send(&mut self, pdu: &Bytes) -> Result<usize> {
        match self {
            Link::Tcp(stream) => {
                let framed = frame_for_tcp(pdu)?;
                stream.write_all(&framed).await?;
                Ok(framed.len())
            }
            Link::Udp(socket) => {
                if pdu.len() > MAX_DATAGRAM_SIZE {
                    return Err(ProtocolError::PduTooLarge(pdu.len()).into());
                }
                let sent = socket.send(pdu).await?;
                if sent != pdu.len() {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "datagram truncated",
                    )
                    .into());
                }
                Ok(sent)
            }
        }
    }
}

async fn resolve(addr: &str) -> Result<SocketAddr> {
    lookup_host(addr)
        .await?
        .next()
        .ok_or_else(|| RelayError::Unresolved(addr.to_string()).into())
}

/// Worker for one replica slot
pub struct ReplicaWorker {
    slot: u8,
    target: ReplicaAddr,
    queue: mpsc::Receiver<Bytes>,
    shutdown: watch::Receiver<bool>,
    connect_timeout: Duration,
    tcp_nodelay: bool,
}

impl ReplicaWorker {
    pub fn new(
        slot: u8,
        target: ReplicaAddr,
        queue: mpsc::Receiver<Bytes>,
        shutdown: watch::Receiver<bool>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            slot,
            target,
            queue,
            shutdown,
            connect_timeout: config.connect_timeout,
            tcp_nodelay: config.tcp_nodelay,
        }
    }

    pub fn slot(&self) -> u8 {
        self.slot
    }

    pub fn target(&self) -> &ReplicaAddr {
        &self.target
    }

    /// Whether the broadcaster has signalled shutdown
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Wait until shutdown is signalled
    pub async fn shutdown_signalled(&mut self) {
        // A dropped sender means the broadcaster is gone
        while !*self.shutdown.borrow_and_update() {
            if self.shutdown.changed().await.is_err() {
                return;
            }
        }
    }

    /// Run one connection to completion
    ///
    /// A dial failure returns before any queued PDU is consumed.
    pub async fn run_connection(&mut self) -> Result<Exit> {
        let mut link = Link::dial(&self.target, self.connect_timeout, self.tcp_nodelay).await?;
        let mut stats = ConnectionStats::new();

        tracing::info!(
            replica = self.slot,
            target = %self.target,
            "Replica connection opened"
        );

        let result = self.pump(&mut link, &mut stats).await;

        tracing::info!(
            replica = self.slot,
            target = %self.target,
            pdus = stats.pdus_sent,
            bytes = stats.bytes_sent,
            skipped = stats.skipped,
            duration_secs = stats.duration().as_secs(),
            "Replica connection closed"
        );

        result
    }

    async fn pump(&mut self, link: &mut Link, stats: &mut ConnectionStats) -> Result<Exit> {
        loop {
            if self.is_shutdown() {
                return Ok(Exit::Shutdown);
            }

            let pdu = tokio::select! {
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        return Ok(Exit::Shutdown);
                    }
                    continue;
                }
                pdu = self.queue.recv() => pdu,
            };

            let Some(pdu) = pdu else {
                return Ok(Exit::QueueClosed);
            };

            if self.is_shutdown() {
                return Ok(Exit::Shutdown);
            }

            match link.send(&pdu).await {
                Ok(sent) => stats.record_sent(sent),
                Err(Error::Protocol(ProtocolError::PduTooLarge(len))) => {
                    stats.skipped += 1;
                    tracing::warn!(
                        replica = self.slot,
                        len = len,
                        transport = %self.target.transport,
                        "PDU too large for transport, skipped"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
