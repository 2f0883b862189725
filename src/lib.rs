//! Live ICY audio relay
//!
//! Ingests one live audio stream, recovers frames from it, and fans them out
//! as sequenced PDUs to any number of TCP and UDP replicas. A slow or dead
//! replica never stalls ingest.
//!
//! # Example
//! ```no_run
//! use icecast_relay::relay::{Relay, RelayConfig};
//! use icecast_relay::session::IngestSession;
//! use icecast_relay::source::{IcecastClient, SourceConfig};
//!
//! # async fn example() -> icecast_relay::error::Result<()> {
//! let config = RelayConfig::default().replica("127.0.0.1:9000".parse()?);
//! let (intake, relay) = Relay::start(config)?;
//!
//! let mut session = IngestSession::new("live", intake);
//! let client = IcecastClient::new(SourceConfig::new("radio.example:8000", "live"));
//! let _ = client.run(&mut session).await;
//!
//! drop(session);
//! relay.join().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod media;
pub mod protocol;
pub mod relay;
pub mod session;
pub mod source;
pub mod stats;

pub use error::{Error, Result};
pub use protocol::{Pdu, PduBody, SessionId};
pub use relay::{Relay, RelayConfig, RelayHandle, ReplicaAddr};
pub use session::IngestSession;
pub use source::{IcecastClient, SourceConfig, SourceHandler, StreamDescriptor};
