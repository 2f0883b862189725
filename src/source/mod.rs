//! Upstream live audio source
//!
//! The relay only depends on [`SourceHandler`]; [`IcecastClient`] is a minimal
//! ICY client that drives any handler from a live server.

pub mod descriptor;
pub mod handler;
pub mod icecast;

pub use descriptor::{canonical_header_name, StreamDescriptor, RELAYED_HEADERS};
pub use handler::SourceHandler;
pub use icecast::{IcecastClient, SourceConfig};
