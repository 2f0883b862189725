//! Ingest side of the relay
//!
//! Implements [`SourceHandler`](crate::source::SourceHandler) so any upstream
//! source can feed the relay intake.

pub mod context;
pub mod ingest;

pub use context::SessionContext;
pub use ingest::IngestSession;
