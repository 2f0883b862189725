//! Callback contract between an upstream source and its consumer

use std::future::Future;

use bytes::Bytes;

use crate::error::Result;

use super::descriptor::StreamDescriptor;

/// Receives everything an upstream connection delivers
///
/// Deliveries alternate between audio blocks (`is_metadata == false`) and
/// metadata blocks. The descriptor is the same for every call on one
/// connection. An error ends the upstream connection.
pub trait SourceHandler: Send {
    fn on_chunk(
        &mut self,
        chunk: Bytes,
        is_metadata: bool,
        descriptor: &StreamDescriptor,
    ) -> impl Future<Output = Result<()>> + Send;
}
