//! Error types
//!
//! Every fallible operation in the crate returns [`Result`]. Each subsystem has
//! its own error enum that converts into the top-level [`Error`].

use std::fmt;
use std::time::Duration;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// I/O failure on a socket
    Io(std::io::Error),
    /// Frame synchronizer failure (stream corruption)
    Sync(SyncError),
    /// PDU encoding/decoding failure
    Protocol(ProtocolError),
    /// Relay engine failure
    Relay(RelayError),
    /// Upstream source failure
    Source(SourceError),
    /// Invalid configuration
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Sync(e) => write!(f, "Sync error: {}", e),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Relay(e) => write!(f, "Relay error: {}", e),
            Error::Source(e) => write!(f, "Source error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Sync(e) => Some(e),
            Error::Protocol(e) => Some(e),
            Error::Relay(e) => Some(e),
            Error::Source(e) => Some(e),
            Error::Config(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<SyncError> for Error {
    fn from(e: SyncError) -> Self {
        Error::Sync(e)
    }
}

impl From<ProtocolError> for Error {
    fn from(e: ProtocolError) -> Self {
        Error::Protocol(e)
    }
}

impl From<RelayError> for Error {
    fn from(e: RelayError) -> Self {
        Error::Relay(e)
    }
}

impl From<SourceError> for Error {
    fn from(e: SourceError) -> Self {
        Error::Source(e)
    }
}

/// Frame synchronizer errors
///
/// All of these are fatal to the synchronizer instance that raised them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// A frame grew past the size limit without completing
    FrameTooLarge { limit: usize },
    /// MPEG header selects a free, reserved or invalid bitrate/sample rate
    UnsupportedEncoding {
        version_id: u8,
        layer_desc: u8,
        bitrate_index: u8,
        sample_rate_index: u8,
    },
    /// MPEG sync bits missing where a frame header must start
    SyncLost { position: usize, byte: u8 },
    /// The synchronizer already failed and accepts no more input
    Halted,
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::FrameTooLarge { limit } => {
                write!(f, "Frame exceeded {} bytes without completing", limit)
            }
            SyncError::UnsupportedEncoding {
                version_id,
                layer_desc,
                bitrate_index,
                sample_rate_index,
            } => write!(
                f,
                "Unsupported MPEG encoding: version={} layer={} bitrate_index={} sample_rate_index={}",
                version_id, layer_desc, bitrate_index, sample_rate_index
            ),
            SyncError::SyncLost { position, byte } => {
                write!(f, "Lost frame sync at header byte {}: 0x{:02X}", position, byte)
            }
            SyncError::Halted => write!(f, "Synchronizer halted after a previous error"),
        }
    }
}

impl std::error::Error for SyncError {}

/// PDU wire format errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes than the fixed header or the payload requires
    Truncated { needed: usize, actual: usize },
    /// Unknown PDU type code
    UnknownPduType(u8),
    /// Unknown audio type code in an ANNOUNCE payload
    UnknownAudioType(u8),
    /// Text payload is not valid UTF-8
    InvalidUtf8,
    /// Header line without the name/value separator
    MalformedHeader(String),
    /// Encoded PDU does not fit the 16-bit TCP length prefix
    PduTooLarge(usize),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Truncated { needed, actual } => {
                write!(f, "Truncated PDU: need {} bytes, have {}", needed, actual)
            }
            ProtocolError::UnknownPduType(t) => write!(f, "Unknown PDU type: {}", t),
            ProtocolError::UnknownAudioType(t) => write!(f, "Unknown audio type: {}", t),
            ProtocolError::InvalidUtf8 => write!(f, "Payload is not valid UTF-8"),
            ProtocolError::MalformedHeader(line) => write!(f, "Malformed header line: {:?}", line),
            ProtocolError::PduTooLarge(len) => {
                write!(f, "PDU of {} bytes exceeds the 65535 byte frame limit", len)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Relay engine errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// No PDU arrived on the intake within the stall timeout
    IngestStalled(Duration),
    /// The broadcaster is gone; the intake no longer accepts PDUs
    IntakeClosed,
    /// Destination string could not be parsed
    InvalidReplicaAddr(String),
    /// More replicas than the 1-byte replica index can address
    TooManyReplicas(usize),
    /// Destination host name did not resolve
    Unresolved(String),
    /// A relay task panicked or was cancelled
    TaskFailed(String),
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayError::IngestStalled(timeout) => {
                write!(f, "Ingest stalled: no PDU for {}s", timeout.as_secs())
            }
            RelayError::IntakeClosed => write!(f, "Relay intake closed"),
            RelayError::InvalidReplicaAddr(addr) => write!(f, "Invalid replica address: {}", addr),
            RelayError::TooManyReplicas(n) => {
                write!(f, "Too many replicas: {} (maximum 256)", n)
            }
            RelayError::Unresolved(addr) => write!(f, "Address did not resolve: {}", addr),
            RelayError::TaskFailed(msg) => write!(f, "Relay task failed: {}", msg),
        }
    }
}

impl std::error::Error for RelayError {}

/// Upstream source errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Server answered with something other than 200
    BadStatus(String),
    /// Response header could not be parsed
    MalformedHeader(String),
    /// Stream ended before a declared block was complete
    ShortRead { expected: usize, actual: usize },
    /// Connection attempt timed out
    ConnectTimeout,
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::BadStatus(line) => write!(f, "Bad status: {}", line),
            SourceError::MalformedHeader(line) => write!(f, "Malformed header: {}", line),
            SourceError::ShortRead { expected, actual } => {
                write!(f, "Short read: expected {} bytes, got {}", expected, actual)
            }
            SourceError::ConnectTimeout => write!(f, "Connection timed out"),
        }
    }
}

impl std::error::Error for SourceError {}
