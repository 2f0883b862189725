//! Wire protocol constants

/// PDU type code: audio frame
pub const PDU_DATA: u8 = 0;

/// PDU type code: stream metadata text
pub const PDU_METADATA: u8 = 1;

/// PDU type code: codec and mountpoint announcement
pub const PDU_ANNOUNCE: u8 = 2;

/// PDU type code: descriptive header lines
pub const PDU_HEADERS: u8 = 3;

/// Session identifier length in bytes
pub const SESSION_ID_SIZE: usize = 16;

/// Fixed header: type (1) + replica (1) + session (16) + sequence (8)
pub const PDU_HEADER_SIZE: usize = 2 + SESSION_ID_SIZE + 8;

/// Length prefix preceding each PDU on TCP connections
pub const TCP_LENGTH_PREFIX_SIZE: usize = 2;

/// Largest PDU the 16-bit length prefix can carry
pub const MAX_PDU_SIZE: usize = u16::MAX as usize;

/// Largest UDP payload over IPv4 (65535 minus IP and UDP headers)
pub const MAX_DATAGRAM_SIZE: usize = MAX_PDU_SIZE - 20 - 8;

/// Separator between a header name and its value
pub const HEADER_NAME_SEPARATOR: char = '\r';

/// Separator between header lines
pub const HEADER_LINE_SEPARATOR: char = '\n';
