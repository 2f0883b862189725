//! Relay PDU model and wire encoding
//!
//! Every PDU starts with a fixed 26 byte header, big-endian:
//! ```text
//! +------+---------+------------------+--------------+---------+
//! | Type | Replica | Session ID       | Sequence     | Payload |
//! | (1)  | (1)     | (16)             | (8)          | (N)     |
//! +------+---------+------------------+--------------+---------+
//! ```
//!
//! Payload by type:
//! - DATA: raw audio frame
//! - METADATA: metadata text bytes
//! - ANNOUNCE: audio type code (1 byte) + mountpoint name
//! - HEADERS: `Name\rValue` lines joined by `\n`
//!
//! There is no checksum and no compression.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

use super::audio_type::AudioType;
use super::constants::*;

/// Identifies one upstream connection (a broadcast epoch)
///
/// RFC 4122 version 4 UUID bytes, regenerated whenever the source reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SessionId([u8; SESSION_ID_SIZE]);

impl SessionId {
    /// Generate a new random session ID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().into_bytes())
    }

    pub fn from_bytes(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_bytes(self.0).hyphenated())
    }
}

/// PDU type code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    Data = 0,
    Metadata = 1,
    Announce = 2,
    Headers = 3,
}

impl PduType {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            PDU_DATA => Some(PduType::Data),
            PDU_METADATA => Some(PduType::Metadata),
            PDU_ANNOUNCE => Some(PduType::Announce),
            PDU_HEADERS => Some(PduType::Headers),
            _ => None,
        }
    }
}

/// Ordered descriptive header lines (name, value)
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderSet(Vec<(String, String)>);

impl HeaderSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Append a line
    ///
    /// Separators that would split the line on the wire become spaces: the
    /// name loses `\r` and `\n`, the value loses `\n`.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push(sanitize(name.into(), value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Wire text: `Name\rValue` lines joined by `\n`
    pub fn to_text(&self) -> String {
        self.0
            .iter()
            .map(|(n, v)| format!("{}{}{}", n, HEADER_NAME_SEPARATOR, v))
            .collect::<Vec<_>>()
            .join(&*HEADER_LINE_SEPARATOR.to_string())
    }

    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        if text.is_empty() {
            return Ok(Self::new());
        }

        text.split(HEADER_LINE_SEPARATOR)
            .map(|line| {
                line.split_once(HEADER_NAME_SEPARATOR)
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .ok_or_else(|| ProtocolError::MalformedHeader(line.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderSet {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(n, v)| sanitize(n.into(), v.into()))
                .collect(),
        )
    }
}

fn sanitize(name: String, value: String) -> (String, String) {
    let name_separators: &[char] = &[HEADER_NAME_SEPARATOR, HEADER_LINE_SEPARATOR];
    let name = if name.contains(name_separators) {
        name.replace(name_separators, " ")
    } else {
        name
    };
    let value = if value.contains(HEADER_LINE_SEPARATOR) {
        value.replace(HEADER_LINE_SEPARATOR, " ")
    } else {
        value
    };
    (name, value)
}

/// Type-specific PDU payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PduBody {
    /// One complete audio frame
    Data(Bytes),
    /// Metadata block as received from the source
    Metadata(Bytes),
    /// Codec announcement for the mountpoint
    Announce {
        audio_type: AudioType,
        mountpoint: String,
    },
    /// Descriptive stream headers
    Headers(HeaderSet),
}

impl PduBody {
    pub fn pdu_type(&self) -> PduType {
        match self {
            PduBody::Data(_) => PduType::Data,
            PduBody::Metadata(_) => PduType::Metadata,
            PduBody::Announce { .. } => PduType::Announce,
            PduBody::Headers(_) => PduType::Headers,
        }
    }
}

/// One relayed unit
///
/// `sequence` and `replica` are stamped by the broadcaster; PDUs built by the
/// ingest side carry zero in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub session_id: SessionId,
    pub sequence: u64,
    pub replica: u8,
    pub body: PduBody,
}

impl Pdu {
    pub fn new(session_id: SessionId, body: PduBody) -> Self {
        Self {
            session_id,
            sequence: 0,
            replica: 0,
            body,
        }
    }

    /// Create a DATA PDU
    pub fn data(session_id: SessionId, frame: Bytes) -> Self {
        Self::new(session_id, PduBody::Data(frame))
    }

    /// Create a METADATA PDU
    pub fn metadata(session_id: SessionId, metadata: Bytes) -> Self {
        Self::new(session_id, PduBody::Metadata(metadata))
    }

    /// Create an ANNOUNCE PDU
    pub fn announce(session_id: SessionId, audio_type: AudioType, mountpoint: impl Into<String>) -> Self {
        Self::new(
            session_id,
            PduBody::Announce {
                audio_type,
                mountpoint: mountpoint.into(),
            },
        )
    }

    /// Create a HEADERS PDU
    pub fn headers(session_id: SessionId, headers: HeaderSet) -> Self {
        Self::new(session_id, PduBody::Headers(headers))
    }

    pub fn pdu_type(&self) -> PduType {
        self.body.pdu_type()
    }

    /// Encode to wire format
    pub fn encode(&self) -> Bytes {
        let headers_text = match &self.body {
            PduBody::Headers(headers) => headers.to_text(),
            _ => String::new(),
        };
        let payload_len = match &self.body {
            PduBody::Data(data) => data.len(),
            PduBody::Metadata(text) => text.len(),
            PduBody::Announce { mountpoint, .. } => 1 + mountpoint.len(),
            PduBody::Headers(_) => headers_text.len(),
        };

        let mut buf = BytesMut::with_capacity(PDU_HEADER_SIZE + payload_len);
        buf.put_u8(self.pdu_type() as u8);
        buf.put_u8(self.replica);
        buf.put_slice(self.session_id.as_bytes());
        buf.put_u64(self.sequence);

        match &self.body {
            PduBody::Data(data) => buf.put_slice(data),
            PduBody::Metadata(text) => buf.put_slice(text),
            PduBody::Announce {
                audio_type,
                mountpoint,
            } => {
                buf.put_u8(audio_type.code());
                buf.put_slice(mountpoint.as_bytes());
            }
            PduBody::Headers(_) => buf.put_slice(headers_text.as_bytes()),
        }

        buf.freeze()
    }

    /// Decode from wire format
    pub fn decode(mut data: Bytes) -> Result<Self, ProtocolError> {
        if data.len() < PDU_HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                needed: PDU_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let type_code = data.get_u8();
        let pdu_type =
            PduType::from_byte(type_code).ok_or(ProtocolError::UnknownPduType(type_code))?;
        let replica = data.get_u8();
        let mut session = [0u8; SESSION_ID_SIZE];
        data.copy_to_slice(&mut session);
        let sequence = data.get_u64();

        let body = match pdu_type {
            PduType::Data => PduBody::Data(data),
            PduType::Metadata => PduBody::Metadata(data),
            PduType::Announce => {
                if !data.has_remaining() {
                    return Err(ProtocolError::Truncated {
                        needed: PDU_HEADER_SIZE + 1,
                        actual: PDU_HEADER_SIZE,
                    });
                }
                let audio_type = AudioType::from_code(data.get_u8())?;
                let mountpoint = utf8(data)?;
                PduBody::Announce {
                    audio_type,
                    mountpoint,
                }
            }
            PduType::Headers => PduBody::Headers(HeaderSet::parse(&utf8(data)?)?),
        };

        Ok(Self {
            session_id: SessionId::from_bytes(session),
            sequence,
            replica,
            body,
        })
    }
}

/// Prefix an encoded PDU with its 2-byte big-endian length for TCP
pub fn frame_for_tcp(pdu: &[u8]) -> Result<Bytes, ProtocolError> {
    if pdu.len() > MAX_PDU_SIZE {
        return Err(ProtocolError::PduTooLarge(pdu.len()));
    }

    let mut buf = BytesMut::with_capacity(TCP_LENGTH_PREFIX_SIZE + pdu.len());
    buf.put_u16(pdu.len() as u16);
    buf.put_slice(pdu);
    Ok(buf.freeze())
}

fn utf8(data: Bytes) -> Result<String, ProtocolError> {
    String::from_utf8(data.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}
