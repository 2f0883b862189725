//! Relay wire protocol
//!
//! PDUs travel from the ingest side through the broadcaster to every replica.
//! On TCP each PDU is preceded by a 2-byte length; on UDP each datagram holds
//! exactly one PDU.

pub mod audio_type;
pub mod constants;
pub mod pdu;

pub use audio_type::{audio_type_key, AudioType, AudioTypeMatch};
pub use pdu::{frame_for_tcp, HeaderSet, Pdu, PduBody, PduType, SessionId};
