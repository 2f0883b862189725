//! Per-connection ingest context
//!
//! Captured from the stream descriptor on the first delivery of an upstream
//! connection and kept unchanged until that connection ends.

use crate::media::{AudioFormat, FrameSync};
use crate::protocol::{AudioType, AudioTypeMatch, HeaderSet, SessionId};
use crate::source::StreamDescriptor;

/// State derived once per upstream connection
#[derive(Debug)]
pub struct SessionContext {
    /// Broadcast epoch identifier
    pub session_id: SessionId,

    /// Format chosen from the content type
    pub format: AudioFormat,

    /// Synchronizer owned by this connection
    pub sync: FrameSync,

    /// Announced audio type
    pub audio_type: AudioTypeMatch,

    /// Descriptive headers to relay
    pub headers: HeaderSet,
}

impl SessionContext {
    /// Derive the context from the first delivery's descriptor
    pub fn from_descriptor(descriptor: &StreamDescriptor) -> Self {
        let format = AudioFormat::from_content_type(&descriptor.content_type);
        let audio_type = AudioTypeMatch::classify(
            format.codec_name(),
            descriptor.channels,
            descriptor.sample_rate,
            descriptor.bit_rate,
        );

        Self {
            session_id: SessionId::generate(),
            format,
            sync: FrameSync::new(format),
            audio_type,
            headers: descriptor.relayed_headers(),
        }
    }

    /// Audio type code to announce
    pub fn announced_type(&self) -> AudioType {
        self.audio_type.audio_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_aac_stream() {
        let descriptor = StreamDescriptor::from_headers([
            ("Content-Type", "audio/aacp"),
            ("Ice-Audio-Info", "ice-samplerate=44100;ice-bitrate=48;ice-channels=2"),
            ("Icy-Name", "Radio One"),
        ])
        .unwrap();

        let ctx = SessionContext::from_descriptor(&descriptor);
        assert_eq!(ctx.format, AudioFormat::Adts);
        assert_eq!(ctx.sync.format(), AudioFormat::Adts);
        assert_eq!(ctx.announced_type(), AudioType::Aac2c44100x48000);
        assert!(!ctx.audio_type.is_fallback());
        assert_eq!(ctx.headers.to_text(), "Icy-Name\rRadio One\nContent-Type\raudio/aacp");
    }

    #[test]
    fn test_unknown_content_type_falls_back() {
        let descriptor = StreamDescriptor::from_headers([
            ("Content-Type", "audio/ogg"),
            ("Ice-Audio-Info", "ice-samplerate=48000;ice-bitrate=96;ice-channels=2"),
        ])
        .unwrap();

        let ctx = SessionContext::from_descriptor(&descriptor);
        assert_eq!(ctx.format, AudioFormat::Raw);
        assert_eq!(
            ctx.audio_type,
            AudioTypeMatch::Fallback("UNK_2C_48000_96000".to_string())
        );
        assert_eq!(ctx.announced_type().code(), 1);
    }

    #[test]
    fn test_session_ids_differ_per_connection() {
        let descriptor = StreamDescriptor::default();
        let a = SessionContext::from_descriptor(&descriptor);
        let b = SessionContext::from_descriptor(&descriptor);
        assert_ne!(a.session_id, b.session_id);
    }
}
