//! Audio type codes carried in ANNOUNCE PDUs
//!
//! Receivers only understand a fixed set of codec/channel/rate/bitrate
//! combinations. Each source is mapped onto one of them once per connection.

use std::fmt;

use crate::error::ProtocolError;

/// Known (codec, channels, sample rate, bit rate) combinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AudioType {
    Aac2c44100x48000 = 0,
    Mp32c44100x128000 = 1,
    Aac2c44100x192000 = 2,
    Aac2c44100x128000 = 3,
    Mp31c44100x48000 = 4,
    Aac2c44100x24000 = 5,
}

impl AudioType {
    /// Code announced for sources matching none of the known combinations
    pub const FALLBACK: AudioType = AudioType::Mp32c44100x128000;

    pub const ALL: [AudioType; 6] = [
        AudioType::Aac2c44100x48000,
        AudioType::Mp32c44100x128000,
        AudioType::Aac2c44100x192000,
        AudioType::Aac2c44100x128000,
        AudioType::Mp31c44100x48000,
        AudioType::Aac2c44100x24000,
    ];

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn from_code(code: u8) -> Result<Self, ProtocolError> {
        Self::ALL
            .get(code as usize)
            .copied()
            .ok_or(ProtocolError::UnknownAudioType(code))
    }

    /// Canonical key, e.g. `AAC_2C_44100_48000`
    pub fn key(&self) -> &'static str {
        match self {
            AudioType::Aac2c44100x48000 => "AAC_2C_44100_48000",
            AudioType::Mp32c44100x128000 => "MP3_2C_44100_128000",
            AudioType::Aac2c44100x192000 => "AAC_2C_44100_192000",
            AudioType::Aac2c44100x128000 => "AAC_2C_44100_128000",
            AudioType::Mp31c44100x48000 => "MP3_1C_44100_48000",
            AudioType::Aac2c44100x24000 => "AAC_2C_44100_24000",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.key() == key)
    }
}

impl fmt::Display for AudioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Build the lookup key for a source
///
/// `bit_rate_kbps` is the kbit/s figure advertised by the server.
pub fn audio_type_key(codec: &str, channels: u32, sample_rate: u32, bit_rate_kbps: u32) -> String {
    format!(
        "{}_{}C_{}_{}000",
        codec, channels, sample_rate, bit_rate_kbps
    )
}

/// Outcome of mapping a source onto a known audio type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioTypeMatch {
    Known(AudioType),
    /// No known combination; carries the unmatched key
    Fallback(String),
}

impl AudioTypeMatch {
    pub fn classify(codec: &str, channels: u32, sample_rate: u32, bit_rate_kbps: u32) -> Self {
        let key = audio_type_key(codec, channels, sample_rate, bit_rate_kbps);
        match AudioType::from_key(&key) {
            Some(t) => AudioTypeMatch::Known(t),
            None => AudioTypeMatch::Fallback(key),
        }
    }

    /// The code to announce
    pub fn audio_type(&self) -> AudioType {
        match self {
            AudioTypeMatch::Known(t) => *t,
            AudioTypeMatch::Fallback(_) => AudioType::FALLBACK,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, AudioTypeMatch::Fallback(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AudioType::Aac2c44100x48000.code(), 0);
        assert_eq!(AudioType::Mp32c44100x128000.code(), 1);
        assert_eq!(AudioType::Aac2c44100x192000.code(), 2);
        assert_eq!(AudioType::Aac2c44100x128000.code(), 3);
        assert_eq!(AudioType::Mp31c44100x48000.code(), 4);
        assert_eq!(AudioType::Aac2c44100x24000.code(), 5);

        for t in AudioType::ALL {
            assert_eq!(AudioType::from_code(t.code()), Ok(t));
            assert_eq!(AudioType::from_key(t.key()), Some(t));
        }
        assert_eq!(AudioType::from_code(6), Err(ProtocolError::UnknownAudioType(6)));
    }

    #[test]
    fn test_key_format() {
        assert_eq!(audio_type_key("AAC", 2, 44100, 48), "AAC_2C_44100_48000");
        assert_eq!(audio_type_key("UNK", 0, 0, 0), "UNK_0C_0_0000");
    }

    #[test]
    fn test_classify_known() {
        let m = AudioTypeMatch::classify("MP3", 1, 44100, 48);
        assert_eq!(m, AudioTypeMatch::Known(AudioType::Mp31c44100x48000));
        assert!(!m.is_fallback());
        assert_eq!(m.audio_type().code(), 4);
    }

    #[test]
    fn test_classify_fallback() {
        let m = AudioTypeMatch::classify("UNK", 2, 48000, 96);
        assert_eq!(m, AudioTypeMatch::Fallback("UNK_2C_48000_96000".to_string()));
        assert!(m.is_fallback());
        assert_eq!(m.audio_type(), AudioType::FALLBACK);
        assert_eq!(m.audio_type().code(), 1);
    }
}
