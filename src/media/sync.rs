//! Frame synchronizer contract and per-connection selection
//!
//! A synchronizer turns arbitrarily chunked bytes into complete audio frames.
//! It keeps only the state it needs to resume on the next chunk and calls back
//! synchronously for each frame it completes.

use bytes::Bytes;

use crate::error::SyncError;

use super::adts::AdtsSync;
use super::mpeg::MpegSync;
use super::raw::RawSync;

/// Largest frame the structured synchronizers will accumulate
pub const MAX_FRAME_SIZE: usize = 16 * 1024;

/// Scratch buffer size owned by each synchronizer instance
pub const SCRATCH_CAPACITY: usize = 64 * 1024;

/// Streaming byte-to-frame converter
pub trait Synchronizer {
    /// Consume all of `chunk`, calling `on_frame` for every completed frame
    ///
    /// An error is fatal: the instance refuses any further input.
    fn process<F: FnMut(Bytes)>(&mut self, chunk: &[u8], on_frame: F) -> Result<(), SyncError>;
}

/// Elementary stream format, derived from the declared content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// AAC in ADTS framing (audio/aac, audio/aacp)
    Adts,
    /// MPEG-1/2 audio (audio/mpeg)
    Mpeg,
    /// Anything else, split heuristically
    Raw,
}

impl AudioFormat {
    /// Map a Content-Type header value to a format
    ///
    /// Parameters (`; charset=...`) and letter case are ignored.
    pub fn from_content_type(content_type: &str) -> Self {
        let mime = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mime.as_str() {
            "audio/aac" | "audio/aacp" => AudioFormat::Adts,
            "audio/mpeg" => AudioFormat::Mpeg,
            _ => AudioFormat::Raw,
        }
    }

    /// Codec tag used to build audio type keys
    pub fn codec_name(&self) -> &'static str {
        match self {
            AudioFormat::Adts => "AAC",
            AudioFormat::Mpeg => "MP3",
            AudioFormat::Raw => "UNK",
        }
    }
}

/// One of the three synchronizer strategies
#[derive(Debug)]
pub enum FrameSync {
    Adts(AdtsSync),
    Mpeg(MpegSync),
    Raw(RawSync),
}

impl FrameSync {
    /// Create a fresh synchronizer for `format`
    pub fn new(format: AudioFormat) -> Self {
        match format {
            AudioFormat::Adts => FrameSync::Adts(AdtsSync::new()),
            AudioFormat::Mpeg => FrameSync::Mpeg(MpegSync::new()),
            AudioFormat::Raw => FrameSync::Raw(RawSync::new()),
        }
    }

    /// Select by Content-Type header value
    pub fn for_content_type(content_type: &str) -> Self {
        Self::new(AudioFormat::from_content_type(content_type))
    }

    pub fn format(&self) -> AudioFormat {
        match self {
            FrameSync::Adts(_) => AudioFormat::Adts,
            FrameSync::Mpeg(_) => AudioFormat::Mpeg,
            FrameSync::Raw(_) => AudioFormat::Raw,
        }
    }
}

impl Synchronizer for FrameSync {
    fn process<F: FnMut(Bytes)>(&mut self, chunk: &[u8], on_frame: F) -> Result<(), SyncError> {
        match self {
            FrameSync::Adts(sync) => sync.process(chunk, on_frame),
            FrameSync::Mpeg(sync) => sync.process(chunk, on_frame),
            FrameSync::Raw(sync) => sync.process(chunk, on_frame),
        }
    }
}
