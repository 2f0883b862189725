//! Audio elementary stream handling
//!
//! This module provides:
//! - ADTS (AAC) frame synchronization and header access
//! - MPEG audio frame synchronization with the standard bitrate tables
//! - A heuristic splitter for unrecognised content types
//! - Synchronizer selection by content type

pub mod adts;
pub mod mpeg;
pub mod raw;
pub mod sync;

pub use adts::{AacProfile, AdtsFrame, AdtsSync};
pub use mpeg::{MpegHeader, MpegSync, TableEntry};
pub use raw::RawSync;
pub use sync::{AudioFormat, FrameSync, Synchronizer, MAX_FRAME_SIZE, SCRATCH_CAPACITY};
