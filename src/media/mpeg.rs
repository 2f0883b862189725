//! MPEG audio (ISO/IEC 11172-3 / 13818-3) frame synchronization
//!
//! MPEG audio frame header:
//! ```text
//! AAAAAAAA AAABBCCD EEEEFFGH IIJJKLMM
//!
//! A 11  frame sync (all bits set)
//! B 2   version id (00 = 2.5, 01 = reserved, 10 = MPEG-2, 11 = MPEG-1)
//! C 2   layer description (00 = reserved, 01 = III, 10 = II, 11 = I)
//! D 1   protection bit (0 = CRC follows)
//! E 4   bitrate index
//! F 2   sample rate index
//! G 1   padding
//! H 1   private
//! I 2   channel mode (11 = mono)
//! J 2   mode extension
//! K 1   copyright
//! L 1   original
//! M 2   emphasis
//! ```
//!
//! Unlike ADTS the header carries no length; it is computed from the bitrate
//! and sample rate tables once the fourth byte arrives.
//!
//! There is no resynchronization: a frame that does not start with the sync
//! bits halts the synchronizer.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SyncError;

use super::sync::{Synchronizer, MAX_FRAME_SIZE, SCRATCH_CAPACITY};

pub const VERSION_2_5: u8 = 0;
pub const VERSION_RESERVED: u8 = 1;
pub const VERSION_2: u8 = 2;
pub const VERSION_1: u8 = 3;

pub const LAYER_RESERVED: u8 = 0;
pub const LAYER_III: u8 = 1;
pub const LAYER_II: u8 = 2;
pub const LAYER_I: u8 = 3;

/// Result of a bitrate or sample rate table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableEntry {
    /// Bitrate index 0: free format, length not derivable
    Free,
    /// Bits per second, or Hz for sample rates
    Value(u32),
    /// Reserved or invalid combination
    Reserved,
}

impl TableEntry {
    pub fn value(&self) -> Option<u32> {
        match self {
            TableEntry::Value(v) => Some(*v),
            _ => None,
        }
    }
}

// Bitrates in kbit/s for indices 1..=14. Index 0 is free, index 15 is bad.
const V1_L1: [u32; 14] = [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448];
const V1_L2: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384];
const V1_L3: [u32; 14] = [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320];
const V2_L1: [u32; 14] = [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256];
const V2_L23: [u32; 14] = [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160];

// Sample rates in Hz for indices 0..=2. Index 3 is reserved.
const V1_RATES: [u32; 3] = [44100, 48000, 32000];
const V2_RATES: [u32; 3] = [22050, 24000, 16000];
const V25_RATES: [u32; 3] = [11025, 12000, 8000];

/// Bitrate in bits per second
///
/// MPEG-2.5 shares the MPEG-2 tables.
pub fn bitrate(version_id: u8, layer_desc: u8, bitrate_index: u8) -> TableEntry {
    let row = match (version_id, layer_desc) {
        (VERSION_1, LAYER_I) => &V1_L1,
        (VERSION_1, LAYER_II) => &V1_L2,
        (VERSION_1, LAYER_III) => &V1_L3,
        (VERSION_2 | VERSION_2_5, LAYER_I) => &V2_L1,
        (VERSION_2 | VERSION_2_5, LAYER_II | LAYER_III) => &V2_L23,
        _ => return TableEntry::Reserved,
    };

    match bitrate_index {
        0 => TableEntry::Free,
        1..=14 => TableEntry::Value(row[bitrate_index as usize - 1] * 1000),
        _ => TableEntry::Reserved,
    }
}

/// Sample rate in Hz
pub fn sample_rate(version_id: u8, sample_rate_index: u8) -> TableEntry {
    let row = match version_id {
        VERSION_1 => &V1_RATES,
        VERSION_2 => &V2_RATES,
        VERSION_2_5 => &V25_RATES,
        _ => return TableEntry::Reserved,
    };

    match row.get(sample_rate_index as usize) {
        Some(&rate) => TableEntry::Value(rate),
        None => TableEntry::Reserved,
    }
}

/// Frame length in bytes for the given header fields
///
/// Layer I counts 4-byte slots; Layers II and III count single bytes.
pub fn frame_length(
    version_id: u8,
    layer_desc: u8,
    bitrate_index: u8,
    sample_rate_index: u8,
    padding: u8,
) -> Result<usize, SyncError> {
    let br = bitrate(version_id, layer_desc, bitrate_index).value();
    let sr = sample_rate(version_id, sample_rate_index).value();

    let (br, sr) = match (br, sr) {
        (Some(br), Some(sr)) => (br as usize, sr as usize),
        _ => {
            return Err(SyncError::UnsupportedEncoding {
                version_id,
                layer_desc,
                bitrate_index,
                sample_rate_index,
            })
        }
    };

    let padding = padding as usize;
    if layer_desc == LAYER_I {
        Ok((12 * br / sr + padding) * 4)
    } else {
        Ok(144 * br / sr + padding)
    }
}

/// Decoded 4-byte MPEG audio header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MpegHeader {
    pub version_id: u8,
    pub layer_desc: u8,
    pub protection_absent: bool,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    pub padding: u8,
    pub private_bit: bool,
    pub channel_mode: u8,
    pub mode_extension: u8,
    pub copyright: bool,
    pub original: bool,
    pub emphasis: u8,
}

impl MpegHeader {
    /// Parse the header at the start of `data`
    ///
    /// Returns `None` without a frame sync or if fewer than 4 bytes are given.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 || data[0] != 0xFF || data[1] & 0xE0 != 0xE0 {
            return None;
        }
        let (b1, b2, b3) = (data[1], data[2], data[3]);

        Some(Self {
            version_id: (b1 & 0x18) >> 3,
            layer_desc: (b1 & 0x06) >> 1,
            protection_absent: b1 & 0x01 != 0,
            bitrate_index: (b2 & 0xF0) >> 4,
            sample_rate_index: (b2 & 0x0C) >> 2,
            padding: (b2 & 0x02) >> 1,
            private_bit: b2 & 0x01 != 0,
            channel_mode: (b3 & 0xC0) >> 6,
            mode_extension: (b3 & 0x30) >> 4,
            copyright: b3 & 0x08 != 0,
            original: b3 & 0x04 != 0,
            emphasis: b3 & 0x03,
        })
    }

    pub fn version_name(&self) -> &'static str {
        match self.version_id {
            VERSION_1 => "MPEG-1",
            VERSION_2 => "MPEG-2",
            VERSION_2_5 => "MPEG-2.5",
            _ => "reserved",
        }
    }

    pub fn layer_name(&self) -> &'static str {
        match self.layer_desc {
            LAYER_I => "Layer I",
            LAYER_II => "Layer II",
            LAYER_III => "Layer III",
            _ => "reserved",
        }
    }

    pub fn bitrate(&self) -> TableEntry {
        bitrate(self.version_id, self.layer_desc, self.bitrate_index)
    }

    pub fn sample_rate(&self) -> TableEntry {
        sample_rate(self.version_id, self.sample_rate_index)
    }

    /// Get channel count
    pub fn channels(&self) -> u8 {
        if self.channel_mode == 3 {
            1
        } else {
            2
        }
    }

    pub fn samples_per_frame(&self) -> u32 {
        match (self.layer_desc, self.version_id) {
            (LAYER_I, _) => 384,
            (LAYER_III, VERSION_2 | VERSION_2_5) => 576,
            _ => 1152,
        }
    }

    pub fn frame_length(&self) -> Result<usize, SyncError> {
        frame_length(
            self.version_id,
            self.layer_desc,
            self.bitrate_index,
            self.sample_rate_index,
            self.padding,
        )
    }
}

/// Streaming MPEG audio frame synchronizer
#[derive(Debug)]
pub struct MpegSync {
    frame: BytesMut,
    frame_length: usize,
    version_id: u8,
    layer_desc: u8,
    bitrate_index: u8,
    sample_rate_index: u8,
    padding: u8,
    halted: bool,
}

impl MpegSync {
    pub fn new() -> Self {
        Self {
            frame: BytesMut::with_capacity(SCRATCH_CAPACITY),
            frame_length: 0,
            version_id: 0,
            layer_desc: 0,
            bitrate_index: 0,
            sample_rate_index: 0,
            padding: 0,
            halted: false,
        }
    }

    /// Bytes buffered for the frame in progress
    pub fn pending(&self) -> usize {
        self.frame.len()
    }

    fn fail(&mut self, err: SyncError) -> Result<(), SyncError> {
        self.halted = true;
        Err(err)
    }
}

impl Default for MpegSync {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer for MpegSync {
    fn process<F: FnMut(Bytes)>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<(), SyncError> {
        if self.halted {
            return Err(SyncError::Halted);
        }

        for &b in chunk {
            let pos = self.frame.len();
            if pos >= MAX_FRAME_SIZE {
                return self.fail(SyncError::FrameTooLarge {
                    limit: MAX_FRAME_SIZE,
                });
            }

            match pos {
                0 if b != 0xFF => {
                    return self.fail(SyncError::SyncLost { position: 0, byte: b });
                }
                1 => {
                    if b & 0xE0 != 0xE0 {
                        return self.fail(SyncError::SyncLost { position: 1, byte: b });
                    }
                    self.version_id = (b & 0x18) >> 3;
                    self.layer_desc = (b & 0x06) >> 1;
                }
                2 => {
                    self.bitrate_index = (b & 0xF0) >> 4;
                    self.sample_rate_index = (b & 0x0C) >> 2;
                    self.padding = (b & 0x02) >> 1;
                }
                3 => {
                    match frame_length(
                        self.version_id,
                        self.layer_desc,
                        self.bitrate_index,
                        self.sample_rate_index,
                        self.padding,
                    ) {
                        Ok(len) => self.frame_length = len,
                        Err(e) => return self.fail(e),
                    }
                }
                _ => {}
            }

            self.frame.put_u8(b);

            let len = self.frame.len();
            if len > 3 && len == self.frame_length {
                on_frame(self.frame.split().freeze());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, stereo
    fn mp3_frame(padding: bool, fill: u8) -> Vec<u8> {
        let b2 = if padding { 0x92 } else { 0x90 };
        let len = if padding { 418 } else { 417 };
        let mut frame = vec![0xFF, 0xFB, b2, 0x00];
        frame.extend(std::iter::repeat(fill).take(len - 4));
        frame
    }

    fn collect(sync: &mut MpegSync, chunks: &[&[u8]]) -> Vec<Bytes> {
        let mut frames = Vec::new();
        for chunk in chunks {
            sync.process(chunk, |f| frames.push(f)).unwrap();
        }
        frames
    }

    #[test]
    fn test_documented_bitrates() {
        assert_eq!(bitrate(VERSION_1, LAYER_III, 9), TableEntry::Value(128_000));
        assert_eq!(bitrate(VERSION_1, LAYER_III, 14), TableEntry::Value(320_000));
        assert_eq!(bitrate(VERSION_1, LAYER_II, 14), TableEntry::Value(384_000));
        assert_eq!(bitrate(VERSION_1, LAYER_I, 14), TableEntry::Value(448_000));
        assert_eq!(bitrate(VERSION_2, LAYER_I, 9), TableEntry::Value(144_000));
        assert_eq!(bitrate(VERSION_2, LAYER_III, 1), TableEntry::Value(8_000));
        assert_eq!(bitrate(VERSION_2_5, LAYER_II, 14), TableEntry::Value(160_000));
    }

    #[test]
    fn test_full_bitrate_tables() {
        let expected: [(u8, u8, [u32; 14]); 5] = [
            (VERSION_1, LAYER_I, [32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448]),
            (VERSION_1, LAYER_II, [32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384]),
            (VERSION_1, LAYER_III, [32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320]),
            (VERSION_2, LAYER_I, [32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256]),
            (VERSION_2, LAYER_II, [8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160]),
        ];

        for (version, layer, kbps) in expected {
            for (i, &rate) in kbps.iter().enumerate() {
                let index = (i + 1) as u8;
                assert_eq!(
                    bitrate(version, layer, index),
                    TableEntry::Value(rate * 1000),
                    "version={} layer={} index={}",
                    version,
                    layer,
                    index
                );
            }
            assert_eq!(bitrate(version, layer, 0), TableEntry::Free);
            assert_eq!(bitrate(version, layer, 15), TableEntry::Reserved);
        }

        // Layer III shares the Layer II row below MPEG-1
        for index in 0..16 {
            assert_eq!(bitrate(VERSION_2, LAYER_III, index), bitrate(VERSION_2, LAYER_II, index));
            assert_eq!(bitrate(VERSION_2_5, LAYER_I, index), bitrate(VERSION_2, LAYER_I, index));
        }
    }

    #[test]
    fn test_reserved_bitrate_combinations() {
        assert_eq!(bitrate(VERSION_RESERVED, LAYER_III, 9), TableEntry::Reserved);
        assert_eq!(bitrate(VERSION_1, LAYER_RESERVED, 9), TableEntry::Reserved);
    }

    #[test]
    fn test_sample_rate_table() {
        assert_eq!(sample_rate(VERSION_1, 0), TableEntry::Value(44100));
        assert_eq!(sample_rate(VERSION_1, 1), TableEntry::Value(48000));
        assert_eq!(sample_rate(VERSION_1, 2), TableEntry::Value(32000));
        assert_eq!(sample_rate(VERSION_2, 0), TableEntry::Value(22050));
        assert_eq!(sample_rate(VERSION_2, 1), TableEntry::Value(24000));
        assert_eq!(sample_rate(VERSION_2, 2), TableEntry::Value(16000));
        assert_eq!(sample_rate(VERSION_2_5, 0), TableEntry::Value(11025));
        assert_eq!(sample_rate(VERSION_2_5, 1), TableEntry::Value(12000));
        assert_eq!(sample_rate(VERSION_2_5, 2), TableEntry::Value(8000));
        for version in [VERSION_1, VERSION_2, VERSION_2_5] {
            assert_eq!(sample_rate(version, 3), TableEntry::Reserved);
        }
        assert_eq!(sample_rate(VERSION_RESERVED, 0), TableEntry::Reserved);
    }

    #[test]
    fn test_frame_length_formulas() {
        // Layer III: 144 * 128000 / 44100 = 417.96
        assert_eq!(frame_length(VERSION_1, LAYER_III, 9, 0, 0), Ok(417));
        assert_eq!(frame_length(VERSION_1, LAYER_III, 9, 0, 1), Ok(418));
        // Layer I: (12 * 128000 / 48000 + 0) * 4
        assert_eq!(frame_length(VERSION_1, LAYER_I, 4, 1, 0), Ok(128));
        assert_eq!(frame_length(VERSION_1, LAYER_I, 4, 1, 1), Ok(132));
        assert!(frame_length(VERSION_1, LAYER_III, 0, 0, 0).is_err());
    }

    #[test]
    fn test_header_parse() {
        let header = MpegHeader::parse(&[0xFF, 0xFB, 0x92, 0xC4]).unwrap();
        assert_eq!(header.version_id, VERSION_1);
        assert_eq!(header.layer_desc, LAYER_III);
        assert!(header.protection_absent);
        assert_eq!(header.bitrate(), TableEntry::Value(128_000));
        assert_eq!(header.sample_rate(), TableEntry::Value(44100));
        assert_eq!(header.padding, 1);
        assert_eq!(header.channel_mode, 3);
        assert_eq!(header.channels(), 1);
        assert!(header.original);
        assert_eq!(header.version_name(), "MPEG-1");
        assert_eq!(header.layer_name(), "Layer III");
        assert_eq!(header.samples_per_frame(), 1152);
        assert_eq!(header.frame_length(), Ok(418));

        assert!(MpegHeader::parse(&[0xFF, 0xFB, 0x92]).is_none());
        assert!(MpegHeader::parse(&[0xFF, 0x1B, 0x92, 0x00]).is_none());
    }

    #[test]
    fn test_frames_across_chunks() {
        let mut stream = Vec::new();
        stream.extend(mp3_frame(false, 0x01));
        stream.extend(mp3_frame(true, 0x02));
        stream.extend(mp3_frame(false, 0x03));

        let mut whole = MpegSync::new();
        let frames = collect(&mut whole, &[&stream[..]]);
        let lengths: Vec<usize> = frames.iter().map(|f| f.len()).collect();
        assert_eq!(lengths, vec![417, 418, 417]);

        let mut bytewise = MpegSync::new();
        let singles: Vec<&[u8]> = stream.chunks(1).collect();
        assert_eq!(collect(&mut bytewise, &singles), frames);
        assert_eq!(bytewise.pending(), 0);
    }

    #[test]
    fn test_layer_one_frames() {
        let mut frame = vec![0xFF, 0xFF, 0x44, 0x00];
        frame.extend(std::iter::repeat(0u8).take(124));

        let mut sync = MpegSync::new();
        let frames = collect(&mut sync, &[&frame[..], &frame[..]]);
        assert_eq!(frames.len(), 2);
        assert!(frames.iter().all(|f| f.len() == 128));
    }

    #[test]
    fn test_bad_second_sync_byte_is_fatal() {
        let mut sync = MpegSync::new();
        assert_eq!(
            sync.process(&[0xFF, 0x00, 0x12, 0x34], |_| {}),
            Err(SyncError::SyncLost { position: 1, byte: 0x00 })
        );
        assert_eq!(sync.process(&mp3_frame(false, 0), |_| {}), Err(SyncError::Halted));
    }

    #[test]
    fn test_garbage_after_frame_is_fatal() {
        let mut stream = mp3_frame(false, 0x07);
        stream.extend([0x49, 0x44, 0x33]);

        let mut sync = MpegSync::new();
        let mut frames = Vec::new();
        let result = sync.process(&stream, |f| frames.push(f));
        assert_eq!(result, Err(SyncError::SyncLost { position: 0, byte: 0x49 }));
        assert_eq!(frames.len(), 1);
        assert_eq!(sync.pending(), 0);
    }

    #[test]
    fn test_free_bitrate_is_fatal() {
        let mut sync = MpegSync::new();
        let result = sync.process(&[0xFF, 0xFB, 0x00, 0x00], |_| {});
        assert_eq!(
            result,
            Err(SyncError::UnsupportedEncoding {
                version_id: VERSION_1,
                layer_desc: LAYER_III,
                bitrate_index: 0,
                sample_rate_index: 0,
            })
        );
        assert_eq!(sync.process(&[0xFF], |_| {}), Err(SyncError::Halted));
    }

    #[test]
    fn test_reserved_sample_rate_is_fatal() {
        let mut sync = MpegSync::new();
        assert!(matches!(
            sync.process(&[0xFF, 0xFB, 0x9C, 0x00], |_| {}),
            Err(SyncError::UnsupportedEncoding { sample_rate_index: 3, .. })
        ));
    }

    #[test]
    fn test_reserved_version_is_fatal() {
        let mut sync = MpegSync::new();
        assert!(matches!(
            sync.process(&[0xFF, 0xEB, 0x90, 0x00], |_| {}),
            Err(SyncError::UnsupportedEncoding { version_id: VERSION_RESERVED, .. })
        ));
    }
}
