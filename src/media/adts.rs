//! ADTS (Audio Data Transport Stream) framing for AAC
//!
//! Icecast serves AAC as a bare ADTS elementary stream: every frame starts with
//! a 7 byte header (9 with CRC) that carries its own length.
//!
//! ADTS header layout:
//! ```text
//! AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP (QQQQQQQQ QQQQQQQQ)
//!
//! A 12  syncword (all bits set)
//! B 1   MPEG version (0 = MPEG-4, 1 = MPEG-2)
//! C 2   layer (always 0)
//! D 1   protection absent (1 = no CRC)
//! E 2   profile (audio object type - 1)
//! F 4   sampling frequency index
//! G 1   private bit
//! H 3   channel configuration
//! I..L  originality, home, copyright id bit, copyright id start
//! M 13  frame length including header
//! O 11  buffer fullness
//! P 2   number of raw data blocks - 1
//! Q 16  CRC (only if D == 0)
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SyncError;

use super::sync::{Synchronizer, MAX_FRAME_SIZE, SCRATCH_CAPACITY};

/// Header length without CRC
pub const HEADER_LENGTH: usize = 7;

/// Header length with CRC
pub const HEADER_LENGTH_CRC: usize = 9;

/// Largest length the 13-bit frame length field can express
pub const MAX_ADTS_FRAME_LENGTH: usize = 0x1FFF;

/// Standard sampling frequencies by index
pub const SAMPLING_FREQUENCIES: [u32; 16] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350, 0, 0,
    0,
];

/// AAC profile (audio object type)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AacProfile {
    /// AAC Main
    Main = 1,
    /// AAC LC (Low Complexity) - most common
    Lc = 2,
    /// AAC SSR (Scalable Sample Rate)
    Ssr = 3,
    /// AAC LTP (Long Term Prediction)
    Ltp = 4,
}

impl AacProfile {
    pub fn from_object_type(ot: u8) -> Option<Self> {
        match ot {
            1 => Some(AacProfile::Main),
            2 => Some(AacProfile::Lc),
            3 => Some(AacProfile::Ssr),
            4 => Some(AacProfile::Ltp),
            _ => None,
        }
    }

    /// The 2-bit ADTS profile field stores the object type minus one
    pub fn from_adts_profile(profile: u8) -> Option<Self> {
        Self::from_object_type((profile & 0x03) + 1)
    }

    pub fn adts_profile(&self) -> u8 {
        (*self as u8) - 1
    }

    pub fn name(&self) -> &'static str {
        match self {
            AacProfile::Main => "AAC Main",
            AacProfile::Lc => "AAC LC",
            AacProfile::Ssr => "AAC SSR",
            AacProfile::Ltp => "AAC LTP",
        }
    }
}

/// One complete ADTS frame with on-demand header accessors
///
/// Cheap to clone; the frame bytes are reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsFrame {
    data: Bytes,
}

impl AdtsFrame {
    /// Wrap frame bytes
    ///
    /// Returns `None` if the data is shorter than a header or does not start
    /// with the ADTS syncword.
    pub fn new(data: Bytes) -> Option<Self> {
        if data.len() < HEADER_LENGTH || data[0] != 0xFF || data[1] & 0xF0 != 0xF0 {
            return None;
        }
        Some(Self { data })
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }

    pub fn syncword(&self) -> u16 {
        ((self.data[0] as u16) << 4) | ((self.data[1] as u16) >> 4)
    }

    pub fn mpeg_version(&self) -> u8 {
        (self.data[1] & 0x08) >> 3
    }

    pub fn layer(&self) -> u8 {
        (self.data[1] & 0x06) >> 1
    }

    pub fn protection_absent(&self) -> bool {
        self.data[1] & 0x01 != 0
    }

    /// Raw 2-bit profile field
    pub fn profile(&self) -> u8 {
        (self.data[2] & 0xC0) >> 6
    }

    pub fn aac_profile(&self) -> Option<AacProfile> {
        AacProfile::from_adts_profile(self.profile())
    }

    pub fn sampling_frequency_index(&self) -> u8 {
        (self.data[2] & 0x3C) >> 2
    }

    /// Sampling frequency in Hz, 0 for reserved indices
    pub fn sample_rate(&self) -> u32 {
        SAMPLING_FREQUENCIES[self.sampling_frequency_index() as usize]
    }

    pub fn private_bit(&self) -> bool {
        self.data[2] & 0x02 != 0
    }

    pub fn channel_configuration(&self) -> u8 {
        ((self.data[2] & 0x01) << 2) | ((self.data[3] & 0xC0) >> 6)
    }

    /// Get channel count
    pub fn channels(&self) -> u8 {
        match self.channel_configuration() {
            0 => 0, // Defined in stream
            7 => 8, // 7.1
            n => n,
        }
    }

    pub fn originality(&self) -> bool {
        self.data[3] & 0x20 != 0
    }

    pub fn home(&self) -> bool {
        self.data[3] & 0x10 != 0
    }

    pub fn copyright_id_bit(&self) -> bool {
        self.data[3] & 0x08 != 0
    }

    pub fn copyright_id_start(&self) -> bool {
        self.data[3] & 0x04 != 0
    }

    /// Declared frame length including the header
    pub fn frame_length(&self) -> usize {
        declared_length(self.data[3], self.data[4], self.data[5])
    }

    pub fn buffer_fullness(&self) -> u16 {
        (((self.data[5] & 0x1F) as u16) << 6) | (((self.data[6] & 0xFC) as u16) >> 2)
    }

    /// Raw data blocks in the frame, minus one
    pub fn raw_data_blocks(&self) -> u8 {
        self.data[6] & 0x03
    }

    pub fn header_length(&self) -> usize {
        if self.protection_absent() {
            HEADER_LENGTH
        } else {
            HEADER_LENGTH_CRC
        }
    }

    /// AAC payload after the header
    pub fn payload(&self) -> Bytes {
        let start = self.header_length().min(self.data.len());
        self.data.slice(start..)
    }

    /// Whether this is an in-band metadata frame (signature FF F1/F9 3C)
    pub fn is_metadata(&self) -> bool {
        self.data[1] & 0xF7 == 0xF1 && self.data[2] == 0x3C
    }

    /// Text carried by an in-band metadata frame
    pub fn metadata(&self) -> Option<Bytes> {
        if self.is_metadata() {
            Some(self.data.slice(HEADER_LENGTH..))
        } else {
            None
        }
    }
}

fn declared_length(b3: u8, b4: u8, b5: u8) -> usize {
    (((b3 & 0x03) as usize) << 11) | ((b4 as usize) << 3) | (((b5 & 0xE0) >> 5) as usize)
}

/// Generate an ADTS header (no CRC) for a payload of `payload_length` bytes
pub fn generate_header(
    profile: AacProfile,
    sampling_frequency_index: u8,
    channel_configuration: u8,
    payload_length: usize,
) -> [u8; HEADER_LENGTH] {
    let frame_len = payload_length + HEADER_LENGTH;
    let freq_idx = sampling_frequency_index;
    let channels = channel_configuration;

    let mut header = [0u8; HEADER_LENGTH];

    // Syncword (12 bits) + ID (1 bit) + Layer (2 bits) + Protection (1 bit)
    header[0] = 0xFF;
    header[1] = 0xF1; // MPEG-4, Layer 0, no CRC

    // Profile (2 bits) + Freq (4 bits) + Private (1 bit) + Channels (1 bit)
    header[2] = ((profile.adts_profile() & 0x03) << 6)
        | ((freq_idx & 0x0F) << 2)
        | ((channels >> 2) & 0x01);

    // Channels (2 bits) + Original/Home/Copyright (4 bits) + Length (2 bits)
    header[3] = ((channels & 0x03) << 6) | ((frame_len >> 11) & 0x03) as u8;

    // Length (8 bits)
    header[4] = ((frame_len >> 3) & 0xFF) as u8;

    // Length (3 bits) + Buffer fullness (5 bits, 0x7FF = VBR)
    header[5] = (((frame_len & 0x07) << 5) | 0x1F) as u8;

    // Buffer fullness (6 bits) + Number of frames (2 bits)
    header[6] = 0xFC;

    header
}

/// Build an in-band metadata frame carrying `text`
pub fn metadata_frame(text: &[u8]) -> Result<Bytes, SyncError> {
    let frame_len = HEADER_LENGTH + text.len();
    if frame_len > MAX_ADTS_FRAME_LENGTH {
        return Err(SyncError::FrameTooLarge {
            limit: MAX_ADTS_FRAME_LENGTH,
        });
    }
    let fullness: usize = 100;

    let mut buf = BytesMut::with_capacity(frame_len);
    buf.put_u8(0xFF);
    buf.put_u8(0xF9);
    buf.put_u8(0x3C);
    buf.put_u8(((frame_len >> 11) & 0x03) as u8);
    buf.put_u8(((frame_len >> 3) & 0xFF) as u8);
    buf.put_u8((((frame_len << 5) & 0xE0) | ((fullness >> 6) & 0x1F)) as u8);
    buf.put_u8(((fullness << 2) & 0xFC) as u8);
    buf.put_slice(text);
    Ok(buf.freeze())
}

/// Streaming ADTS frame synchronizer
///
/// Position in the header is the number of bytes buffered for the current
/// frame. Bytes that do not continue a syncword are discarded.
#[derive(Debug)]
pub struct AdtsSync {
    frame: BytesMut,
    frame_length: usize,
    halted: bool,
}

impl AdtsSync {
    pub fn new() -> Self {
        Self {
            frame: BytesMut::with_capacity(SCRATCH_CAPACITY),
            frame_length: 0,
            halted: false,
        }
    }

    /// Bytes buffered for the frame in progress
    pub fn pending(&self) -> usize {
        self.frame.len()
    }
}

impl Default for AdtsSync {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer for AdtsSync {
    fn process<F: FnMut(Bytes)>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<(), SyncError> {
        if self.halted {
            return Err(SyncError::Halted);
        }

        for &b in chunk {
            let pos = self.frame.len();
            if pos >= MAX_FRAME_SIZE {
                self.halted = true;
                return Err(SyncError::FrameTooLarge {
                    limit: MAX_FRAME_SIZE,
                });
            }

            match pos {
                0 if b != 0xFF => continue,
                1 if b & 0xF0 != 0xF0 => {
                    self.frame.clear();
                    continue;
                }
                3 => self.frame_length = ((b & 0x03) as usize) << 11,
                4 => self.frame_length |= (b as usize) << 3,
                5 => self.frame_length |= ((b & 0xE0) >> 5) as usize,
                _ => {}
            }

            self.frame.put_u8(b);

            let len = self.frame.len();
            if len > 6 && len == self.frame_length {
                on_frame(self.frame.split().freeze());
            }
        }

        Ok(())
    }
}
