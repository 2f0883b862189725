//! Heuristic frame splitter for unrecognised content types
//!
//! Splits wherever a byte `0xFF` is followed by a byte whose top nibble is
//! `0xF`, which is the start of most MPEG/ADTS sync words. Nothing is
//! validated, so a coincidental pattern inside audio data produces a spurious
//! boundary. Only used when the content type gives nothing better.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::SyncError;

use super::sync::{Synchronizer, SCRATCH_CAPACITY};

/// Best-effort synchronizer
#[derive(Debug)]
pub struct RawSync {
    frame: BytesMut,
    last: u8,
    halted: bool,
}

impl RawSync {
    pub fn new() -> Self {
        Self {
            frame: BytesMut::with_capacity(SCRATCH_CAPACITY),
            last: 0x00,
            halted: false,
        }
    }

    /// Bytes buffered for the frame in progress
    pub fn pending(&self) -> usize {
        self.frame.len()
    }
}

impl Default for RawSync {
    fn default() -> Self {
        Self::new()
    }
}

impl Synchronizer for RawSync {
    fn process<F: FnMut(Bytes)>(&mut self, chunk: &[u8], mut on_frame: F) -> Result<(), SyncError> {
        if self.halted {
            return Err(SyncError::Halted);
        }

        for &b in chunk {
            let boundary = self.last == 0xFF && b & 0xF0 == 0xF0;

            if boundary && self.frame.len() > 1 {
                // Everything before the 0xFF is the finished frame; the sync
                // pair seeds the next one.
                let done = self.frame.len() - 1;
                on_frame(self.frame.split_to(done).freeze());
                self.frame.put_u8(b);
                self.last = 0x00;
                continue;
            }

            if self.frame.len() >= SCRATCH_CAPACITY {
                self.halted = true;
                return Err(SyncError::FrameTooLarge {
                    limit: SCRATCH_CAPACITY,
                });
            }

            self.frame.put_u8(b);
            self.last = if boundary { 0x00 } else { b };
        }

        Ok(())
    }
}
