//! Ingest session: upstream deliveries to relay PDUs
//!
//! The first delivery of a connection fixes the session ID, the synchronizer
//! and the announced audio type. Afterwards:
//! - audio blocks go through the synchronizer, one DATA PDU per frame
//! - metadata blocks produce ANNOUNCE, METADATA and HEADERS, in that order
//!
//! PDUs are pushed into the relay intake with backpressure: when the intake
//! is full, ingest waits.

use bytes::Bytes;

use crate::error::{RelayError, Result};
use crate::media::Synchronizer;
use crate::protocol::Pdu;
use crate::relay::Intake;
use crate::source::{SourceHandler, StreamDescriptor};
use crate::stats::SessionStats;

use super::context::SessionContext;

/// Turns one upstream connection at a time into relay PDUs
pub struct IngestSession {
    mountpoint: String,
    intake: Intake,
    context: Option<SessionContext>,
    stats: SessionStats,
    frames: Vec<Bytes>,
}

impl IngestSession {
    pub fn new(mountpoint: impl Into<String>, intake: Intake) -> Self {
        Self {
            mountpoint: mountpoint.into(),
            intake,
            context: None,
            stats: SessionStats::new(),
            frames: Vec::new(),
        }
    }

    pub fn mountpoint(&self) -> &str {
        &self.mountpoint
    }

    /// Context of the current connection, once the first delivery arrived
    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Close the current connection's session
    ///
    /// The next delivery starts a new session with a fresh ID and
    /// synchronizer. Returns the finished session's statistics.
    pub fn end(&mut self) -> Option<SessionStats> {
        let ctx = self.context.take()?;
        let stats = std::mem::take(&mut self.stats);

        tracing::info!(
            session = %ctx.session_id,
            mountpoint = %self.mountpoint,
            frames = stats.frames,
            bytes = stats.bytes_received,
            metadata_blocks = stats.metadata_blocks,
            pdus = stats.pdus_sent,
            bitrate = stats.bitrate(),
            duration_secs = stats.duration().as_secs(),
            "Ingest session ended"
        );

        Some(stats)
    }
}

fn begin(mountpoint: &str, descriptor: &StreamDescriptor) -> SessionContext {
    let ctx = SessionContext::from_descriptor(descriptor);

    tracing::info!(
        session = %ctx.session_id,
        mountpoint = %mountpoint,
        content_type = %descriptor.content_type,
        format = ?ctx.format,
        audio_type = %ctx.announced_type(),
        "Ingest session started"
    );

    if let crate::protocol::AudioTypeMatch::Fallback(key) = &ctx.audio_type {
        tracing::warn!(
            session = %ctx.session_id,
            key = %key,
            fallback = %ctx.announced_type(),
            "Unknown audio type, announcing fallback"
        );
    }

    ctx
}

async fn submit(intake: &Intake, stats: &mut SessionStats, pdu: Pdu) -> Result<()> {
    intake
        .send(pdu)
        .await
        .map_err(|_| RelayError::IntakeClosed)?;
    stats.pdus_sent += 1;
    Ok(())
}

impl SourceHandler for IngestSession {
    async fn on_chunk(
        &mut self,
        chunk: Bytes,
        is_metadata: bool,
        descriptor: &StreamDescriptor,
    ) -> Result<()> {
        let mountpoint = &self.mountpoint;
        let ctx = self
            .context
            .get_or_insert_with(|| begin(mountpoint, descriptor));
        let session_id = ctx.session_id;

        if is_metadata {
            self.stats.metadata_blocks += 1;
            tracing::debug!(session = %session_id, len = chunk.len(), "Metadata block");

            let pdus = [
                Pdu::announce(session_id, ctx.announced_type(), mountpoint.clone()),
                Pdu::metadata(session_id, chunk),
                Pdu::headers(session_id, ctx.headers.clone()),
            ];
            for pdu in pdus {
                submit(&self.intake, &mut self.stats, pdu).await?;
            }
            return Ok(());
        }

        self.stats.bytes_received += chunk.len() as u64;

        let frames = &mut self.frames;
        let synced = ctx.sync.process(&chunk, |frame| frames.push(frame));

        // Frames completed before a failure are still relayed
        for frame in self.frames.drain(..) {
            self.stats.frames += 1;
            submit(&self.intake, &mut self.stats, Pdu::data(session_id, frame)).await?;
        }

        if let Err(e) = synced {
            tracing::warn!(session = %session_id, error = %e, "Frame synchronizer failed");
            return Err(e.into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use tokio::sync::mpsc;

    use super::*;
    use crate::error::{Error, SyncError};
    use crate::media::adts::{generate_header, AacProfile};
    use crate::protocol::{AudioType, PduBody, PduType};

    fn adts_frame(total: usize, fill: u8) -> Vec<u8> {
        let mut frame = generate_header(AacProfile::Lc, 4, 2, total - 7).to_vec();
        frame.resize(total, fill);
        frame
    }

    fn drain(rx: &mut mpsc::Receiver<Pdu>) -> Vec<Pdu> {
        let mut out = Vec::new();
        while let Ok(pdu) = rx.try_recv() {
            out.push(pdu);
        }
        out
    }

    fn aac_descriptor() -> StreamDescriptor {
        StreamDescriptor::from_headers([
            ("Content-Type", "audio/aac"),
            ("Ice-Audio-Info", "ice-samplerate=44100;ice-bitrate=128;ice-channels=2"),
            ("Icy-Genre", "Jazz"),
        ])
        .unwrap()
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_adts_frames_become_data_pdus() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut session = IngestSession::new("jazz", tx);
        let descriptor = aac_descriptor();

        let mut stream = adts_frame(200, 0x11);
        stream.extend(adts_frame(150, 0x22));
        stream.extend(adts_frame(300, 0x33));

        session
            .on_chunk(Bytes::copy_from_slice(&stream[..275]), false, &descriptor)
            .await
            .unwrap();
        session
            .on_chunk(Bytes::copy_from_slice(&stream[275..]), false, &descriptor)
            .await
            .unwrap();

        let pdus = drain(&mut rx);
        let sizes: Vec<usize> = pdus
            .iter()
            .map(|p| match &p.body {
                PduBody::Data(d) => d.len(),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(sizes, vec![200, 150, 300]);

        let session_id = session.context().unwrap().session_id;
        assert!(pdus.iter().all(|p| p.session_id == session_id));
        assert!(pdus.iter().all(|p| p.sequence == 0 && p.replica == 0));
        assert_eq!(session.stats().frames, 3);
        assert_eq!(session.stats().bytes_received, 650);
    }

    #[tokio::test]
    async fn test_metadata_order() {
        let (tx, mut rx) = mpsc::channel(100);
        let mut session = IngestSession::new("jazz", tx);
        let descriptor = aac_descriptor();

        session
            .on_chunk(Bytes::from_static(b"StreamTitle='Take Five';"), true, &descriptor)
            .await
            .unwrap();

        let pdus = drain(&mut rx);
        let types: Vec<PduType> = pdus.iter().map(|p| p.pdu_type()).collect();
        assert_eq!(types, vec![PduType::Announce, PduType::Metadata, PduType::Headers]);

        assert_eq!(
            pdus[0].body,
            PduBody::Announce {
                audio_type: AudioType::Aac2c44100x128000,
                mountpoint: "jazz".to_string()
            }
        );
        assert_eq!(
            pdus[1].body,
            PduBody::Metadata(Bytes::from_static(b"StreamTitle='Take Five';"))
        );
        match &pdus[2].body {
            PduBody::Headers(h) => {
                assert_eq!(h.to_text(), "Icy-Genre\rJazz\nContent-Type\raudio/aac")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_content_type_uses_raw_and_fallback() {
        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let (tx, mut rx) = mpsc::channel(100);
        let mut session = IngestSession::new("ogg", tx);
        let descriptor = StreamDescriptor::from_headers([
            ("Content-Type", "audio/ogg"),
            ("Ice-Audio-Info", "ice-samplerate=48000;ice-bitrate=96;ice-channels=2"),
        ])
        .unwrap();

        session
            .on_chunk(
                Bytes::from_static(&[0xFF, 0xF1, 0x01, 0x02, 0xFF, 0xF1, 0x03]),
                false,
                &descriptor,
            )
            .await
            .unwrap();
        session
            .on_chunk(Bytes::new(), true, &descriptor)
            .await
            .unwrap();

        let ctx = session.context().unwrap();
        assert_eq!(ctx.format, crate::media::AudioFormat::Raw);

        let pdus = drain(&mut rx);
        assert_eq!(pdus[0].body, PduBody::Data(Bytes::from_static(&[0xFF, 0xF1, 0x01, 0x02])));
        assert_eq!(
            pdus[1].body,
            PduBody::Announce {
                audio_type: AudioType::Mp32c44100x128000,
                mountpoint: "ogg".to_string()
            }
        );
        assert_eq!(pdus[2].body, PduBody::Metadata(Bytes::new()));

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("UNK_2C_48000_96000"), "{}", output);
        assert!(output.contains("WARN"), "{}", output);
    }

    #[tokio::test]
    async fn test_intake_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut session = IngestSession::new("jazz", tx);

        let result = session
            .on_chunk(Bytes::from_static(b"t"), true, &aac_descriptor())
            .await;
        assert!(matches!(result, Err(Error::Relay(RelayError::IntakeClosed))));
    }

    #[tokio::test]
    async fn test_sync_failure_ends_session() {
        let (tx, _rx) = mpsc::channel(100);
        let mut session = IngestSession::new("jazz", tx);

        // Declared length 0 never completes, so the frame overflows
        let mut chunk = vec![0xFF, 0xF1, 0x50, 0x80, 0x00, 0x1F, 0xFC];
        chunk.resize(20 * 1024, 0);

        let result = session
            .on_chunk(Bytes::from(chunk), false, &aac_descriptor())
            .await;
        assert!(matches!(
            result,
            Err(Error::Sync(SyncError::FrameTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_end_starts_new_session() {
        let (tx, _rx) = mpsc::channel(100);
        let mut session = IngestSession::new("jazz", tx);
        let descriptor = aac_descriptor();

        assert!(session.end().is_none());

        session
            .on_chunk(Bytes::from_static(b"a"), true, &descriptor)
            .await
            .unwrap();
        let first = session.context().unwrap().session_id;

        let stats = session.end().unwrap();
        assert_eq!(stats.metadata_blocks, 1);
        assert_eq!(stats.pdus_sent, 3);
        assert!(session.context().is_none());

        session
            .on_chunk(Bytes::from_static(b"b"), true, &descriptor)
            .await
            .unwrap();
        assert_ne!(session.context().unwrap().session_id, first);
        assert_eq!(session.stats().metadata_blocks, 1);
    }
}
