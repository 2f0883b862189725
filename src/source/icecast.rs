//! Minimal ICY (Icecast/SHOUTcast) client
//!
//! Requests the mountpoint with `Icy-MetaData: 1`, then reads the body as
//! alternating blocks:
//!
//! ```text
//! +----------------------+-----+--------------------+----------------------+---
//! | audio (metaint)      | len | metadata (len*16)  | audio (metaint)      | ...
//! +----------------------+-----+--------------------+----------------------+---
//! ```
//!
//! Without `Icy-Metaint` the body is pure audio; it is read in fixed-size
//! blocks and each block is followed by an empty metadata delivery.

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::error::{Result, SourceError};

use super::descriptor::StreamDescriptor;
use super::handler::SourceHandler;

/// Audio block size when the server does not interleave metadata
pub const DEFAULT_CHUNK_SIZE: usize = 8192;

/// Upper bound on the response header
pub const MAX_HEADER_SIZE: usize = 16 * 1024;

/// ICY client configuration
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Server `host:port`
    pub server: String,

    /// Mountpoint name, without the leading slash
    pub mountpoint: String,

    /// User-Agent sent with the request
    pub user_agent: String,

    /// Time allowed for the TCP dial
    pub connect_timeout: Duration,

    /// Audio block size without a metadata interval
    pub chunk_size: usize,
}

impl SourceConfig {
    pub fn new(server: impl Into<String>, mountpoint: impl Into<String>) -> Self {
        let mountpoint: String = mountpoint.into();
        Self {
            server: server.into(),
            mountpoint: mountpoint.trim_start_matches('/').to_string(),
            user_agent: concat!("icecast-relay/", env!("CARGO_PKG_VERSION")).to_string(),
            connect_timeout: Duration::from_secs(10),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Set the User-Agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Set connect timeout
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the audio block size used without a metadata interval
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Source URL, for logging
    pub fn url(&self) -> String {
        format!("http://{}/{}", self.server, self.mountpoint)
    }

    /// HTTP request sent to the server
    pub fn request(&self) -> String {
        format!(
            "GET /{} HTTP/1.0\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\nIcy-MetaData: 1\r\nConnection: close\r\n\r\n",
            self.mountpoint, self.server, self.user_agent
        )
    }
}

/// ICY client for one mountpoint
pub struct IcecastClient {
    config: SourceConfig,
}

impl IcecastClient {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// Connect and feed the stream to `handler` until it ends
    ///
    /// Always returns an error: the stream has no natural end, so a closed
    /// connection surfaces as [`SourceError::ShortRead`].
    pub async fn run<H: SourceHandler>(&self, handler: &mut H) -> Result<()> {
        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(&self.config.server),
        )
        .await
        .map_err(|_| SourceError::ConnectTimeout)??;
        stream.set_nodelay(true)?;

        tracing::info!(url = %self.config.url(), "Source connected");

        self.stream_from(stream, handler).await
    }

    /// Speak ICY over an already-connected transport
    pub async fn stream_from<S, H>(&self, mut io: S, handler: &mut H) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
        H: SourceHandler,
    {
        io.write_all(self.config.request().as_bytes()).await?;
        io.flush().await?;

        let mut reader = BufReader::new(io);
        let descriptor = read_response(&mut reader).await?;

        tracing::info!(
            url = %self.config.url(),
            content_type = %descriptor.content_type,
            channels = descriptor.channels,
            sample_rate = descriptor.sample_rate,
            bit_rate = descriptor.bit_rate,
            metaint = ?descriptor.metadata_interval,
            "Source stream opened"
        );

        let block = descriptor.metadata_interval.unwrap_or(self.config.chunk_size);

        loop {
            let audio = read_block(&mut reader, block).await?;
            handler.on_chunk(audio, false, &descriptor).await?;

            let metadata = match descriptor.metadata_interval {
                Some(_) => {
                    let len = reader.read_u8().await.map_err(|_| SourceError::ShortRead {
                        expected: 1,
                        actual: 0,
                    })? as usize
                        * 16;
                    read_block(&mut reader, len).await?
                }
                None => Bytes::new(),
            };
            handler.on_chunk(metadata, true, &descriptor).await?;
        }
    }
}

/// Read the status line and headers
async fn read_response<R>(reader: &mut R) -> Result<StreamDescriptor>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let mut consumed = read_header_line(reader, &mut line, MAX_HEADER_SIZE).await?;
    if consumed > MAX_HEADER_SIZE {
        return Err(SourceError::MalformedHeader("response header too large".into()).into());
    }

    let status = line.trim_end().to_string();
    let mut parts = status.split_whitespace();
    let protocol_ok = matches!(parts.next(), Some(p) if p == "ICY" || p.starts_with("HTTP/1."));
    if !protocol_ok || parts.next() != Some("200") {
        return Err(SourceError::BadStatus(status).into());
    }

    let mut headers = Vec::new();
    loop {
        line.clear();
        let n = read_header_line(reader, &mut line, MAX_HEADER_SIZE - consumed).await?;
        consumed += n;
        if consumed > MAX_HEADER_SIZE {
            return Err(SourceError::MalformedHeader("response header too large".into()).into());
        }
        if n == 0 {
            return Err(SourceError::MalformedHeader("connection closed in header".into()).into());
        }

        let text = line.trim_end();
        if text.is_empty() {
            break;
        }

        let (name, value) = text
            .split_once(':')
            .ok_or_else(|| SourceError::MalformedHeader(text.to_string()))?;
        headers.push((name.to_string(), value.to_string()));
    }

    Ok(StreamDescriptor::from_headers(headers)?)
}

/// Read one line, stopping one byte past `budget` so an endless line cannot
/// grow the buffer
async fn read_header_line<R>(reader: &mut R, line: &mut String, budget: usize) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    Ok((&mut *reader).take(budget as u64 + 1).read_line(line).await?)
}

/// Read exactly `len` bytes or fail with the count actually read
async fn read_block<R>(reader: &mut R, len: usize) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            return Err(SourceError::ShortRead {
                expected: len,
                actual: filled,
            }
            .into());
        }
        filled += n;
    }
    Ok(Bytes::from(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio_test::io::Builder;

    #[derive(Default)]
    struct Recorder {
        deliveries: Vec<(Bytes, bool)>,
        descriptor: Option<StreamDescriptor>,
    }

    impl SourceHandler for Recorder {
        async fn on_chunk(
            &mut self,
            chunk: Bytes,
            is_metadata: bool,
            descriptor: &StreamDescriptor,
        ) -> Result<()> {
            self.descriptor.get_or_insert_with(|| descriptor.clone());
            self.deliveries.push((chunk, is_metadata));
            Ok(())
        }
    }

    fn client() -> IcecastClient {
        IcecastClient::new(SourceConfig::new("radio.example:8000", "/live").user_agent("test"))
    }

    #[test]
    fn test_request() {
        let config = SourceConfig::new("radio.example:8000", "/live").user_agent("test");
        assert_eq!(config.mountpoint, "live");
        assert_eq!(config.url(), "http://radio.example:8000/live");
        assert_eq!(
            config.request(),
            "GET /live HTTP/1.0\r\nHost: radio.example:8000\r\nUser-Agent: test\r\nAccept: */*\r\nIcy-MetaData: 1\r\nConnection: close\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn test_interleaved_metadata() {
        let client = client();
        let mut body = Vec::new();
        body.extend_from_slice(&[0xAA; 4]);
        body.push(1);
        body.extend_from_slice(b"StreamTitle='x';");
        body.extend_from_slice(&[0xBB; 4]);
        body.push(0);

        let io = Builder::new()
            .write(client.config().request().as_bytes())
            .read(b"ICY 200 OK\r\nicy-metaint: 4\r\ncontent-type: audio/mpeg\r\nicy-br: 128\r\n\r\n")
            .read(&body)
            .build();

        let mut recorder = Recorder::default();
        let result = client.stream_from(io, &mut recorder).await;

        // The mock ends after the second metadata block
        assert!(matches!(
            result,
            Err(Error::Source(SourceError::ShortRead { expected: 4, actual: 0 }))
        ));

        assert_eq!(recorder.deliveries.len(), 4);
        assert_eq!(recorder.deliveries[0], (Bytes::from_static(&[0xAA; 4]), false));
        assert_eq!(
            recorder.deliveries[1],
            (Bytes::from_static(b"StreamTitle='x';"), true)
        );
        assert_eq!(recorder.deliveries[2], (Bytes::from_static(&[0xBB; 4]), false));
        assert_eq!(recorder.deliveries[3], (Bytes::new(), true));

        let descriptor = recorder.descriptor.unwrap();
        assert_eq!(descriptor.content_type, "audio/mpeg");
        assert_eq!(descriptor.bit_rate, 128);
        assert_eq!(descriptor.metadata_interval, Some(4));
    }

    #[tokio::test]
    async fn test_without_metaint_uses_chunk_size() {
        let config = SourceConfig::new("radio.example:8000", "live")
            .user_agent("test")
            .chunk_size(3);
        let client = IcecastClient::new(config);

        let io = Builder::new()
            .write(client.config().request().as_bytes())
            .read(b"HTTP/1.0 200 OK\r\nContent-Type: audio/aac\r\n\r\n")
            .read(&[1, 2, 3, 4, 5])
            .build();

        let mut recorder = Recorder::default();
        let result = client.stream_from(io, &mut recorder).await;

        assert!(matches!(
            result,
            Err(Error::Source(SourceError::ShortRead { expected: 3, actual: 2 }))
        ));
        assert_eq!(
            recorder.deliveries,
            vec![(Bytes::from_static(&[1, 2, 3]), false), (Bytes::new(), true)]
        );
    }

    #[tokio::test]
    async fn test_bad_status() {
        let client = client();
        let io = Builder::new()
            .write(client.config().request().as_bytes())
            .read(b"HTTP/1.0 404 Not Found\r\n\r\n")
            .build();

        let mut recorder = Recorder::default();
        let result = client.stream_from(io, &mut recorder).await;

        assert!(matches!(
            result,
            Err(Error::Source(SourceError::BadStatus(ref s))) if s == "HTTP/1.0 404 Not Found"
        ));
        assert!(recorder.deliveries.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_header() {
        let client = client();
        let io = Builder::new()
            .write(client.config().request().as_bytes())
            .read(b"ICY 200 OK\r\nno colon here\r\n\r\n")
            .build();

        let mut recorder = Recorder::default();
        let result = client.stream_from(io, &mut recorder).await;

        assert!(matches!(
            result,
            Err(Error::Source(SourceError::MalformedHeader(_)))
        ));
    }

    #[tokio::test]
    async fn test_endless_header_line_rejected() {
        let client = client();
        let (io, mut server) = tokio::io::duplex(64 * 1024);

        let mut response = b"ICY 200 OK\r\nicy-name: ".to_vec();
        response.extend(std::iter::repeat(b'a').take(MAX_HEADER_SIZE + 1024));
        server.write_all(&response).await.unwrap();

        let mut recorder = Recorder::default();
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            client.stream_from(io, &mut recorder),
        )
        .await
        .unwrap();

        assert!(matches!(
            result,
            Err(Error::Source(SourceError::MalformedHeader(_)))
        ));
        drop(server);
    }

    #[tokio::test]
    async fn test_handler_error_ends_stream() {
        struct Failing;

        impl SourceHandler for Failing {
            async fn on_chunk(&mut self, _: Bytes, _: bool, _: &StreamDescriptor) -> Result<()> {
                Err(crate::error::RelayError::IntakeClosed.into())
            }
        }

        let client = client();
        let io = Builder::new()
            .write(client.config().request().as_bytes())
            .read(b"ICY 200 OK\r\nicy-metaint: 2\r\n\r\n")
            .read(&[0xFF, 0xF1])
            .build();

        let result = client.stream_from(io, &mut Failing).await;
        assert!(matches!(
            result,
            Err(Error::Relay(crate::error::RelayError::IntakeClosed))
        ));
    }
}
