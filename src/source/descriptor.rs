//! Upstream stream descriptor
//!
//! Everything the source server told us about the stream when the connection
//! opened. It does not change for the lifetime of that connection.

use std::collections::HashMap;

use crate::error::SourceError;
use crate::protocol::HeaderSet;

/// Descriptive headers forwarded in HEADERS PDUs, in wire order
pub const RELAYED_HEADERS: [&str; 7] = [
    "Icy-Genre",
    "Icy-Description",
    "Icy-Name",
    "Icy-Url",
    "Content-Type",
    "Icy-Private",
    "Icy-Pub",
];

/// Canonical form of a header name: `icy-metaint` becomes `Icy-Metaint`
pub fn canonical_header_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = true;
    for c in name.trim().chars() {
        if upper {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        upper = c == '-';
    }
    out
}

/// Stream parameters captured once per upstream connection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamDescriptor {
    /// Declared content type, as sent
    pub content_type: String,
    pub channels: u32,
    pub sample_rate: u32,
    /// Advertised bit rate in kbit/s
    pub bit_rate: u32,
    /// Audio bytes between metadata blocks, if the server interleaves metadata
    pub metadata_interval: Option<usize>,
    headers: HashMap<String, String>,
}

impl StreamDescriptor {
    /// Build a descriptor from response headers
    ///
    /// Names are canonicalised; the first occurrence of a repeated header wins.
    pub fn from_headers<I, N, V>(headers: I) -> Result<Self, SourceError>
    where
        I: IntoIterator<Item = (N, V)>,
        N: AsRef<str>,
        V: AsRef<str>,
    {
        let mut map = HashMap::new();
        for (name, value) in headers {
            map.entry(canonical_header_name(name.as_ref()))
                .or_insert_with(|| value.as_ref().trim().to_string());
        }

        let mut descriptor = Self {
            headers: map,
            ..Default::default()
        };

        if let Some(ct) = descriptor.header("Content-Type") {
            descriptor.content_type = ct.to_string();
        }

        if let Some(metaint) = descriptor.header("Icy-Metaint") {
            let interval = metaint.parse::<usize>().map_err(|_| {
                SourceError::MalformedHeader(format!("Icy-Metaint: {}", metaint))
            })?;
            descriptor.metadata_interval = (interval > 0).then_some(interval);
        }

        if let Some(info) = descriptor.header("Ice-Audio-Info").map(str::to_string) {
            descriptor.apply_audio_info(&info);
        }

        if descriptor.bit_rate == 0 {
            if let Some(br) = descriptor.header("Icy-Br") {
                descriptor.bit_rate = leading_number(br);
            }
        }

        Ok(descriptor)
    }

    /// Parse `ice-samplerate=44100;ice-bitrate=128;ice-channels=2`
    ///
    /// Unknown keys are ignored; unparsable values count as zero.
    fn apply_audio_info(&mut self, info: &str) {
        for param in info.split(';') {
            let Some((key, value)) = param.split_once('=') else {
                continue;
            };
            let value = value.trim().parse::<u32>().unwrap_or(0);
            match key.trim().to_ascii_lowercase().as_str() {
                "ice-samplerate" => self.sample_rate = value,
                "ice-bitrate" => self.bit_rate = value,
                "ice-channels" => self.channels = value,
                _ => {}
            }
        }
    }

    /// Look up a header by name, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&canonical_header_name(name))
            .map(String::as_str)
    }

    pub fn genre(&self) -> Option<&str> {
        self.header("Icy-Genre")
    }

    pub fn description(&self) -> Option<&str> {
        self.header("Icy-Description")
    }

    pub fn name(&self) -> Option<&str> {
        self.header("Icy-Name")
    }

    pub fn url(&self) -> Option<&str> {
        self.header("Icy-Url")
    }

    /// `Icy-Private: 1` marks a private stream
    pub fn is_private(&self) -> bool {
        self.header("Icy-Private") == Some("1")
    }

    /// Streams are public unless `Icy-Pub: 0`
    pub fn is_public(&self) -> bool {
        self.header("Icy-Pub") != Some("0")
    }

    /// The relayed descriptive headers that are present, in wire order
    pub fn relayed_headers(&self) -> HeaderSet {
        RELAYED_HEADERS
            .iter()
            .filter_map(|&name| self.header(name).map(|v| (name, v)))
            .collect()
    }
}

fn leading_number(s: &str) -> u32 {
    // Icy-Br is sometimes a list such as "128,128"
    s.split(|c: char| !c.is_ascii_digit())
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}
