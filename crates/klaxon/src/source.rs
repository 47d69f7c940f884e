//! The notification feed: newline-delimited JSON over a long-lived HTTP GET.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde_json::Value;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;
use tracing::{debug, info};

use crate::error::{Error, Result};

const MESSAGE_FIELD: &str = "message";

/// Longest line accepted from the feed.
const MAX_LINE_LENGTH: usize = 1 << 20;

/// Raw feed lines, as they arrive.
pub type LineStream = BoxStream<'static, Result<Bytes>>;

/// A non-empty alert text taken from one feed line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    text: String,
}

impl Message {
    /// `None` for empty text.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.is_empty() { None } else { Some(Self { text }) }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Decode one feed line.
///
/// Blank lines and objects without a (non-empty) `message` yield `None`.
/// Anything that is not a JSON object, or a `message` that is not a string,
/// is a decode error.
pub fn decode(line: &[u8]) -> Result<Option<Message>> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let value: Value = serde_json::from_slice(line).map_err(|e| Error::decode(e.to_string()))?;
    let Value::Object(object) = value else {
        return Err(Error::decode(format!("expected a JSON object, got `{value}`")));
    };

    match object.get(MESSAGE_FIELD) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Message::new(text.as_str())),
        Some(other) => Err(Error::decode(format!(
            "`{MESSAGE_FIELD}` must be a string, got `{other}`"
        ))),
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Connect to `url` and return its lines. Reconnecting is the caller's job.
    async fn open(&self, url: &str) -> Result<LineStream>;
}

/// Select aws-lc-rs as the process-wide TLS backend, once.
pub fn install_rustls_provider() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    INSTALLED.get_or_init(|| {
        let provider = rustls::crypto::aws_lc_rs::default_provider();
        if provider.install_default().is_err() {
            debug!("TLS crypto provider was already installed");
        }
    });
}

/// Feed reader over `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpMessageSource {
    client: reqwest::Client,
}

impl HttpMessageSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client without an overall request timeout: the feed is expected to stay
    /// open indefinitely, only establishing the connection is bounded.
    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self> {
        install_rustls_provider();
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;
        Ok(Self::new(client))
    }
}

fn line_error(error: LinesCodecError) -> Error {
    match error {
        LinesCodecError::MaxLineLengthExceeded => {
            Error::decode(format!("line longer than {MAX_LINE_LENGTH} bytes"))
        }
        LinesCodecError::Io(e) if e.kind() == std::io::ErrorKind::InvalidData => {
            Error::decode(format!("line is not valid UTF-8: {e}"))
        }
        LinesCodecError::Io(e) => Error::from(e),
    }
}

#[async_trait]
impl MessageSource for HttpMessageSource {
    async fn open(&self, url: &str) -> Result<LineStream> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                status,
                url: url.to_owned(),
            });
        }
        info!(url, %status, "Connected to feed");

        let body = response.bytes_stream().map_err(std::io::Error::other);
        let lines = FramedRead::new(
            StreamReader::new(body),
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        )
        .map(|line| line.map(Bytes::from).map_err(line_error));

        Ok(lines.boxed())
    }
}
