use process_utils::ActionError;
use reqwest::StatusCode;

/// Engine-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to query device volume: {reason}")]
    DeviceQuery { reason: String },

    #[error("failed to set volume of channel `{channel}` to {level}: {reason}")]
    DeviceSet {
        channel: String,
        level: u32,
        reason: String,
    },

    #[error("malformed feed line: {reason}")]
    Decode { reason: String },

    #[error("alarm action `{action}` failed: {source}")]
    AlarmEmission {
        action: &'static str,
        #[source]
        source: ActionError,
    },

    #[error("feed request failed: {source}")]
    Connection {
        #[from]
        source: reqwest::Error,
    },

    #[error("feed responded with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    #[error("feed stream closed by the server")]
    StreamClosed,

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

impl Error {
    pub fn device_query(reason: impl Into<String>) -> Self {
        Self::DeviceQuery {
            reason: reason.into(),
        }
    }

    pub fn device_set(channel: impl Into<String>, level: u32, reason: impl Into<String>) -> Self {
        Self::DeviceSet {
            channel: channel.into(),
            level,
            reason: reason.into(),
        }
    }

    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    pub fn alarm(action: &'static str, source: ActionError) -> Self {
        Self::AlarmEmission { action, source }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Operator-issued shutdown. Every other error is retried by the stream loop.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
