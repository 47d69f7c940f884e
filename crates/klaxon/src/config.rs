//! Runtime settings for the alert daemon.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_FEED_URL: &str = "http://ntfy.sh/crysis_or_panic/json";
pub const DEFAULT_ALARM_FILE: &str = "mixkit-classic-short-alarm-993.wav";
pub const DEFAULT_ACK_PROMPT: &str = "acknowledged? (y/n) ";
pub const DEFAULT_AFFIRMATIVE: &str = "y";

/// Program names of the external device actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Query with no arguments, set with `<channel> <level>`.
    pub volume: String,
    /// Invoked as `-d <ms> -f`.
    pub vibrate: String,
    /// Invoked with the alarm file path.
    pub play: String,
    /// Invoked with the message text.
    pub speak: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            volume: "termux-volume".to_owned(),
            vibrate: "termux-vibrate".to_owned(),
            play: "play".to_owned(),
            speak: "espeak".to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KlaxonConfig {
    /// Newline-delimited JSON feed to subscribe to.
    pub feed_url: String,

    /// Sound played on every alarm pulse.
    pub alarm_file: PathBuf,

    /// How long the operator has to answer before the next pulse.
    pub ack_timeout_secs: u64,

    /// Pause between a stream failure and the next connection attempt.
    pub recovery_sleep_secs: u64,

    pub vibration_ms: u64,

    pub ack_prompt: String,

    /// The only answer accepted as an acknowledgment.
    pub affirmative: String,

    /// End the episode (restoring volume) when the operator interrupts the
    /// acknowledgment wait, instead of sounding the next pulse.
    pub interrupt_ends_episode: bool,

    pub connect_timeout_secs: u64,

    pub commands: CommandsConfig,
}

impl Default for KlaxonConfig {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_owned(),
            alarm_file: PathBuf::from(DEFAULT_ALARM_FILE),
            ack_timeout_secs: 3,
            recovery_sleep_secs: 3,
            vibration_ms: 2000,
            ack_prompt: DEFAULT_ACK_PROMPT.to_owned(),
            affirmative: DEFAULT_AFFIRMATIVE.to_owned(),
            interrupt_ends_episode: false,
            connect_timeout_secs: 30,
            commands: CommandsConfig::default(),
        }
    }
}

impl KlaxonConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn recovery_sleep(&self) -> Duration {
        Duration::from_secs(self.recovery_sleep_secs)
    }

    pub fn vibration(&self) -> Duration {
        Duration::from_millis(self.vibration_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Type-level checks only: the feed URL must parse and use http(s).
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.feed_url).map_err(|e| {
            Error::configuration(format!("invalid feed url `{}`: {e}", self.feed_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "unsupported feed url scheme `{}`",
                url.scheme()
            )));
        }
        if self.affirmative.is_empty() {
            return Err(Error::configuration("affirmative answer must not be empty"));
        }
        Ok(())
    }
}
