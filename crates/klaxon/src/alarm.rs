//! Alarm pulses: vibration, sound and speech.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use process_utils::Action;
use tracing::info;

use crate::config::KlaxonConfig;
use crate::error::{Error, Result};

/// Emits one alarm pulse for a message.
#[async_trait]
pub trait Alarm: Send + Sync {
    /// Vibrate, play the alarm sound, echo and speak `message`, in that order.
    /// The first failing step aborts the rest of the pulse.
    async fn emit(&self, message: &str) -> Result<()>;
}

/// Alarm pulses through external programs (`termux-vibrate`, `play`, `espeak`).
#[derive(Debug, Clone)]
pub struct CommandAlarm {
    vibrate: String,
    play: String,
    speak: String,
    alarm_file: PathBuf,
    vibration: Duration,
}

impl CommandAlarm {
    pub fn from_config(config: &KlaxonConfig) -> Self {
        Self {
            vibrate: config.commands.vibrate.clone(),
            play: config.commands.play.clone(),
            speak: config.commands.speak.clone(),
            alarm_file: config.alarm_file.clone(),
            vibration: config.vibration(),
        }
    }

    fn vibrate_action(&self) -> Action {
        Action::new(&self.vibrate)
            .arg("-d")
            .arg(self.vibration.as_millis().to_string())
            .arg("-f")
    }

    fn play_action(&self) -> Action {
        Action::new(&self.play).arg(self.alarm_file.to_string_lossy())
    }

    fn speak_action(&self, message: &str) -> Action {
        Action::new(&self.speak).arg(message)
    }
}

#[async_trait]
impl Alarm for CommandAlarm {
    async fn emit(&self, message: &str) -> Result<()> {
        self.vibrate_action()
            .run()
            .await
            .map_err(|e| Error::alarm("vibrate", e))?;
        self.play_action()
            .run()
            .await
            .map_err(|e| Error::alarm("play", e))?;
        info!(message, "Received message");
        self.speak_action(message)
            .run()
            .await
            .map_err(|e| Error::alarm("speak", e))
    }
}
