//! Alarm until acknowledged.
//!
//! One episode cycles `Alarming -> (pulse, ask) -> Alarming` until the
//! operator answers with the affirmative token. There is no retry limit.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::alarm::Alarm;
use crate::config::{DEFAULT_ACK_PROMPT, KlaxonConfig};
use crate::error::{Error, Result};
use crate::prompt::{AcknowledgmentPrompt, Answer};
use crate::source::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Alarming,
    Acknowledged,
    /// Ended without acknowledgment: an error escaped, the daemon is shutting
    /// down, or the operator interrupted a wait with
    /// [`AckSettings::interrupt_ends_episode`] set.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckSettings {
    pub prompt: String,
    pub timeout: Duration,
    pub interrupt_ends_episode: bool,
}

impl Default for AckSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_ACK_PROMPT.to_owned(),
            timeout: Duration::from_secs(3),
            interrupt_ends_episode: false,
        }
    }
}

impl From<&KlaxonConfig> for AckSettings {
    fn from(config: &KlaxonConfig) -> Self {
        Self {
            prompt: config.ack_prompt.clone(),
            timeout: config.ack_timeout(),
            interrupt_ends_episode: config.interrupt_ends_episode,
        }
    }
}

/// How an episode that returned normally ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpisodeReport {
    /// `Acknowledged`, or `Aborted` for an interrupt that ends the episode.
    pub state: LoopState,
    /// Pulses that completed.
    pub pulses: u32,
}

pub struct AcknowledgmentLoop<'a> {
    alarm: &'a dyn Alarm,
    prompt: &'a mut dyn AcknowledgmentPrompt,
    settings: &'a AckSettings,
    state: LoopState,
    pulses: u32,
}

impl<'a> AcknowledgmentLoop<'a> {
    pub fn new(
        alarm: &'a dyn Alarm,
        prompt: &'a mut dyn AcknowledgmentPrompt,
        settings: &'a AckSettings,
    ) -> Self {
        Self {
            alarm,
            prompt,
            settings,
            state: LoopState::Alarming,
            pulses: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn pulses(&self) -> u32 {
        self.pulses
    }

    /// Drive the episode to a terminal state.
    ///
    /// Errors (a failed pulse, or [`Error::Cancelled`] once `shutdown` fires)
    /// leave the loop `Aborted` and are returned to the caller, who owns
    /// restoring the volume.
    pub async fn run(
        &mut self,
        message: &Message,
        shutdown: &CancellationToken,
    ) -> Result<EpisodeReport> {
        let result = self.drive(message, shutdown).await;
        if result.is_err() {
            self.state = LoopState::Aborted;
        }
        result
    }

    async fn drive(
        &mut self,
        message: &Message,
        shutdown: &CancellationToken,
    ) -> Result<EpisodeReport> {
        while self.state == LoopState::Alarming {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(Error::Cancelled),
                emitted = self.alarm.emit(message.text()) => emitted?,
            }
            self.pulses += 1;

            let answer = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Err(Error::Cancelled),
                answer = self.prompt.ask(&self.settings.prompt, self.settings.timeout) => answer,
            };
            self.state = self.next_state(answer);
        }

        Ok(EpisodeReport {
            state: self.state,
            pulses: self.pulses,
        })
    }

    fn next_state(&self, answer: Answer) -> LoopState {
        match answer {
            Answer::Yes => {
                info!(pulses = self.pulses, "Alarm acknowledged");
                LoopState::Acknowledged
            }
            Answer::Interrupted if self.settings.interrupt_ends_episode => {
                info!(pulses = self.pulses, "Alarm dismissed by interrupt");
                LoopState::Aborted
            }
            Answer::Interrupted => {
                info!("Interrupted");
                LoopState::Alarming
            }
            Answer::TimedOut => {
                info!("Timeout occurred");
                LoopState::Alarming
            }
            Answer::No => {
                debug!("Answer was not an acknowledgment");
                LoopState::Alarming
            }
        }
    }
}
