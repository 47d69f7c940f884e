//! The resilient stream loop.
//!
//! Keeps one feed subscription alive for the lifetime of the process: every
//! failure short of an operator shutdown is logged, followed by a fixed
//! recovery sleep and a fresh connection. Messages are handled one at a time;
//! the next line is not read until the current episode has restored volume.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::acknowledge::{AckSettings, AcknowledgmentLoop, EpisodeReport, LoopState};
use crate::alarm::Alarm;
use crate::config::KlaxonConfig;
use crate::error::{Error, Result};
use crate::prompt::AcknowledgmentPrompt;
use crate::scope::VolumeOverrideScope;
use crate::source::{self, Message, MessageSource};
use crate::volume::{VolumeControl, VolumeSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorSettings {
    pub feed_url: String,
    pub recovery_sleep: Duration,
    pub ack: AckSettings,
}

impl From<&KlaxonConfig> for SupervisorSettings {
    fn from(config: &KlaxonConfig) -> Self {
        Self {
            feed_url: config.feed_url.clone(),
            recovery_sleep: config.recovery_sleep(),
            ack: AckSettings::from(config),
        }
    }
}

/// Counters for one supervisor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub connections: u32,
    pub reconnects: u32,
    pub episodes: u32,
    pub acknowledged: u32,
}

pub struct StreamSupervisor {
    source: Arc<dyn MessageSource>,
    volume: Arc<dyn VolumeControl>,
    alarm: Arc<dyn Alarm>,
    prompt: Box<dyn AcknowledgmentPrompt>,
    settings: SupervisorSettings,
    shutdown: CancellationToken,
    baseline: Option<VolumeSnapshot>,
    stats: SupervisorStats,
}

impl StreamSupervisor {
    pub fn new(
        source: Arc<dyn MessageSource>,
        volume: Arc<dyn VolumeControl>,
        alarm: Arc<dyn Alarm>,
        prompt: Box<dyn AcknowledgmentPrompt>,
        settings: SupervisorSettings,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            source,
            volume,
            alarm,
            prompt,
            settings,
            shutdown,
            baseline: None,
            stats: SupervisorStats::default(),
        }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// The baseline volume captured before the first connection is applied
    /// again on the way out, and whenever an episode cannot query the device
    /// to take its own snapshot.
    pub async fn run(mut self) -> SupervisorStats {
        self.baseline = capture_baseline(
            self.volume.as_ref(),
            &self.shutdown,
            self.settings.recovery_sleep,
        )
        .await;
        let mut consecutive_failures: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            self.stats.connections += 1;
            let error = match self.consume_stream(&mut consecutive_failures).await {
                Err(e) => e,
                Ok(()) => Error::StreamClosed,
            };
            if error.is_cancellation() {
                break;
            }

            consecutive_failures += 1;
            error!(
                error = %error,
                detail = ?error,
                consecutive_failures,
                url = %self.settings.feed_url,
                "Feed loop failed"
            );
            info!(
                "Recovering from failure ({} secs)",
                self.settings.recovery_sleep.as_secs_f64()
            );
            if !recovery_sleep(&self.shutdown, self.settings.recovery_sleep).await {
                break;
            }
            self.stats.reconnects += 1;
        }

        info!("Exiting because of operator shutdown");
        if let Some(baseline) = &self.baseline {
            apply_baseline(self.volume.as_ref(), baseline).await;
        }
        self.stats
    }

    /// Read one connection to its end. Only returns `Ok` if the stream ended;
    /// the caller treats that like any other disconnect.
    async fn consume_stream(&mut self, consecutive_failures: &mut u32) -> Result<()> {
        let mut lines = tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => return Err(Error::Cancelled),
            opened = self.source.open(&self.settings.feed_url) => opened?,
        };
        info!(url = %self.settings.feed_url, "Listening for messages");

        loop {
            let line = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return Err(Error::Cancelled),
                line = lines.next() => line,
            };
            let Some(line) = line else {
                return Ok(());
            };

            if let Some(message) = source::decode(&line?)? {
                *consecutive_failures = 0;
                self.handle(message).await?;
            }
        }
    }

    /// One alarm episode: override volume, alarm until acknowledged, restore.
    async fn handle(&mut self, message: Message) -> Result<EpisodeReport> {
        self.stats.episodes += 1;
        info!(message = message.text(), "Starting alarm episode");

        let mut ack = AcknowledgmentLoop::new(
            self.alarm.as_ref(),
            self.prompt.as_mut(),
            &self.settings.ack,
        );
        let outcome = VolumeOverrideScope::run(
            Arc::clone(&self.volume),
            ack.run(&message, &self.shutdown),
        )
        .await;
        let report = match outcome {
            Err(e @ Error::DeviceQuery { .. }) => {
                // No snapshot was taken; fall back to the startup levels.
                if let Some(baseline) = &self.baseline {
                    apply_baseline(self.volume.as_ref(), baseline).await;
                }
                return Err(e);
            }
            other => other?,
        };

        if report.state == LoopState::Acknowledged {
            self.stats.acknowledged += 1;
        }
        Ok(report)
    }
}

/// Returns `false` when shutdown interrupted the sleep.
async fn recovery_sleep(shutdown: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

async fn capture_baseline(
    volume: &dyn VolumeControl,
    shutdown: &CancellationToken,
    retry_after: Duration,
) -> Option<VolumeSnapshot> {
    loop {
        let result = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return None,
            result = volume.get() => result,
        };
        match result {
            Ok(snapshot) => {
                debug!(channels = snapshot.channels().len(), "Captured baseline volume");
                return Some(snapshot);
            }
            Err(e) => {
                warn!(error = %e, "Failed to capture baseline volume");
                if !recovery_sleep(shutdown, retry_after).await {
                    return None;
                }
            }
        }
    }
}

async fn apply_baseline(volume: &dyn VolumeControl, baseline: &VolumeSnapshot) {
    let report = volume.set(&baseline.baseline()).await;
    info!(
        applied = report.applied,
        failed = report.failed.len(),
        "Re-applied baseline volume"
    );
}
