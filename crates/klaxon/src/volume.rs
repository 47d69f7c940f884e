//! Per-channel device volume: snapshots and the controller that applies them.

use async_trait::async_trait;
use process_utils::Action;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// One audio channel as reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVolume {
    #[serde(rename = "stream")]
    pub channel: String,
    #[serde(rename = "volume")]
    pub current_level: u32,
    #[serde(rename = "max_volume")]
    pub max_level: u32,
}

/// A level to apply to one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLevel {
    pub channel: String,
    pub level: u32,
}

impl ChannelLevel {
    pub fn new(channel: impl Into<String>, level: u32) -> Self {
        Self {
            channel: channel.into(),
            level,
        }
    }
}

/// Volume of every channel, captured at one instant.
///
/// Read-only once captured: the levels used to restore a channel set are
/// always derived from the same snapshot that was used to raise it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumeSnapshot {
    channels: Vec<ChannelVolume>,
}

impl VolumeSnapshot {
    pub fn new(channels: Vec<ChannelVolume>) -> Self {
        Self { channels }
    }

    /// Parse the JSON array printed by the device volume query.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::device_query(format!("unparseable volume listing: {e}")))
    }

    pub fn channels(&self) -> &[ChannelVolume] {
        &self.channels
    }

    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(|c| c.channel.as_str())
    }

    /// Every channel at its maximum level.
    pub fn maximized(&self) -> Vec<ChannelLevel> {
        self.channels
            .iter()
            .map(|c| ChannelLevel::new(&c.channel, c.max_level))
            .collect()
    }

    /// Every channel at the level it had when captured.
    pub fn baseline(&self) -> Vec<ChannelLevel> {
        self.channels
            .iter()
            .map(|c| ChannelLevel::new(&c.channel, c.current_level))
            .collect()
    }
}

/// Outcome of a best-effort [`VolumeControl::set`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetReport {
    pub applied: usize,
    pub failed: Vec<String>,
}

impl SetReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[async_trait]
pub trait VolumeControl: Send + Sync {
    /// Current and maximum level of every channel.
    async fn get(&self) -> Result<VolumeSnapshot>;

    /// Apply one channel's level.
    async fn set_channel(&self, channel: &str, level: u32) -> Result<()>;

    /// Apply each level independently. A failing channel is logged and skipped;
    /// the remaining channels are still set.
    async fn set(&self, levels: &[ChannelLevel]) -> SetReport {
        let mut report = SetReport::default();
        for ChannelLevel { channel, level } in levels {
            match self.set_channel(channel, *level).await {
                Ok(()) => report.applied += 1,
                Err(e) => {
                    warn!(channel = %channel, level, error = %e, "Failed to set channel volume");
                    report.failed.push(channel.clone());
                }
            }
        }
        report
    }
}

/// Volume control through the `termux-volume` command line tool.
#[derive(Debug, Clone)]
pub struct TermuxVolume {
    program: String,
}

impl TermuxVolume {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for TermuxVolume {
    fn default() -> Self {
        Self::new("termux-volume")
    }
}

#[async_trait]
impl VolumeControl for TermuxVolume {
    async fn get(&self) -> Result<VolumeSnapshot> {
        let stdout = Action::new(&self.program)
            .output()
            .await
            .map_err(|e| Error::device_query(e.to_string()))?;
        let snapshot = VolumeSnapshot::from_json(&stdout)?;
        debug!(channels = snapshot.channels().len(), "Queried device volume");
        Ok(snapshot)
    }

    async fn set_channel(&self, channel: &str, level: u32) -> Result<()> {
        let action = Action::new(&self.program)
            .arg(channel)
            .arg(level.to_string());
        let status = action
            .status()
            .await
            .map_err(|e| Error::device_set(channel, level, e.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(Error::device_set(channel, level, status.to_string()))
        }
    }
}
