use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use klaxon_engine::KlaxonConfig;

use crate::cli::Overrides;

/// Effective configuration and the file it was read from, if any.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub source: Option<PathBuf>,
    pub klaxon: KlaxonConfig,
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("klaxon").join("config.toml"))
    }

    /// An explicitly given file must exist; the default location is optional.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.is_file() => path,
                _ => return Ok(Self::default()),
            },
        };

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let klaxon = Self::parse(&content)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        Ok(Self {
            source: Some(path),
            klaxon,
        })
    }

    pub fn parse(content: &str) -> Result<KlaxonConfig> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        let config = &mut self.klaxon;
        if let Some(url) = &overrides.feed_url {
            config.feed_url = url.clone();
        }
        if let Some(file) = &overrides.alarm_file {
            config.alarm_file = file.clone();
        }
        if let Some(secs) = overrides.ack_timeout {
            config.ack_timeout_secs = secs;
        }
        if let Some(secs) = overrides.recovery_sleep {
            config.recovery_sleep_secs = secs;
        }
        if let Some(ms) = overrides.vibration_ms {
            config.vibration_ms = ms;
        }
        if let Some(secs) = overrides.connect_timeout {
            config.connect_timeout_secs = secs;
        }
        if let Some(flag) = overrides.interrupt_ends_episode {
            config.interrupt_ends_episode = flag;
        }
    }

    pub fn show(&self) -> Result<String> {
        let mut out = String::new();
        if let Some(path) = &self.source {
            out.push_str(&format!("# loaded from {}\n", path.display()));
        }
        out.push_str(&toml::to_string_pretty(&self.klaxon)?);
        Ok(out)
    }
}
