//! Engine configuration persisted under `~/.replaykit/config.toml`

use crate::adaptive::AdaptiveConfig;
use crate::playback::PlaybackConfig;
use crate::recovery::RecoveryConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub adaptation: AdaptationSettings,
    #[serde(default)]
    pub recovery: RecoverySettings,
    #[serde(default)]
    pub recording: RecordingSettings,
}

/// Adaptive executor tuning, persisted form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptationSettings {
    pub max_attempts: usize,
    pub search_radius: u32,
    pub jitter_px: i32,
}

impl Default for AdaptationSettings {
    fn default() -> Self {
        let defaults = AdaptiveConfig::default();
        Self {
            max_attempts: defaults.max_attempts,
            search_radius: defaults.search_radius,
            jitter_px: defaults.jitter_px,
        }
    }
}

impl AdaptationSettings {
    pub fn to_engine_config(&self) -> AdaptiveConfig {
        AdaptiveConfig {
            max_attempts: self.max_attempts,
            search_radius: self.search_radius,
            jitter_px: self.jitter_px,
            ..AdaptiveConfig::default()
        }
    }
}

/// Recovery engine tuning, persisted form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoverySettings {
    pub max_strategies: usize,
    pub aggressive: bool,
    pub retry_delay_cap_secs: f64,
}

impl Default for RecoverySettings {
    fn default() -> Self {
        let defaults = RecoveryConfig::default();
        Self {
            max_strategies: defaults.max_strategies,
            aggressive: defaults.aggressive,
            retry_delay_cap_secs: defaults.retry_delay_cap_secs,
        }
    }
}

impl RecoverySettings {
    pub fn to_engine_config(&self) -> RecoveryConfig {
        RecoveryConfig {
            max_strategies: self.max_strategies,
            aggressive: self.aggressive,
            retry_delay_cap_secs: self.retry_delay_cap_secs,
            ..RecoveryConfig::default()
        }
    }
}

/// Recording advisor tuning, persisted form
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    pub max_session_secs: f64,
    pub idle_timeout_secs: f64,
    pub decision_threshold: f64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            max_session_secs: 600.0,
            idle_timeout_secs: 120.0,
            decision_threshold: 0.8,
        }
    }
}

impl Config {
    /// Load configuration from disk, creating the default file if it
    /// does not exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            let config = Config::default();
            config.save()?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save configuration to its default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, toml_string).context("Failed to write config file")?;
        Ok(())
    }

    /// Configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".replaykit").join("config.toml"))
    }
}
