//! RON settings file for the harvester binary.
//!
//! Every field is optional in the file; anything left out keeps its default.

use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use engine_logging::LogDestination;
use harvester_core::{PaginationConfig, RetryPolicy, STORE_CAPACITY};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse settings {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid pagination settings: {0}")]
    Pagination(#[from] harvester_core::ConfigError),
    #[error("store capacity must be greater than zero")]
    ZeroCapacity,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum LogSetting {
    File,
    #[default]
    Terminal,
    Both,
}

impl From<LogSetting> for LogDestination {
    fn from(setting: LogSetting) -> Self {
        match setting {
            LogSetting::File => LogDestination::File,
            LogSetting::Terminal => LogDestination::Terminal,
            LogSetting::Both => LogDestination::Both,
        }
    }
}

/// Pagination knobs with durations in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationSettings {
    pub settle_delay_ms: u64,
    pub max_iterations: u32,
    pub patience_threshold: u32,
    pub cooldown_every: u32,
    pub cooldown_delay_ms: u64,
    pub retry_attempts: u32,
    pub retry_fallback_ms: u64,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self::from(PaginationConfig::default())
    }
}

impl From<PaginationConfig> for PaginationSettings {
    fn from(config: PaginationConfig) -> Self {
        Self {
            settle_delay_ms: millis(config.settle_delay),
            max_iterations: config.max_iterations,
            patience_threshold: config.patience_threshold,
            cooldown_every: config.cooldown_every,
            cooldown_delay_ms: millis(config.cooldown_delay),
            retry_attempts: config.retry.max_attempts,
            retry_fallback_ms: millis(config.retry.fallback_delay),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl PaginationSettings {
    pub fn to_config(&self) -> PaginationConfig {
        PaginationConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            max_iterations: self.max_iterations,
            patience_threshold: self.patience_threshold,
            cooldown_every: self.cooldown_every,
            cooldown_delay: Duration::from_millis(self.cooldown_delay_ms),
            retry: RetryPolicy {
                max_attempts: self.retry_attempts,
                fallback_delay: Duration::from_millis(self.retry_fallback_ms),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub pagination: PaginationSettings,
    pub store_path: PathBuf,
    pub capacity: usize,
    /// Base for resolving relative links in the rendered feed.
    pub base_url: Option<String>,
    pub export_dir: PathBuf,
    pub log_destination: LogSetting,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            pagination: PaginationSettings::default(),
            store_path: PathBuf::from("feed_items.json"),
            capacity: STORE_CAPACITY,
            base_url: Some("https://x.com/".to_string()),
            export_dir: PathBuf::from("exports"),
            log_destination: LogSetting::default(),
        }
    }
}

impl HarvestSettings {
    /// Reads settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Self = ron::from_str(&content).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pagination.to_config().validate()?;
        self.capacity()?;
        Ok(())
    }

    pub fn pagination_config(&self) -> Result<PaginationConfig, ConfigError> {
        let config = self.pagination.to_config();
        config.validate()?;
        Ok(config)
    }

    pub fn capacity(&self) -> Result<NonZeroUsize, ConfigError> {
        NonZeroUsize::new(self.capacity).ok_or(ConfigError::ZeroCapacity)
    }
}
