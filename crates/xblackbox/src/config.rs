//! Configuration management for xblackbox.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::catalog::RecordingLevel;
use crate::error::Result;
use crate::location::FacilityIndex;
use crate::recorder::{
    AutoPolicy, PerfLimits, RecorderSettings, DEFAULT_FILE_PREFIX, DEFAULT_INTERVAL,
};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "xblackbox";

/// Default trace directory under the data directory.
const RECORDINGS_DIR_NAME: &str = "recordings";

/// Environment variable prefix.
const ENV_PREFIX: &str = "XBLACKBOX_";

pub use crate::recorder::{MAX_INTERVAL, MIN_INTERVAL};

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `XBLACKBOX_`, sections split on `__`)
/// 2. TOML config file at `~/.config/xblackbox/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recording configuration.
    pub recording: RecordingConfig,
    /// Automatic start/stop policy.
    pub auto: AutoPolicy,
    /// Performance advisory ceilings.
    pub performance: PerfLimits,
    /// Navigation index configuration.
    pub navigation: NavigationConfig,
}

/// Recording-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Catalog detail level, 1 to 3.
    pub level: RecordingLevel,
    /// Seconds between frames.
    pub interval: f32,
    /// Directory traces are written to.
    /// Defaults to `~/.local/share/xblackbox/recordings`
    pub output_dir: Option<PathBuf>,
    /// Prefix for trace file names.
    pub file_prefix: String,
}

/// Navigation-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// JSON facility list to use instead of the built-in airport table.
    pub index_path: Option<PathBuf>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            level: RecordingLevel::Detailed,
            interval: DEFAULT_INTERVAL,
            output_dir: None, // Will be resolved to default at runtime
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `XBLACKBOX_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation
    /// fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config = Self::extract_from(config_path)?;
        config.validate()?;
        Ok(config)
    }

    /// Merge all sources without validating the result.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be read or parsed.
    pub fn extract_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        Ok(figment.extract()?)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.recorder_settings().validate()
    }

    /// Get the output directory, resolving defaults if not set.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.recording
            .output_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(RECORDINGS_DIR_NAME))
    }

    /// Build recorder settings from this configuration.
    #[must_use]
    pub fn recorder_settings(&self) -> RecorderSettings {
        RecorderSettings {
            level: self.recording.level,
            interval: self.recording.interval,
            output_dir: self.output_dir(),
            file_prefix: self.recording.file_prefix.clone(),
            auto: self.auto,
            perf: self.performance,
        }
    }

    /// Load the configured navigation index, or the built-in one.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured index file cannot be loaded.
    pub fn navigation_index(&self) -> Result<FacilityIndex> {
        match &self.navigation.index_path {
            Some(path) => FacilityIndex::from_json_file(path),
            None => Ok(FacilityIndex::builtin()),
        }
    }
}
