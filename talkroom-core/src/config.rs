//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/talkroom/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/talkroom/` (~/.config/talkroom/)
//! - State/Logs: `$XDG_STATE_HOME/talkroom/` (~/.local/state/talkroom/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// Statistics windows and thresholds
    #[serde(default)]
    pub stats: StatsConfig,

    /// Upload limits and room lifetime
    #[serde(default)]
    pub upload: UploadConfig,

    /// Narrative generation (optional collaborator)
    #[serde(default)]
    pub narrative: NarrativeConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Windows used by the stats and awards engines
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    /// A reply within this many minutes of someone else's message is quick
    #[serde(default = "default_quick_reply_minutes")]
    pub quick_reply_minutes: u32,

    /// Burst window, anchored at the first message of a run
    #[serde(default = "default_burst_window_minutes")]
    pub burst_window_minutes: u32,

    /// Shortest run reported as a burst
    #[serde(default = "default_burst_min_messages")]
    pub burst_min_messages: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            quick_reply_minutes: default_quick_reply_minutes(),
            burst_window_minutes: default_burst_window_minutes(),
            burst_min_messages: default_burst_min_messages(),
        }
    }
}

fn default_quick_reply_minutes() -> u32 {
    3
}

fn default_burst_window_minutes() -> u32 {
    5
}

fn default_burst_min_messages() -> usize {
    3
}

/// Upload policy
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct UploadConfig {
    /// Largest accepted export in bytes
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Days before a shared room expires
    #[serde(default = "default_room_ttl_days")]
    pub room_ttl_days: u32,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_bytes: default_max_bytes(),
            room_ttl_days: default_room_ttl_days(),
        }
    }
}

fn default_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_room_ttl_days() -> u32 {
    30
}

/// Narrative collaborator configuration
///
/// Disabled by default. When disabled the pipeline never calls the
/// collaborator and statistics are unaffected.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct NarrativeConfig {
    /// Enable/disable narrative generation
    #[serde(default)]
    pub enabled: bool,

    /// Model identifier recorded with each stored narrative
    #[serde(default = "default_model")]
    pub model: String,

    /// Total attempts per narrative section (first try included)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Multiplier applied to the delay after each retry (1 = fixed delay)
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: u32,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl NarrativeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_attempts() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> u32 {
    1
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engines cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.stats.burst_window_minutes == 0 {
            return Err(Error::Config(
                "stats.burst_window_minutes must be at least 1".to_string(),
            ));
        }
        if self.stats.burst_min_messages < 2 {
            return Err(Error::Config(
                "stats.burst_min_messages must be at least 2".to_string(),
            ));
        }
        if self.upload.max_bytes == 0 {
            return Err(Error::Config(
                "upload.max_bytes must be greater than 0".to_string(),
            ));
        }
        if self.narrative.max_attempts == 0 {
            return Err(Error::Config(
                "narrative.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.narrative.backoff_factor == 0 {
            return Err(Error::Config(
                "narrative.backoff_factor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/talkroom/config.toml` (~/.config/talkroom/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("talkroom").join("config.toml")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/talkroom/` (~/.local/state/talkroom/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("talkroom")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/talkroom/talkroom.log` (~/.local/state/talkroom/talkroom.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join(crate::logging::LOG_FILE_PREFIX)
    }
}
