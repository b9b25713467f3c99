//! Configuration management for the player
//!
//! Bootstrap configuration is read once from a TOML file at start-up:
//!
//! 1. Command-line arguments (--config, --root-folder, --log-level)
//! 2. Environment variables (SPINDLE_CONFIG, SPINDLE_ROOT_FOLDER, SPINDLE_LOG_LEVEL)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! A missing config file is not an error: a warning is logged and the
//! built-in defaults are used. Runtime changes (volume, gap, fade times)
//! arrive as commands and are never written back.

use crate::error::{Error, Result};
use serde::Deserialize;
use spindle_common::FadeShape;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Complete player configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerConfig {
    /// Root folder that relative source references are resolved against
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Folder for prepared local copies of audio sources
    #[serde(default)]
    pub temp_folder: Option<PathBuf>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Initial playback settings
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    /// User volume at start-up (0-100)
    #[serde(default = "default_volume")]
    pub default_volume: i32,

    /// Start from the current system volume instead of `default_volume`
    #[serde(default)]
    pub use_system_volume: bool,

    /// Volume sink name (empty = default sink)
    #[serde(default)]
    pub audio_sink: String,

    /// Silence between two tracks
    #[serde(default = "default_gap_ms")]
    pub gap_ms: i64,

    #[serde(default)]
    pub fade_in_ms: i64,

    #[serde(default)]
    pub fade_out_ms: i64,

    /// Fade-out shape name (see `FadeShape::from_str`)
    #[serde(default = "default_fade_shape")]
    pub fade_shape: String,
}

/// Control loop tunables
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Control loop tick period
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Status heartbeat while playing or fading out
    #[serde(default = "default_status_interval_ms")]
    pub status_interval_ms: u64,

    /// System volume reconciliation period
    #[serde(default = "default_volume_check_interval_ms")]
    pub volume_check_interval_ms: u64,

    /// Maximum concurrent preparation workers
    #[serde(default = "default_max_concurrent_preps")]
    pub max_concurrent_preps: usize,

    /// Claim attempts before a play request fails terminally
    #[serde(default = "default_claim_retry_limit")]
    pub claim_retry_limit: u32,

    #[serde(default = "default_claim_retry_initial_backoff_ms")]
    pub claim_retry_initial_backoff_ms: u64,

    #[serde(default = "default_claim_retry_max_backoff_ms")]
    pub claim_retry_max_backoff_ms: u64,

    /// Broadcast channel capacity for player events
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Bundled backend settings
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Duration reported by the simulated player when an item has none
    #[serde(default = "default_simulated_duration_ms")]
    pub simulated_duration_ms: i64,

    #[serde(default = "default_true")]
    pub supports_seek: bool,

    #[serde(default = "default_true")]
    pub supports_speed: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_volume() -> i32 {
    50
}

fn default_gap_ms() -> i64 {
    2000
}

fn default_fade_shape() -> String {
    FadeShape::Triangle.to_config_string().to_string()
}

fn default_tick_interval_ms() -> u64 {
    10
}

fn default_status_interval_ms() -> u64 {
    250
}

fn default_volume_check_interval_ms() -> u64 {
    1000
}

fn default_max_concurrent_preps() -> usize {
    10
}

fn default_claim_retry_limit() -> u32 {
    40
}

fn default_claim_retry_initial_backoff_ms() -> u64 {
    10
}

fn default_claim_retry_max_backoff_ms() -> u64 {
    100
}

fn default_event_capacity() -> usize {
    256
}

fn default_simulated_duration_ms() -> i64 {
    20000
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            use_system_volume: false,
            audio_sink: String::new(),
            gap_ms: default_gap_ms(),
            fade_in_ms: 0,
            fade_out_ms: 0,
            fade_shape: default_fade_shape(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            status_interval_ms: default_status_interval_ms(),
            volume_check_interval_ms: default_volume_check_interval_ms(),
            max_concurrent_preps: default_max_concurrent_preps(),
            claim_retry_limit: default_claim_retry_limit(),
            claim_retry_initial_backoff_ms: default_claim_retry_initial_backoff_ms(),
            claim_retry_max_backoff_ms: default_claim_retry_max_backoff_ms(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            simulated_duration_ms: default_simulated_duration_ms(),
            supports_seek: true,
            supports_speed: true,
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            root_folder: None,
            temp_folder: None,
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
            engine: EngineConfig::default(),
            backend: BackendConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from a TOML file
    ///
    /// `None` or a path that does not exist yields the defaults with a
    /// warning. A file that exists but cannot be parsed is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)?;
                let config = Self::from_toml_str(&content)?;
                info!("Loaded configuration from {}", path.display());
                config
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Self::default()
            }
            None => {
                warn!("No config file found, using built-in defaults");
                Self::default()
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text (no validation)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid TOML: {}", e)))
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if !(0..=100).contains(&self.playback.default_volume) {
            return Err(Error::Config(format!(
                "playback.default_volume must be 0-100, got {}",
                self.playback.default_volume
            )));
        }
        if self.playback.gap_ms < 0 || self.playback.fade_in_ms < 0 || self.playback.fade_out_ms < 0 {
            return Err(Error::Config(
                "playback gap and fade times must not be negative".to_string(),
            ));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(Error::Config("engine.tick_interval_ms must be > 0".to_string()));
        }
        if self.engine.status_interval_ms == 0 {
            return Err(Error::Config("engine.status_interval_ms must be > 0".to_string()));
        }
        if self.engine.max_concurrent_preps == 0 {
            return Err(Error::Config("engine.max_concurrent_preps must be > 0".to_string()));
        }
        if self.engine.event_capacity == 0 {
            return Err(Error::Config("engine.event_capacity must be > 0".to_string()));
        }
        if FadeShape::from_str(&self.playback.fade_shape).is_none() {
            return Err(Error::Config(format!(
                "Unknown playback.fade_shape '{}'",
                self.playback.fade_shape
            )));
        }
        Ok(())
    }

    /// Configured fade-out shape (defaults to triangle when unparseable)
    pub fn fade_shape(&self) -> FadeShape {
        FadeShape::from_str(&self.playback.fade_shape).unwrap_or_default()
    }
}
