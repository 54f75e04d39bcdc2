//! Bootstrap configuration loading and config file resolution
//!
//! Settings come from a small TOML file. Every field has a built-in default,
//! so a missing file (or a missing section) never prevents startup.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`VOX_CONFIG`)
//! 3. Platform config directory (`<config_dir>/vox/config.toml`)
//! 4. Compiled defaults (no file)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "VOX_CONFIG";

/// Default synthesis sample rate (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Default crossfade window between adjacent chunks (ms)
pub const DEFAULT_CROSSFADE_MS: u32 = 8;

/// Default trailing silence pad appended to live playback (ms)
pub const DEFAULT_TRAILING_PAD_MS: u32 = 250;

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct TomlConfig {
    /// Audio format and stitching settings
    #[serde(default)]
    pub audio: AudioConfig,

    /// Live output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Audio format and stitching settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Sample rate of synthesized and encoded audio
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Crossfade window between acoustically adjacent chunks
    #[serde(default = "default_crossfade_ms")]
    pub crossfade_ms: u32,

    /// Silence appended after the last buffer of a live session
    #[serde(default = "default_trailing_pad_ms")]
    pub trailing_pad_ms: u32,
}

/// Live output settings
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct OutputConfig {
    /// Output device name (None = system default)
    #[serde(default)]
    pub device: Option<String>,

    /// Requested device buffer size in frames (None = device default)
    #[serde(default)]
    pub buffer_size: Option<u32>,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_crossfade_ms() -> u32 {
    DEFAULT_CROSSFADE_MS
}

fn default_trailing_pad_ms() -> u32 {
    DEFAULT_TRAILING_PAD_MS
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            crossfade_ms: default_crossfade_ms(),
            trailing_pad_ms: default_trailing_pad_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// - File cannot be read
    /// - File is not valid TOML or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Resolve and load configuration, falling back to defaults.
    ///
    /// A missing file logs a warning and yields defaults. A file that exists
    /// but is malformed is an error.
    pub fn load_or_default(cli_arg: Option<&Path>) -> Result<Self> {
        match resolve_config_path(cli_arg, CONFIG_ENV_VAR) {
            Some(path) if path.exists() => {
                info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            Some(path) => {
                warn!(
                    "Config file {} not found, using built-in defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject settings no sink can honor
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(Error::Config("audio.sample_rate must be positive".to_string()));
        }
        if let Some(0) = self.output.buffer_size {
            return Err(Error::Config("output.buffer_size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Resolve the config file path following the priority order above.
///
/// Returns `None` only when no candidate exists at all (no CLI argument, no
/// environment variable, and no file in the platform config directory).
pub fn resolve_config_path(cli_arg: Option<&Path>, env_var_name: &str) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    default_config_path().filter(|p| p.exists())
}

/// Platform config file location (`~/.config/vox/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("vox").join("config.toml"))
}
