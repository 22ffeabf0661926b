//! Configuration loading for voxdrive.

use crate::defaults;
use crate::error::{Result, VoxdriveError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioSection,
    pub recognition: RecognitionSection,
    pub serial: SerialSection,
    pub session: SessionSection,
    pub commands: CommandsSection,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AudioSection {
    /// Input device name; None picks the system default.
    pub device: Option<String>,
}

/// Recognition service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecognitionSection {
    pub endpoint: String,
    pub sample_rate: u32,
    pub encoding: String,
    pub language: String,
}

/// Serial line configuration for the robot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SerialSection {
    pub baud_rate: u32,
    pub data_bits: u8,
    /// "none", "odd" or "even"
    pub parity: String,
    pub stop_bits: u8,
    pub timeout_ms: u64,
}

/// Session limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSection {
    /// Maximum session length, e.g. "10m", "90s", "1h30m" or bare seconds.
    pub max_duration: String,
}

/// Extra phrase → command mappings, e.g. `spin = "dance"`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct CommandsSection {
    #[serde(flatten)]
    pub phrases: HashMap<String, String>,
}

impl Default for RecognitionSection {
    fn default() -> Self {
        Self {
            endpoint: defaults::ENDPOINT.to_string(),
            sample_rate: defaults::SAMPLE_RATE,
            encoding: defaults::ENCODING.to_string(),
            language: defaults::LANGUAGE.to_string(),
        }
    }
}

impl Default for SerialSection {
    fn default() -> Self {
        Self {
            baud_rate: defaults::SERIAL_BAUD,
            data_bits: defaults::SERIAL_DATA_BITS,
            parity: defaults::SERIAL_PARITY.to_string(),
            stop_bits: defaults::SERIAL_STOP_BITS,
            timeout_ms: defaults::SERIAL_TIMEOUT_MS,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            max_duration: format!("{}s", defaults::MAX_SESSION.as_secs()),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file is missing or contains invalid TOML.
    /// Missing fields use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, or return defaults if it doesn't
    /// exist. Invalid TOML in an existing file is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Default config path: `~/.config/voxdrive/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("voxdrive")
            .join("config.toml")
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - VOXDRIVE_ENDPOINT → recognition.endpoint
    /// - VOXDRIVE_LANGUAGE → recognition.language
    /// - VOXDRIVE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(endpoint) = std::env::var("VOXDRIVE_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.recognition.endpoint = endpoint;
        }
        if let Ok(language) = std::env::var("VOXDRIVE_LANGUAGE")
            && !language.is_empty()
        {
            self.recognition.language = language;
        }
        if let Ok(device) = std::env::var("VOXDRIVE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }
        self
    }

    /// Parse the session duration cap.
    ///
    /// Accepts bare numbers (seconds) and any `humantime` duration format
    /// (`30s`, `5m`, `1h30m`).
    pub fn max_duration(&self) -> Result<Duration> {
        parse_duration(&self.session.max_duration).map_err(|message| {
            VoxdriveError::ConfigInvalidValue {
                key: "session.max_duration".to_string(),
                message,
            }
        })
    }
}

/// Parse a duration string: bare seconds or humantime format.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}
