//! Configuration for pcmwire endpoints.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $PCMWIRE_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/pcmwire/config.toml
//!   3. ~/.config/pcmwire/config.toml

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::format::SampleFormat;
use crate::wire::DEFAULT_MAX_MESSAGE_SIZE;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcmwireConfig {
    pub stream: StreamConfig,
    pub wire: WireConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Format of the PCM payloads, as `rate:bits:channels`.
    pub sample_format: SampleFormat,
    /// Producer chunk length in milliseconds.
    pub chunk_ms: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Largest envelope body accepted from a peer, in bytes.
    pub max_message_size: u32,
}

impl StreamConfig {
    /// The sample format as the handle every chunk of a session shares.
    pub fn shared_format(&self) -> Arc<SampleFormat> {
        Arc::new(self.sample_format)
    }
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_format: SampleFormat::standard(),
            chunk_ms: 20,
        }
    }
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("pcmwire")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl PcmwireConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_file(&Self::file_path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse `path`, or fall back to defaults when it does not exist.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(PcmwireConfig::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFailed(path.to_path_buf(), e))?;
        Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.to_path_buf(), e))
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("PCMWIRE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        Self::write_default_to(&path)?;
        Ok(path)
    }

    /// Write the default config to `path` unless a file is already there.
    pub fn write_default_to(path: &Path) -> Result<(), ConfigError> {
        if path.exists() {
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))?;
        }
        let text = toml::to_string_pretty(&PcmwireConfig::default())
            .map_err(ConfigError::SerializeFailed)?;
        std::fs::write(path, text).map_err(|e| ConfigError::WriteFailed(path.to_path_buf(), e))
    }

    /// Apply PCMWIRE_* env var overrides. Unparseable values are ignored.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("PCMWIRE_STREAM__SAMPLE_FORMAT") {
            if let Ok(f) = v.parse() {
                self.stream.sample_format = f;
            }
        }
        if let Some(v) = lookup("PCMWIRE_STREAM__CHUNK_MS") {
            if let Ok(ms) = v.parse() {
                self.stream.chunk_ms = ms;
            }
        }
        if let Some(v) = lookup("PCMWIRE_WIRE__MAX_MESSAGE_SIZE") {
            if let Ok(max) = v.parse() {
                self.wire.max_message_size = max;
            }
        }
    }
}
