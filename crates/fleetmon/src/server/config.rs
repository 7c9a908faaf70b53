//! Server configuration
//!
//! TOML-backed configuration for the engine. Every field has a
//! documented default so an empty file (or a missing table) yields a
//! working setup.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::server::session::SessionConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub session: SessionSettings,
}

/// Push-session policy settings
#[derive(Debug, Clone, Deserialize)]
pub struct SessionSettings {
    /// Read/write timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Inbound frame size bound in bytes
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_max_frame_bytes() -> usize {
    8096
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl SessionSettings {
    /// Convert into the per-session protocol policy
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            max_frame_bytes: self.max_frame_bytes,
        }
    }
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}
