//! Configuration management for nanokongo
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

use crate::error::ConfigError;

/// Highest MIDI channel number (channels are 0-based on the wire)
pub const MAX_CHANNEL: u8 = 15;

/// Highest 7-bit control number
pub const MAX_CONTROL: u8 = 127;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Glob pattern matched against MIDI input port names
    pub device: String,
    /// MIDI channel (0-15) the router listens on
    #[serde(default)]
    pub channel: u8,
    /// Controls keyed by control number
    #[serde(default)]
    pub controls: BTreeMap<u8, ControlSpec>,
}

/// Configuration of a single control
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlSpec {
    /// "button" or "knob"
    #[serde(rename = "type")]
    pub control_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scale_range: Vec<i32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_press: Vec<ActionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_release: Vec<ActionSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub on_change: Vec<ActionSpec>,
}

/// One entry of an action list: a single action name mapped to its
/// action-specific payload.
pub type ActionSpec = BTreeMap<String, serde_yaml::Value>;

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let config: AppConfig =
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration for correctness
    ///
    /// Control types, scale ranges and action payloads are checked when the
    /// router binds the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.trim().is_empty() {
            return Err(ConfigError::EmptyDevice);
        }
        if self.channel > MAX_CHANNEL {
            return Err(ConfigError::InvalidChannel(self.channel));
        }
        if let Some(&number) = self.controls.keys().find(|&&n| n > MAX_CONTROL) {
            return Err(ConfigError::InvalidControlNumber(number));
        }
        Ok(())
    }
}
