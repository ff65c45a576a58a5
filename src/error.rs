//! Error types for configuration binding and the MIDI transport

use thiserror::Error;

/// Configuration errors are fatal: they abort router construction before any
/// event is processed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("device pattern cannot be empty")]
    EmptyDevice,

    #[error("invalid MIDI channel {0} (must be 0-15)")]
    InvalidChannel(u8),

    #[error("invalid control number {0} (must be 0-127)")]
    InvalidControlNumber(u8),

    #[error("control {control}: unknown control type '{kind}' (expected 'button' or 'knob')")]
    UnknownControlType { control: u8, kind: String },

    #[error("control {control}: scaleRange must have exactly 2 elements, found {len}")]
    InvalidScaleRange { control: u8, len: usize },

    #[error("control {control}: scaleRange is only valid for knobs")]
    ScaleOnButton { control: u8 },

    #[error("invalid action spec: expected exactly one action name, found {} ({})", .keys.len(), .keys.join(", "))]
    InvalidActionSpec { keys: Vec<String> },

    #[error("failed to construct action '{action}'")]
    ActionConstruction {
        action: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("control {control}: invalid {list} actions")]
    ActionList {
        control: u8,
        list: &'static str,
        #[source]
        source: Box<ConfigError>,
    },
}

/// Transport errors are fatal and propagate to the caller of `open`/`listen`.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid device pattern '{pattern}'")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("unable to find device matching '{0}'")]
    DeviceNotFound(String),

    #[error(transparent)]
    Init(#[from] midir::InitError),

    #[error("failed to connect to port '{port}': {reason}")]
    Connect { port: String, reason: String },

    #[error("device is not open")]
    NotOpen,

    #[error("MIDI input stream closed")]
    Disconnected,
}
