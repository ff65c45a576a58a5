//! nanokongo - drive keystrokes, mouse input, commands and MIDI from a
//! MIDI control surface.
//!
//! The [`router::Router`] owns the configured controls of one device channel,
//! classifies every control-change value against the control's last value and
//! runs the configured [`actions::Action`] lists.

pub mod actions;
pub mod config;
pub mod error;
pub mod midi;
pub mod paths;
pub mod router;

pub use config::AppConfig;
pub use error::{ConfigError, TransportError};
pub use router::Router;
