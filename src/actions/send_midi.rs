//! Send control-change messages to a MIDI output port
//!
//! ```yaml
//! controls:
//!   16:
//!     type: knob
//!     onChange:
//!       - sendMidi:
//!           device: "Synth*"
//!           channel: 1
//!           messages:
//!             - control: 74          # forwards the knob value
//!             - control: 75
//!               value: 127           # fixed value
//! ```

use anyhow::{bail, Context, Result};
use midir::{MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use super::Action;
use crate::config::{MAX_CHANNEL, MAX_CONTROL};
use crate::midi::{compile_pattern, find_port, MidiMessage};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMidiConfig {
    /// Glob pattern matched against output port names
    pub device: String,
    #[serde(default)]
    pub channel: u8,
    #[serde(default)]
    pub messages: Vec<ControlChangeSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlChangeSpec {
    pub control: u8,
    /// Fixed value; when absent the event value is sent
    #[serde(default)]
    pub value: Option<u8>,
}

impl SendMidiConfig {
    fn validate(&self) -> Result<()> {
        if self.channel > MAX_CHANNEL {
            bail!("invalid MIDI channel {} (must be 0-15)", self.channel);
        }
        for spec in &self.messages {
            if spec.control > MAX_CONTROL {
                bail!("invalid control number {} (must be 0-127)", spec.control);
            }
            if let Some(value) = spec.value {
                if value > 127 {
                    bail!("invalid value {} for control {} (must be 0-127)", value, spec.control);
                }
            }
        }
        Ok(())
    }

    /// Messages to send for an event value
    pub fn messages(&self, value: i32) -> Vec<MidiMessage> {
        let event_value = value.clamp(0, 127) as u8;
        self.messages
            .iter()
            .map(|spec| MidiMessage::ControlChange {
                channel: self.channel,
                cc: spec.control,
                value: spec.value.unwrap_or(event_value),
            })
            .collect()
    }
}

pub struct SendMidiAction {
    config: SendMidiConfig,
    port_name: String,
    connection: Mutex<MidiOutputConnection>,
}

impl SendMidiAction {
    pub fn from_config(payload: serde_yaml::Value) -> Result<Box<dyn Action>> {
        let config: SendMidiConfig =
            serde_yaml::from_value(payload).context("invalid sendMidi config")?;
        config.validate()?;

        let pattern = compile_pattern(&config.device)?;
        let midi_out = MidiOutput::new("nanokongo-output")?;
        let (port, port_name) = find_port(&midi_out, &pattern)
            .with_context(|| format!("Output port '{}' not found", config.device))?;
        let connection = midi_out
            .connect(&port, "nanokongo")
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port '{}': {}", port_name, e))?;

        debug!(port = %port_name, "opened output port");

        Ok(Box::new(Self {
            config,
            port_name,
            connection: Mutex::new(connection),
        }))
    }
}

impl Action for SendMidiAction {
    fn act(&self, value: i32, _last_value: i32) -> Result<()> {
        let mut connection = self.connection.lock();
        for message in self.config.messages(value) {
            debug!(port = %self.port_name, "sending {}", message);
            connection
                .send(&message.encode())
                .with_context(|| format!("Failed to send {} to '{}'", message, self.port_name))?;
        }
        Ok(())
    }
}
