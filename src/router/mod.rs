//! Router module - turns control-change events into actions
//!
//! The Router owns the configured controls of one device channel:
//! - binds controls and their action lists from the configuration
//! - opens the input port and drains its control-change events in order
//! - classifies each value against the control's last value
//! - runs the matching action list, logging failures

mod control;


pub use control::{
    Control, ControlKind, Scale, Transition, BUTTON_PRESSED, BUTTON_RELEASED, MAX_RAW_VALUE,
};

use std::collections::BTreeMap;
use tracing::{debug, info, trace};

use crate::actions::{self, ActionRegistry};
use crate::config::AppConfig;
use crate::error::{ConfigError, TransportError};
use crate::midi::MidiInputDevice;

/// Event router bound to one device channel
///
/// Events must be delivered sequentially; `handle_control_change` takes
/// `&mut self` and performs no locking.
#[derive(Debug)]
pub struct Router {
    device: String,
    channel: u8,
    controls: BTreeMap<u8, Control>,
    input: Option<MidiInputDevice>,
}

impl Router {
    /// Build a router from configuration using the built-in actions
    pub fn new(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, actions::registry())
    }

    /// Build a router resolving action names through `registry`
    pub fn with_registry(config: &AppConfig, registry: &ActionRegistry) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut controls = BTreeMap::new();
        for (&number, spec) in &config.controls {
            debug!(control = number, "found entry for control");
            controls.insert(number, Control::from_spec(number, spec, registry)?);
        }

        info!(
            device = %config.device,
            channel = config.channel,
            controls = controls.len(),
            "Router initialized"
        );

        Ok(Self {
            device: config.device.clone(),
            channel: config.channel,
            controls,
            input: None,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn control(&self, number: u8) -> Option<&Control> {
        self.controls.get(&number)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    /// Open the first input port whose name matches the device pattern
    pub fn open(&mut self) -> Result<(), TransportError> {
        self.close();
        let input = MidiInputDevice::open(&self.device)?;
        info!(portname = %input.port_name(), "listening on device");
        self.input = Some(input);
        Ok(())
    }

    /// Process events until the transport fails or closes
    pub async fn listen(&mut self) -> Result<(), TransportError> {
        loop {
            let event = match self.input.as_mut() {
                Some(input) => input.recv().await?,
                None => return Err(TransportError::NotOpen),
            };
            self.handle_control_change(event.channel, event.control, event.value);
        }
    }

    /// Close the input port if open
    pub fn close(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.close();
        }
    }

    /// Entry point for every control-change message seen on the device
    pub fn handle_control_change(&mut self, channel: u8, control: u8, value: u8) -> Transition {
        if channel != self.channel {
            trace!(channel, control, value, "ignoring event on other channel");
            return Transition::Unchanged;
        }
        let Some(target) = self.controls.get_mut(&control) else {
            trace!(channel, control, value, "ignoring unconfigured control");
            return Transition::Unchanged;
        };

        let transition = target.handle(value);
        trace!(channel, control, value, ?transition, "handled event");
        transition
    }
}
