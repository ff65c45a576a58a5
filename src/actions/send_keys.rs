//! Type keystrokes through a virtual keyboard
//!
//! Key names are the Linux input key names without the `KEY_` prefix, in any
//! case: `a`, `leftshift`, `f5`, `volumeup`. Keys joined with `+` form a
//! chord; they are pressed in order and released in reverse order.
//!
//! ```yaml
//! controls:
//!   41:
//!     type: button
//!     onRelease:
//!       - sendKeys:
//!           keys: [leftshift+o, o, d, d, b, i, t]
//!           delay: 100
//! ```

use anyhow::{anyhow, Context, Result};
use evdev::uinput::VirtualDevice;
use evdev::{EventType, InputEvent, Key};
use parking_lot::Mutex;
use serde::Deserialize;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::debug;

use super::{uinput, Action};

const KEY_PRESS: i32 = 1;
const KEY_RELEASE: i32 = 0;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendKeysConfig {
    pub keys: Vec<String>,
    /// Pause after each chord, in milliseconds
    #[serde(default)]
    pub delay: u64,
}

/// Resolve a single key name such as `leftshift`
pub fn parse_key(name: &str) -> Result<Key> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("empty key name"));
    }
    Key::from_str(&format!("KEY_{}", trimmed.to_uppercase()))
        .map_err(|_| anyhow!("no such key: {}", name))
}

/// Resolve a `+`-joined chord such as `leftctrl+c`
pub fn parse_chord(spec: &str) -> Result<Vec<Key>> {
    spec.split('+').map(parse_key).collect()
}

pub struct SendKeysAction {
    chords: Vec<Vec<Key>>,
    delay: Duration,
    keyboard: &'static Mutex<VirtualDevice>,
}

impl SendKeysAction {
    pub fn from_config(payload: serde_yaml::Value) -> Result<Box<dyn Action>> {
        let config: SendKeysConfig =
            serde_yaml::from_value(payload).context("invalid sendKeys config")?;
        let chords = config
            .keys
            .iter()
            .map(|spec| parse_chord(spec))
            .collect::<Result<Vec<_>>>()?;

        debug!(keys = ?config.keys, delay = config.delay, "sendkeys config");

        Ok(Box::new(Self {
            chords,
            delay: Duration::from_millis(config.delay),
            keyboard: uinput::keyboard()?,
        }))
    }
}

/// Press events in order followed by release events in reverse order
fn chord_events(chord: &[Key]) -> Vec<InputEvent> {
    let press = chord
        .iter()
        .map(|key| InputEvent::new(EventType::KEY, key.code(), KEY_PRESS));
    let release = chord
        .iter()
        .rev()
        .map(|key| InputEvent::new(EventType::KEY, key.code(), KEY_RELEASE));
    press.chain(release).collect()
}

impl Action for SendKeysAction {
    fn act(&self, _value: i32, _last_value: i32) -> Result<()> {
        debug!(chords = self.chords.len(), "execute sendkeys action");
        for chord in &self.chords {
            let events = chord_events(chord);
            // Presses must reach the kernel before the releases
            let (press, release) = events.split_at(chord.len());
            uinput::emit(self.keyboard, press)?;
            uinput::emit(self.keyboard, release)?;

            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        Ok(())
    }
}
