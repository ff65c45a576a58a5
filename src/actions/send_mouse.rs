//! Move, scroll and click through a virtual mouse
//!
//! Motion follows the direction of the control: positive when the value
//! increased, negative otherwise. Buttons (`left`, `right`, `middle`) may be
//! joined with `+`.
//!
//! ```yaml
//! controls:
//!   17:
//!     type: knob
//!     onChange:
//!       - sendMouse:
//!           x: 10
//!   58:
//!     type: button
//!     onRelease:
//!       - sendMouse:
//!           click: left
//! ```

use anyhow::{bail, Context, Result};
use evdev::uinput::VirtualDevice;
use evdev::{EventType, InputEvent, Key, RelativeAxisType};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use super::{uinput, Action};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SendMouseConfig {
    #[serde(default)]
    pub click: String,
    #[serde(default)]
    pub press: String,
    #[serde(default)]
    pub release: String,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default, alias = "wheelx")]
    pub wheel_x: i32,
    #[serde(default, alias = "wheely")]
    pub wheel_y: i32,
}

fn parse_buttons(spec: &str) -> Result<Vec<Key>> {
    if spec.is_empty() {
        return Ok(Vec::new());
    }
    spec.split('+')
        .map(|name| match name.trim() {
            "left" => Ok(Key::BTN_LEFT),
            "right" => Ok(Key::BTN_RIGHT),
            "middle" => Ok(Key::BTN_MIDDLE),
            other => bail!("unknown button: {}", other),
        })
        .collect()
}

/// +1 when the control moved up, -1 otherwise
fn direction(value: i32, last_value: i32) -> i32 {
    if value > last_value {
        1
    } else {
        -1
    }
}

/// Buttons resolved at construction time
#[derive(Debug, Clone)]
struct MousePlan {
    press: Vec<Key>,
    release: Vec<Key>,
    click: Vec<Key>,
}

impl MousePlan {
    fn build(config: &SendMouseConfig) -> Result<Self> {
        Ok(Self {
            press: parse_buttons(&config.press).context("invalid press")?,
            release: parse_buttons(&config.release).context("invalid release")?,
            click: parse_buttons(&config.click).context("invalid click")?,
        })
    }
}

fn motion_events(config: &SendMouseConfig, dir: i32) -> Vec<InputEvent> {
    [
        (RelativeAxisType::REL_X, config.x),
        (RelativeAxisType::REL_Y, config.y),
        (RelativeAxisType::REL_HWHEEL, config.wheel_x),
        (RelativeAxisType::REL_WHEEL, config.wheel_y),
    ]
    .into_iter()
    .filter(|&(_, amount)| amount != 0)
    .map(|(axis, amount)| InputEvent::new(EventType::RELATIVE, axis.0, dir * amount))
    .collect()
}

fn button_event(button: Key, value: i32) -> InputEvent {
    InputEvent::new(EventType::KEY, button.code(), value)
}

pub struct SendMouseAction {
    config: SendMouseConfig,
    plan: MousePlan,
    mouse: &'static Mutex<VirtualDevice>,
}

impl SendMouseAction {
    pub fn from_config(payload: serde_yaml::Value) -> Result<Box<dyn Action>> {
        let config: SendMouseConfig =
            serde_yaml::from_value(payload).context("invalid sendMouse config")?;
        let plan = MousePlan::build(&config)?;

        debug!(?config, "sendmouse config");

        Ok(Box::new(Self {
            config,
            plan,
            mouse: uinput::mouse()?,
        }))
    }
}

impl Action for SendMouseAction {
    fn act(&self, value: i32, last_value: i32) -> Result<()> {
        let dir = direction(value, last_value);
        debug!(direction = dir, "execute sendmouse action");

        let motion = motion_events(&self.config, dir);
        if !motion.is_empty() {
            uinput::emit(self.mouse, &motion)?;
        }
        for &button in &self.plan.press {
            uinput::emit(self.mouse, &[button_event(button, 1)])?;
        }
        for &button in &self.plan.release {
            uinput::emit(self.mouse, &[button_event(button, 0)])?;
        }
        for &button in &self.plan.click {
            uinput::emit(self.mouse, &[button_event(button, 1)])?;
            uinput::emit(self.mouse, &[button_event(button, 0)])?;
        }
        Ok(())
    }
}
