//! Process-wide virtual input devices backed by /dev/uinput
//!
//! Each device is created the first time an action that needs it is built
//! and then shared by every action of the process.

use anyhow::{Context, Result};
use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AttributeSet, InputEvent, Key, RelativeAxisType};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use tracing::info;

/// Highest key code announced by the virtual keyboard (KEY_MICMUTE)
const LAST_KEYBOARD_CODE: u16 = 248;

static KEYBOARD: OnceCell<Mutex<VirtualDevice>> = OnceCell::new();
static MOUSE: OnceCell<Mutex<VirtualDevice>> = OnceCell::new();

/// The shared virtual keyboard, created on first use
pub(crate) fn keyboard() -> Result<&'static Mutex<VirtualDevice>> {
    KEYBOARD.get_or_try_init(|| {
        info!("initializing virtual keyboard");
        let mut keys = AttributeSet::<Key>::new();
        for code in 1..=LAST_KEYBOARD_CODE {
            keys.insert(Key::new(code));
        }
        let device = VirtualDeviceBuilder::new()
            .context("Failed to open /dev/uinput")?
            .name("nanokongo-kbd")
            .with_keys(&keys)?
            .build()
            .context("Failed to create virtual keyboard")?;
        Ok(Mutex::new(device))
    })
}

/// The shared virtual mouse, created on first use
pub(crate) fn mouse() -> Result<&'static Mutex<VirtualDevice>> {
    MOUSE.get_or_try_init(|| {
        info!("initializing virtual mouse");
        let mut buttons = AttributeSet::<Key>::new();
        buttons.insert(Key::BTN_LEFT);
        buttons.insert(Key::BTN_RIGHT);
        buttons.insert(Key::BTN_MIDDLE);

        let mut axes = AttributeSet::<RelativeAxisType>::new();
        axes.insert(RelativeAxisType::REL_X);
        axes.insert(RelativeAxisType::REL_Y);
        axes.insert(RelativeAxisType::REL_WHEEL);
        axes.insert(RelativeAxisType::REL_HWHEEL);

        let device = VirtualDeviceBuilder::new()
            .context("Failed to open /dev/uinput")?
            .name("nanokongo-mouse")
            .with_keys(&buttons)?
            .with_relative_axes(&axes)?
            .build()
            .context("Failed to create virtual mouse")?;
        Ok(Mutex::new(device))
    })
}

/// Emit events followed by a sync report
pub(crate) fn emit(device: &Mutex<VirtualDevice>, events: &[InputEvent]) -> Result<()> {
    device
        .lock()
        .emit(events)
        .context("Failed to emit input events")
}
