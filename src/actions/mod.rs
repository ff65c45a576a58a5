//! Actions triggered by control transitions
//!
//! An action is built once, from the payload that follows its name in the
//! configuration, and then invoked for every matching control transition.
//! Concrete actions live in submodules and are made available by name
//! through the [`ActionRegistry`].

pub mod command;
mod registry;
pub mod send_midi;

#[cfg(target_os = "linux")]
pub mod send_keys;
#[cfg(target_os = "linux")]
pub mod send_mouse;
#[cfg(target_os = "linux")]
mod uinput;

use anyhow::Result;
use std::fmt;

pub use registry::{build_action_list, registry, ActionConstructor, ActionRegistry};

/// A configured side effect
///
/// `value` and `last_value` are the (scaled) values of the event that fired
/// the action and of the previous event for the same control.
///
/// Actions run synchronously on the dispatch path; a slow action delays the
/// events that follow it.
pub trait Action: Send {
    fn act(&self, value: i32, last_value: i32) -> Result<()>;
}

/// An action together with the configuration name it was built from
pub struct BoundAction {
    name: String,
    action: Box<dyn Action>,
}

impl BoundAction {
    pub fn new(name: impl Into<String>, action: Box<dyn Action>) -> Self {
        Self {
            name: name.into(),
            action,
        }
    }

    /// Name the action was registered under (e.g. "command")
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn act(&self, value: i32, last_value: i32) -> Result<()> {
        self.action.act(value, last_value)
    }
}

impl fmt::Debug for BoundAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BoundAction").field(&self.name).finish()
    }
}
