//! Run an external program in response to a control transition
//!
//! The payload is the command line as a list of strings. Every occurrence of
//! `{value}` is replaced by the value of the event that fired the action:
//!
//! ```yaml
//! controls:
//!   0:
//!     type: knob
//!     scaleRange: [0, 100]
//!     onChange:
//!       - command: [amixer, set, Master, '{value}%']
//! ```

use anyhow::{bail, Context, Result};
use std::process::Command;
use tracing::{debug, info};

use super::Action;

const VALUE_PLACEHOLDER: &str = "{value}";

#[derive(Debug, Clone)]
pub struct CommandAction {
    args: Vec<String>,
}

impl CommandAction {
    pub fn new(args: Vec<String>) -> Result<Self> {
        if args.is_empty() {
            bail!("command must name a program");
        }
        Ok(Self { args })
    }

    pub fn from_config(payload: serde_yaml::Value) -> Result<Box<dyn Action>> {
        let args: Vec<String> =
            serde_yaml::from_value(payload).context("command expects a list of strings")?;
        let action = Self::new(args)?;
        debug!(args = ?action.args, "command config");
        Ok(Box::new(action))
    }

    /// Command line with `{value}` substituted
    pub fn command_line(&self, value: i32) -> Vec<String> {
        let value = value.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace(VALUE_PLACEHOLDER, &value))
            .collect()
    }
}

impl Action for CommandAction {
    fn act(&self, value: i32, _last_value: i32) -> Result<()> {
        let args = self.command_line(value);
        info!(command = ?args, "execute command action");

        let status = Command::new(&args[0])
            .args(&args[1..])
            .status()
            .with_context(|| format!("Failed to run '{}'", args[0]))?;

        if !status.success() {
            bail!("'{}' exited with {}", args[0], status);
        }
        Ok(())
    }
}
