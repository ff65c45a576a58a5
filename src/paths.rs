//! Configuration file discovery.
//!
//! Resolution order:
//!
//! 1. an explicit path (`--config` or `NANOKONGO_CONFIG`)
//! 2. `config.yml` or `config.yaml` in the current working directory
//! 3. `config.yml` in the per-user config directory
//!    (`~/.config/nanokongo` on Linux, `%APPDATA%\nanokongo` on Windows)

use std::path::{Path, PathBuf};
use tracing::debug;

/// Application name used for the per-user config directory
const APP_NAME: &str = "nanokongo";

/// File names looked up in a directory, in order
const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml"];

/// Resolve the configuration file to load.
///
/// An explicit path is returned as is, even if it does not exist, so the
/// loader can report it. Without one, the first existing candidate wins; if
/// none exists the per-user location is returned.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let user_dir = user_config_dir();
    resolve_in(&cwd, user_dir.as_deref())
}

/// Per-user config directory for the application, if the platform has one
pub fn user_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME))
}

fn find_in(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn resolve_in(cwd: &Path, user_dir: Option<&Path>) -> PathBuf {
    if let Some(found) = find_in(cwd) {
        debug!("Using config from working directory: {}", found.display());
        return found;
    }

    match user_dir {
        Some(dir) => {
            let found = find_in(dir).unwrap_or_else(|| dir.join(CONFIG_FILE_NAMES[0]));
            debug!("Using config from user directory: {}", found.display());
            found
        }
        None => cwd.join(CONFIG_FILE_NAMES[0]),
    }
}
