//! Configuration management for blox-config.
//!
//! Settings come from, in increasing priority: built-in defaults, a JSON
//! file, environment variables, and command-line flags. The file is
//! optional; it is read from `--config` or [`CONFIG_PATH_ENV`] when given.
//!
//! Serial line parameters are not configurable: they are fixed by the
//! switch firmware and live in [`crate::transport`].

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// UART device used when nothing else names one.
pub const DEFAULT_DEVICE: &str = "/dev/ttyACM0";

/// Environment variable naming the UART device.
pub const DEVICE_ENV: &str = "BLOX_DEVICE";

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "BLOX_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// UART device the switch is attached to
    pub device: Option<String>,

    /// Log filter directive, e.g. "debug" or "blox_config=trace"
    pub log_level: Option<String>,
}

impl Config {
    /// Load the file named by `path`, else by [`CONFIG_PATH_ENV`], else
    /// return the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => env::var_os(CONFIG_PATH_ENV).map(PathBuf::from),
        };

        match path {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("invalid {}: {e}", path.display())))
    }

    /// The device to talk to. `explicit` is the command-line or environment
    /// choice, which wins over the file.
    pub fn device(&self, explicit: Option<&str>) -> String {
        explicit
            .or(self.device.as_deref())
            .unwrap_or(DEFAULT_DEVICE)
            .to_string()
    }
}
