use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::Openplanet;
use crate::Result;
use crate::log::DEFAULT_PLUGIN_PATH_MARKER;

/// Persistent defaults for the CLI. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_host")]
    pub host: String,

    /// Explicit port; wins over `openplanet`.
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub openplanet: Option<Openplanet>,

    /// Folder holding `Openplanet.log`; queried from the host when unset.
    #[serde(default)]
    pub op_dir: Option<PathBuf>,

    #[serde(default = "default_log_done_limit")]
    pub log_done_limit: u32,

    /// Seconds between log polls
    #[serde(default = "default_log_check_interval")]
    pub log_check_interval: f64,

    #[serde(default = "default_plugin_path_marker")]
    pub plugin_path_marker: String,
}

fn default_host() -> String {
    tmrb_rpc::DEFAULT_HOST.to_string()
}

fn default_log_done_limit() -> u32 {
    3
}

fn default_log_check_interval() -> f64 {
    1.0
}

fn default_plugin_path_marker() -> String {
    DEFAULT_PLUGIN_PATH_MARKER.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: None,
            openplanet: None,
            op_dir: None,
            log_done_limit: default_log_done_limit(),
            log_check_interval: default_log_check_interval(),
            plugin_path_marker: default_plugin_path_marker(),
        }
    }
}

impl Config {
    /// Load from `path`. A missing file gives the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Port to use: explicit port first, then the variant's default.
    #[must_use]
    pub fn resolved_port(&self) -> Option<u16> {
        self.port.or_else(|| self.openplanet.map(Openplanet::default_port))
    }

    /// Poll interval, falling back to the default for negative or non-finite values.
    #[must_use]
    pub fn log_check_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.log_check_interval)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_log_check_interval()))
    }
}
