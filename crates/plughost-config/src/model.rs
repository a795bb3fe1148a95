// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` so a misspelled key is
//! reported at startup instead of silently ignored.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level plughost configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PlughostConfig {
    /// Host-wide settings.
    #[serde(default)]
    pub host: HostConfig,

    /// Plugin loader settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// Host-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Public base URL of the server. Plugin URLs are derived from it.
    #[serde(default)]
    pub canonical_web_url: Option<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            canonical_web_url: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Plugin loader settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PluginsConfig {
    /// Directory scanned for plugin artifacts.
    #[serde(default = "default_plugins_directory")]
    pub directory: PathBuf,

    /// Root of the per-plugin private data directories.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,

    /// Where running units keep their private copy of an artifact.
    #[serde(default = "default_temp_directory")]
    pub temp_directory: PathBuf,

    /// Seconds between background rescans. 0 disables them.
    #[serde(default = "default_check_frequency_secs")]
    pub check_frequency_secs: u64,

    /// Whether install/enable/disable/reload may be requested remotely.
    #[serde(default)]
    pub allow_remote_admin: bool,

    /// Plugins whose absence is fatal at startup.
    #[serde(default)]
    pub mandatory: Vec<String>,

    /// Initial delay before retrying a deferred cleanup.
    #[serde(default = "default_cleanup_retry_secs")]
    pub cleanup_retry_secs: u64,

    /// Attempts before a deferred cleanup is given up.
    #[serde(default = "default_cleanup_max_attempts")]
    pub cleanup_max_attempts: u32,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            directory: default_plugins_directory(),
            data_directory: default_data_directory(),
            temp_directory: default_temp_directory(),
            check_frequency_secs: default_check_frequency_secs(),
            allow_remote_admin: false,
            mandatory: Vec::new(),
            cleanup_retry_secs: default_cleanup_retry_secs(),
            cleanup_max_attempts: default_cleanup_max_attempts(),
        }
    }
}

impl PluginsConfig {
    /// Period of the background rescan, or `None` when disabled.
    pub fn check_frequency(&self) -> Option<Duration> {
        (self.check_frequency_secs > 0).then(|| Duration::from_secs(self.check_frequency_secs))
    }

    pub fn cleanup_retry(&self) -> Duration {
        Duration::from_secs(self.cleanup_retry_secs)
    }
}

fn data_root() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("plughost"))
        .unwrap_or_else(|| PathBuf::from("plughost"))
}

fn default_plugins_directory() -> PathBuf {
    data_root().join("plugins")
}

fn default_data_directory() -> PathBuf {
    data_root().join("data")
}

fn default_temp_directory() -> PathBuf {
    std::env::temp_dir().join("plughost")
}

fn default_check_frequency_secs() -> u64 {
    60
}

fn default_cleanup_retry_secs() -> u64 {
    1
}

fn default_cleanup_max_attempts() -> u32 {
    10
}
