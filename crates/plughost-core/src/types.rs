// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common value types shared by the loader, the extension registry and the
//! administrative surface.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Host subsystem a scope or extension point belongs to.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    /// Base scope every unit has.
    Sys,
    /// Command-line/SSH subsystem.
    Ssh,
    /// HTTP subsystem.
    Http,
}

impl ScopeKind {
    /// All scopes in construction order (base first).
    pub const ALL: [ScopeKind; 3] = [ScopeKind::Sys, ScopeKind::Ssh, ScopeKind::Http];
}

/// Lifecycle state of a plugin name in the loader.
///
/// A name that the loader does not know is absent; there is no `Absent` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PluginState {
    Loading,
    Running,
    Reloading,
    Disabled,
    Broken,
    Unloading,
}

/// How a new version of a plugin replaces a running one.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReloadMode {
    /// Swap implementations behind existing handles.
    #[default]
    Reload,
    /// Fully unload the old unit before the new one starts.
    Restart,
}

/// Which slice of the host's code a unit may resolve symbols from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    /// Only the public extension API of the host.
    Extension,
    /// Every exported symbol of the host.
    #[default]
    Plugin,
    /// Asset-only plugin without code.
    Js,
}

/// The principal a plugin acts as.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PluginUser {
    plugin: String,
}

impl PluginUser {
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Principal name used in audit logs, e.g. `plugin/replication`.
    pub fn principal(&self) -> String {
        format!("plugin/{}", self.plugin)
    }
}

/// Per-plugin environment handed to a unit at construction. Immutable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescription {
    pub user: PluginUser,
    pub canonical_web_url: String,
    pub data_dir: PathBuf,
}

impl PluginDescription {
    /// Builds the description for `name`.
    ///
    /// With no canonical host URL the plugin is served under the relative
    /// `/plugins/<name>` path; otherwise under `<url>/plugins/<name>/`.
    pub fn new(name: &str, canonical_web_url: Option<&str>, data_root: &Path) -> Self {
        let canonical_web_url = match canonical_web_url.map(|u| u.trim_end_matches('/')) {
            Some(base) if !base.is_empty() => format!("{base}/plugins/{name}/"),
            _ => format!("/plugins/{name}"),
        };
        Self {
            user: PluginUser::new(name),
            canonical_web_url,
            data_dir: data_root.join(name),
        }
    }
}
