// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order, later wins: compiled defaults, `/etc/plughost/plughost.toml`,
//! `<config dir>/plughost/plughost.toml`, `./plughost.toml`, `PLUGHOST_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::PlughostConfig;

pub(crate) const SYSTEM_CONFIG: &str = "/etc/plughost/plughost.toml";
pub(crate) const LOCAL_CONFIG: &str = "plughost.toml";

pub(crate) fn user_config() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("plughost/plughost.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<PlughostConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string on top of the defaults only.
pub fn load_config_from_str(toml_content: &str) -> Result<PlughostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<PlughostConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(PlughostConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Maps `PLUGHOST_<SECTION>_<KEY>` to `<section>.<key>`.
///
/// Only the section prefix is rewritten: `PLUGHOST_PLUGINS_ALLOW_REMOTE_ADMIN`
/// becomes `plugins.allow_remote_admin`, never `plugins.allow.remote.admin`.
fn env_provider() -> Env {
    Env::prefixed("PLUGHOST_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    for section in ["host", "plugins"] {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_keys_map_to_sections() {
        assert_eq!(map_env_key("host_log_level"), "host.log_level");
        assert_eq!(
            map_env_key("plugins_allow_remote_admin"),
            "plugins.allow_remote_admin"
        );
        assert_eq!(map_env_key("unrelated"), "unrelated");
    }
}
