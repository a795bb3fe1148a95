// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wiring of the registry, the environment and the loader.

use std::sync::Arc;

use plughost_config::PlughostConfig;
use plughost_core::{PluginError, ScopeKind};
use plughost_extension::ExtensionRegistry;
use plughost_plugin::{LoaderConfig, PluginEnvironment, PluginLoader, Scope, contracts};
use tracing::debug;

use crate::builtin;

/// Host `sys` key holding the running host version.
pub const HOST_VERSION: &str = "host.version";
/// Host `sys` key holding the configured canonical web URL, if any.
pub const HOST_WEB_URL: &str = "host.canonical_web_url";

/// Builds a loader serving every scope, with the built-in code library.
pub fn build_loader(config: &PlughostConfig) -> Result<Arc<PluginLoader>, PluginError> {
    let registry = Arc::new(ExtensionRegistry::new());
    contracts::declare_host_points(&registry, &ScopeKind::ALL)?;

    let mut sys = Scope::new("sys");
    sys.insert(HOST_VERSION, env!("CARGO_PKG_VERSION").to_string());
    if let Some(url) = &config.host.canonical_web_url {
        sys.insert(HOST_WEB_URL, url.clone());
    }

    let env = PluginEnvironment::new(Arc::clone(&registry), Arc::new(builtin::library()))
        .with_host_scope(ScopeKind::Sys, &sys)
        .with_host_scope(ScopeKind::Ssh, &Scope::new("ssh"))
        .with_host_scope(ScopeKind::Http, &Scope::new("http"));
    debug!(points = registry.points().len(), "host extension points declared");

    Ok(Arc::new(PluginLoader::new(
        LoaderConfig::from_config(config),
        Arc::new(env),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plughost_plugin::contracts::{SSH_COMMANDS, SshCommand};

    #[test]
    fn built_in_hello_plugin_loads_by_discovery() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PlughostConfig::default();
        config.plugins.directory = dir.path().join("plugins");
        config.plugins.data_directory = dir.path().join("data");
        config.plugins.temp_directory = dir.path().join("tmp");
        std::fs::create_dir_all(&config.plugins.directory).unwrap();
        std::fs::write(
            config.plugins.directory.join("hello.plugin"),
            "[plugin]\nname = \"hello\"\nversion = \"1.0\"\n",
        )
        .unwrap();

        let loader = build_loader(&config).unwrap();
        loader.start().unwrap();
        let commands = loader
            .environment()
            .registry()
            .point::<dyn SshCommand>(ScopeKind::Ssh, SSH_COMMANDS)
            .unwrap();
        let hello = commands.lookup("hello").unwrap();
        assert_eq!(hello.get().run(&[]).unwrap(), "hello world from hello");
        loader.stop();
    }
}
