// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot subcommands: `scan`, `list`, `install` and `check-config`.

use std::path::PathBuf;
use std::sync::Arc;

use plughost_config::PlughostConfig;
use plughost_core::PluginError;
use plughost_plugin::scanner;
use plughost_plugin::{InstallSource, ListOptions, PluginAdmin, ProviderSet};

use crate::fetch::{self, HttpFetcher};
use crate::host;
use crate::serve::{blocking, init_tracing};

/// Prints every artifact per plugin name, starring the one that would load.
/// Nothing is renamed.
pub fn run_scan(config: &PlughostConfig) -> Result<(), PluginError> {
    init_tracing(&config.host.log_level);
    let providers = ProviderSet::default();
    let found = scanner::scan(&config.plugins.directory, &providers)?;
    if found.is_empty() {
        println!("no plugins in {}", config.plugins.directory.display());
    }
    for (name, paths) in &found {
        println!("{name}");
        print!("{}", render_scan_entry(&providers, paths));
    }
    Ok(())
}

fn render_scan_entry(providers: &ProviderSet, paths: &[PathBuf]) -> String {
    let winner = scanner::winner(providers, paths);
    paths
        .iter()
        .map(|path| {
            let marker = if Some(path) == winner { "*" } else { " " };
            format!("  {marker} {}\n", path.display())
        })
        .collect()
}

/// Loads the plugins directory once and prints the listing as JSON.
pub async fn run_list(
    config: PlughostConfig,
    all: bool,
    regex: Option<String>,
) -> Result<(), PluginError> {
    init_tracing(&config.host.log_level);
    let loader = host::build_loader(&config)?;
    let started = blocking(&loader, |loader| loader.start()).await?;

    let admin = PluginAdmin::new(Arc::clone(&loader));
    let listed = admin.list(&ListOptions {
        all,
        regex,
        ..Default::default()
    });
    let broken = loader.broken();
    blocking(&loader, |loader| loader.stop()).await?;
    started?;

    let listed = listed?;
    let json = serde_json::to_string_pretty(&listed)
        .map_err(|e| PluginError::Internal(format!("cannot render listing: {e}")))?;
    println!("{json}");
    for (name, artifact) in broken {
        eprintln!("broken: {name}: {}", artifact.error);
    }
    Ok(())
}

/// Installs `source` (a path or URL) as `name` into the plugins directory.
/// Subject to `plugins.allow_remote_admin` like any other install.
pub async fn run_install(
    config: PlughostConfig,
    name: &str,
    source: &str,
) -> Result<(), PluginError> {
    init_tracing(&config.host.log_level);
    let loader = host::build_loader(&config)?;
    blocking(&loader, |loader| loader.start()).await??;

    let admin = PluginAdmin::new(Arc::clone(&loader)).with_fetcher(Arc::new(HttpFetcher::new()?));
    let source = if fetch::is_url(source) {
        InstallSource::Url(source.to_string())
    } else {
        let bytes = std::fs::read(source)
            .map_err(|e| PluginError::io(format!("cannot read {source}"), e))?;
        InstallSource::Bytes(bytes)
    };
    let installed = admin.install(name, source).await;
    blocking(&loader, |loader| loader.stop()).await?;

    let info = installed?;
    println!(
        "installed {} {} as {}",
        info.name,
        info.version.as_deref().unwrap_or("(no version)"),
        info.filename
    );
    Ok(())
}

/// Prints the effective configuration. Loading already validated it.
pub fn run_check_config(config: &PlughostConfig) -> Result<(), PluginError> {
    let rendered = toml::to_string_pretty(config)
        .map_err(|e| PluginError::Internal(format!("cannot render configuration: {e}")))?;
    println!("{rendered}");
    eprintln!("plughost: configuration is valid");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_stars_the_artifact_that_would_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), "").unwrap();
        std::fs::write(dir.path().join("b.plugin"), "[plugin]\nname = \"a\"\n").unwrap();
        std::fs::write(dir.path().join("a.plugin.disabled"), "[plugin]\nname = \"a\"\n").unwrap();
        let providers = ProviderSet::default();
        let found = scanner::scan(dir.path(), &providers).unwrap();

        let rendered = render_scan_entry(&providers, &found["a"]);
        let starred: Vec<&str> = rendered.lines().filter(|l| l.starts_with("  *")).collect();
        assert_eq!(starred.len(), 1, "{rendered}");
        assert!(starred[0].ends_with("b.plugin"), "{rendered}");
    }
}
