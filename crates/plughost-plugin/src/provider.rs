// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Artifact providers: one per packaging format.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use plughost_core::{PluginDescription, PluginError};

use crate::code::{CodeDomain, CodeLibrary};
use crate::manifest::{self, PluginDescriptor};
use crate::scanner;
use crate::scope::Scope;
use crate::snapshot::ArtifactSnapshot;
use crate::unit::{CleanupHandle, Plugin};

/// Everything a provider needs to turn an artifact into a unit.
pub struct LoadContext<'a> {
    pub name: &'a str,
    pub src_path: &'a Path,
    pub disabled: bool,
    pub snapshot: ArtifactSnapshot,
    pub description: PluginDescription,
    pub tmp_dir: &'a Path,
    pub library: &'a CodeLibrary,
    /// Running units, for resolving declared dependencies.
    pub running: &'a BTreeMap<String, Plugin>,
}

/// Reads one packaging format.
pub trait ArtifactProvider: Send + Sync {
    /// File extension handled, without the dot.
    fn extension(&self) -> &'static str;

    /// Canonical formats win filename deduplication.
    fn is_canonical(&self) -> bool {
        false
    }

    /// Name the artifact declares for itself, if it carries metadata.
    fn declared_name(&self, _path: &Path) -> Option<String> {
        None
    }

    fn dependencies(&self, _path: &Path) -> Vec<String> {
        Vec::new()
    }

    fn load(&self, ctx: LoadContext<'_>) -> Result<Plugin, PluginError>;

    fn handles(&self, path: &Path) -> bool {
        scanner::active_path(path)
            .extension()
            .is_some_and(|ext| ext == self.extension())
    }
}

/// `.plugin` descriptors backed by a code bundle linked into the host.
#[derive(Debug, Default)]
pub struct ManifestProvider;

impl ManifestProvider {
    fn read(path: &Path) -> Result<PluginDescriptor, PluginError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PluginError::io(format!("cannot read {}", path.display()), e))?;
        manifest::parse_descriptor(&content, path)
    }

    fn load_server(
        ctx: &LoadContext<'_>,
        cleanup: &CleanupHandle,
    ) -> Result<(PluginDescriptor, CodeDomain, Vec<Arc<Scope>>), PluginError> {
        let descriptor = Self::read(cleanup.path()).map_err(|e| match e {
            PluginError::InvalidArtifact { message, .. } => {
                PluginError::invalid(ctx.src_path, message)
            }
            other => other,
        })?;

        let own = ctx.library.bundle(&descriptor.code).ok_or_else(|| {
            PluginError::invalid(
                ctx.src_path,
                format!("no code bundle `{}` is linked into this host", descriptor.code),
            )
        })?;

        let mut missing = Vec::new();
        let mut bundles = Vec::new();
        let mut scopes = Vec::new();
        for dep in &descriptor.dependencies {
            let unit = ctx.running.get(dep);
            match (
                unit.and_then(Plugin::code_bundle),
                unit.and_then(Plugin::api_scope),
            ) {
                (Some(bundle), Some(scope)) => {
                    bundles.push((dep.clone(), bundle));
                    scopes.push(scope);
                }
                _ => missing.push(dep.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(PluginError::NotRunning { names: missing });
        }

        let domain = CodeDomain::new(descriptor.api_type, own, bundles, ctx.library.host());
        Ok((descriptor, domain, scopes))
    }
}

impl ArtifactProvider for ManifestProvider {
    fn extension(&self) -> &'static str {
        "plugin"
    }

    fn is_canonical(&self) -> bool {
        true
    }

    fn declared_name(&self, path: &Path) -> Option<String> {
        manifest::declared_name(path)
    }

    fn dependencies(&self, path: &Path) -> Vec<String> {
        Self::read(path)
            .map(|d| d.dependencies)
            .unwrap_or_default()
    }

    fn load(&self, ctx: LoadContext<'_>) -> Result<Plugin, PluginError> {
        if ctx.disabled {
            let descriptor = Self::read(ctx.src_path)?;
            return Ok(Plugin::disabled(
                ctx.name,
                ctx.src_path,
                ctx.snapshot,
                ctx.description,
                descriptor.version,
                descriptor.api_version,
            ));
        }

        let mut cleanup = CleanupHandle::create(ctx.src_path, ctx.tmp_dir, ctx.name)?;
        match Self::load_server(&ctx, &cleanup) {
            Ok((descriptor, domain, scopes)) => Ok(Plugin::server(
                ctx.name,
                ctx.src_path,
                ctx.snapshot,
                ctx.description,
                descriptor,
                domain,
                scopes,
                cleanup,
            )),
            Err(err) => {
                let _ = cleanup.remove();
                Err(err)
            }
        }
    }
}

/// `.js` web UI assets. No code; the name is the file stem.
#[derive(Debug, Default)]
pub struct AssetProvider;

impl ArtifactProvider for AssetProvider {
    fn extension(&self) -> &'static str {
        "js"
    }

    fn load(&self, ctx: LoadContext<'_>) -> Result<Plugin, PluginError> {
        if ctx.disabled {
            return Ok(Plugin::disabled(
                ctx.name,
                ctx.src_path,
                ctx.snapshot,
                ctx.description,
                None,
                None,
            ));
        }
        Ok(Plugin::asset(
            ctx.name,
            ctx.src_path,
            ctx.snapshot,
            ctx.description,
        ))
    }
}

/// The providers a loader consults, in registration order.
#[derive(Clone)]
pub struct ProviderSet {
    providers: Vec<Arc<dyn ArtifactProvider>>,
}

impl Default for ProviderSet {
    fn default() -> Self {
        Self {
            providers: vec![Arc::new(ManifestProvider), Arc::new(AssetProvider)],
        }
    }
}

impl ProviderSet {
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    pub fn with(mut self, provider: impl ArtifactProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    /// Provider for `path`, ignoring a `.disabled` suffix.
    pub fn for_path(&self, path: &Path) -> Option<&dyn ArtifactProvider> {
        self.providers
            .iter()
            .find(|p| p.handles(path))
            .map(|p| p.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_match_on_the_active_extension() {
        let set = ProviderSet::default();
        assert_eq!(
            set.for_path(Path::new("a.plugin")).map(|p| p.extension()),
            Some("plugin")
        );
        assert_eq!(
            set.for_path(Path::new("a.js.disabled")).map(|p| p.extension()),
            Some("js")
        );
        assert!(set.for_path(Path::new("a.txt")).is_none());
        assert!(set.for_path(Path::new("a.disabled")).is_none());
    }
}
