// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A loader over a scratch directory, wired the way the host wires it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plughost_core::{PluginError, ScopeKind};
use plughost_extension::{ExtensionPoint, ExtensionRegistry};
use plughost_plugin::contracts;
use plughost_plugin::{
    CodeBundle, CodeLibrary, LoaderConfig, PluginAdmin, PluginEnvironment, PluginLoader, Scope,
};
use tempfile::TempDir;

use crate::sample::{DEFAULT_GREETER, GREETERS, Greeter};

/// Builder for [`TestHost`].
pub struct TestHostBuilder {
    library: CodeLibrary,
    mandatory: Vec<String>,
    remote_admin: bool,
    scopes: Vec<ScopeKind>,
    host_sys: Scope,
}

impl TestHostBuilder {
    fn new() -> Self {
        Self {
            library: CodeLibrary::default(),
            mandatory: Vec::new(),
            remote_admin: true,
            scopes: ScopeKind::ALL.to_vec(),
            host_sys: Scope::new("sys"),
        }
    }

    pub fn with_bundle(mut self, bundle: CodeBundle) -> Self {
        self.library = self.library.with_bundle(bundle);
        self
    }

    /// Replaces the whole code library, host bundle included.
    pub fn with_library(mut self, library: CodeLibrary) -> Self {
        self.library = library;
        self
    }

    pub fn with_mandatory(mut self, name: impl Into<String>) -> Self {
        self.mandatory.push(name.into());
        self
    }

    pub fn with_remote_admin(mut self, allowed: bool) -> Self {
        self.remote_admin = allowed;
        self
    }

    /// Host subsystems; `sys` is always present.
    pub fn with_scopes(mut self, scopes: &[ScopeKind]) -> Self {
        self.scopes = scopes.to_vec();
        self
    }

    /// Host `sys` scope exported (filtered) to plugins.
    pub fn with_host_sys(mut self, scope: Scope) -> Self {
        self.host_sys = scope;
        self
    }

    pub fn build(self) -> Result<TestHost, PluginError> {
        let dir = TempDir::new().map_err(|e| PluginError::io("cannot create test dir", e))?;
        let plugins_dir = dir.path().join("plugins");
        let tmp_dir = dir.path().join("tmp");

        let registry = Arc::new(ExtensionRegistry::new());
        contracts::declare_host_points(&registry, &self.scopes)?;
        registry.declare_map::<dyn Greeter>(ScopeKind::Sys, GREETERS)?;
        registry.declare_item::<dyn Greeter>(ScopeKind::Sys, DEFAULT_GREETER)?;

        let mut env = PluginEnvironment::new(Arc::clone(&registry), Arc::new(self.library))
            .with_host_scope(ScopeKind::Sys, &self.host_sys);
        for kind in self.scopes.iter().filter(|k| **k != ScopeKind::Sys) {
            env = env.with_host_scope(*kind, &Scope::new(kind.to_string()));
        }

        let config = LoaderConfig {
            plugins_dir: plugins_dir.clone(),
            data_dir: dir.path().join("data"),
            tmp_dir: tmp_dir.clone(),
            canonical_web_url: None,
            allow_remote_admin: self.remote_admin,
            mandatory: self.mandatory.into_iter().collect(),
        };
        std::fs::create_dir_all(&plugins_dir)
            .map_err(|e| PluginError::io("cannot create plugins dir", e))?;
        std::fs::create_dir_all(&tmp_dir).map_err(|e| PluginError::io("cannot create tmp dir", e))?;

        Ok(TestHost {
            loader: Arc::new(PluginLoader::new(config, Arc::new(env))),
            registry,
            plugins_dir,
            tmp_dir,
            _dir: dir,
        })
    }
}

/// A plugin host over a scratch directory.
pub struct TestHost {
    pub loader: Arc<PluginLoader>,
    pub registry: Arc<ExtensionRegistry>,
    plugins_dir: PathBuf,
    tmp_dir: PathBuf,
    _dir: TempDir,
}

impl TestHost {
    pub fn builder() -> TestHostBuilder {
        TestHostBuilder::new()
    }

    pub fn plugins_dir(&self) -> &Path {
        &self.plugins_dir
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn admin(&self) -> PluginAdmin {
        PluginAdmin::new(Arc::clone(&self.loader))
    }

    /// Writes `content` as `file` in the plugins directory.
    pub fn write(&self, file: &str, content: &str) -> PathBuf {
        let path = self.plugins_dir.join(file);
        if let Err(e) = std::fs::write(&path, content) {
            panic!("cannot write {}: {e}", path.display());
        }
        path
    }

    pub fn exists(&self, file: &str) -> bool {
        self.plugins_dir.join(file).exists()
    }

    pub fn greeters(&self) -> ExtensionPoint<dyn Greeter> {
        match self.registry.point::<dyn Greeter>(ScopeKind::Sys, GREETERS) {
            Some(point) => point,
            None => panic!("greeters point not declared"),
        }
    }

    /// Greets `who` through the greeter exported as `export`.
    pub fn greet(&self, export: &str, who: &str) -> Option<String> {
        self.greeters().lookup(export).map(|e| e.get().greet(who))
    }

    /// Temp copies currently in the temp directory.
    pub fn temp_copies(&self) -> Vec<PathBuf> {
        let mut out: Vec<PathBuf> = std::fs::read_dir(&self.tmp_dir)
            .map(|entries| entries.flatten().map(|e| e.path()).collect())
            .unwrap_or_default();
        out.sort();
        out
    }
}
