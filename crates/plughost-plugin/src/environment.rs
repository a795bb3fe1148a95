// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The host environment plugin units are started in.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use plughost_core::{PluginError, ScopeKind};
use plughost_extension::{ExtensionRegistry, ReattachStats};
use tracing::debug;

use crate::code::CodeLibrary;
use crate::recording;
use crate::scope::Scope;
use crate::unit::Plugin;

/// Host scope keys never exported to plugins.
pub const DENIED_PREFIXES: [&str; 4] = ["framework.", "lifecycle.", "request.", "metrics."];

/// Host-side hooks notified after a unit starts, reloads or stops.
pub trait PluginObserver: Send + Sync {
    fn on_start(&self, _plugin: &Plugin) {}
    fn on_reload(&self, _old: &Plugin, _new: &Plugin) {}
    fn on_stop(&self, _plugin: &Plugin) {}
}

/// Registry, code library and host scopes shared by every unit.
pub struct PluginEnvironment {
    registry: Arc<ExtensionRegistry>,
    library: Arc<CodeLibrary>,
    host_scopes: BTreeMap<ScopeKind, Arc<Scope>>,
    observers: RwLock<Vec<Arc<dyn PluginObserver>>>,
}

impl PluginEnvironment {
    /// An environment with an empty `sys` scope and no subsystems.
    pub fn new(registry: Arc<ExtensionRegistry>, library: Arc<CodeLibrary>) -> Self {
        let mut host_scopes = BTreeMap::new();
        host_scopes.insert(ScopeKind::Sys, Arc::new(Scope::new("sys")));
        Self {
            registry,
            library,
            host_scopes,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Exposes a host scope to plugins, minus the denied keys.
    pub fn with_host_scope(mut self, kind: ScopeKind, scope: &Scope) -> Self {
        self.host_scopes
            .insert(kind, Arc::new(scope.filtered_copy(&DENIED_PREFIXES)));
        self
    }

    pub fn has_scope(&self, kind: ScopeKind) -> bool {
        self.host_scopes.contains_key(&kind)
    }

    pub fn scopes(&self) -> Vec<ScopeKind> {
        self.host_scopes.keys().copied().collect()
    }

    pub fn host_scope(&self, kind: ScopeKind) -> Option<Arc<Scope>> {
        self.host_scopes.get(&kind).cloned()
    }

    pub fn registry(&self) -> &Arc<ExtensionRegistry> {
        &self.registry
    }

    pub fn library(&self) -> &Arc<CodeLibrary> {
        &self.library
    }

    pub fn add_observer(&self, observer: Arc<dyn PluginObserver>) {
        self.observers.write().push(observer);
    }

    /// Attaches a freshly started unit's extensions.
    pub(crate) fn on_start_plugin(&self, plugin: &mut Plugin) -> Result<(), PluginError> {
        let bindings = plugin.take_pending();
        let handles = self.registry.attach_all(plugin.name(), bindings)?;
        debug!(plugin = plugin.name(), extensions = handles.len(), "attached extensions");
        plugin.set_handles(handles);
        for observer in self.observers.read().iter() {
            observer.on_start(plugin);
        }
        Ok(())
    }

    /// Moves `old`'s registrations over to `new`. On failure `old` keeps
    /// every registration it had.
    pub(crate) fn on_reload_plugin(
        &self,
        old: &mut Plugin,
        new: &mut Plugin,
    ) -> Result<ReattachStats, PluginError> {
        let mut handles = old.take_handles();
        let pending = new.take_pending();
        let name = new.name().to_string();
        match self.registry.reattach(&name, &mut handles, pending) {
            Ok(stats) => {
                new.set_handles(handles);
                recording::record_reattach(&stats);
                for observer in self.observers.read().iter() {
                    observer.on_reload(old, new);
                }
                Ok(stats)
            }
            Err(err) => {
                old.set_handles(handles);
                Err(err)
            }
        }
    }

    pub(crate) fn on_stop_plugin(&self, plugin: &Plugin) {
        for observer in self.observers.read().iter() {
            observer.on_stop(plugin);
        }
    }
}
