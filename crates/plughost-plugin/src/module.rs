// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin modules and the binder they configure a scope through.

use std::any::Any;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use plughost_core::{PluginError, ScopeKind};
use plughost_extension::{
    Binding, BindingKey, Cardinality, ExtensionPoint, ExtensionRegistry, Provider,
};

use crate::contracts::LifecycleListener;
use crate::scope::Scope;

/// A unit of plugin wiring run once per scope while the unit starts.
pub trait PluginModule: Send + Sync {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), PluginError>;
}

/// Everything a unit's modules and discovery produced, collected across
/// scopes and handed to the registry in one batch.
#[derive(Default)]
pub(crate) struct Wiring {
    pub(crate) bindings: Vec<Binding>,
    pub(crate) listeners: Vec<Arc<dyn LifecycleListener>>,
    seen: HashSet<(ScopeKind, String, BindingKey)>,
    pub(crate) declared_points: bool,
}

impl Wiring {
    pub(crate) fn push(
        &mut self,
        plugin: &str,
        src: &Path,
        registry: &ExtensionRegistry,
        binding: Binding,
    ) -> Result<(), PluginError> {
        let cardinality = registry
            .cardinality_of(binding.scope, &binding.contract)
            .ok_or_else(|| PluginError::UnknownExtensionPoint {
                scope: binding.scope.to_string(),
                contract: binding.contract.clone(),
            })?;
        if cardinality == Cardinality::Map && binding.export.is_none() {
            return Err(PluginError::invalid(
                src,
                format!("binding for map point {} needs an export name", binding.contract),
            ));
        }
        if !self
            .seen
            .insert((binding.scope, binding.contract.clone(), binding.key.clone()))
        {
            return Err(PluginError::DuplicateProvider {
                plugin: plugin.to_string(),
                contract: binding.contract,
                key: binding.key.to_string(),
            });
        }
        self.bindings.push(binding);
        Ok(())
    }
}

/// Handed to [`PluginModule::configure`]. Binds singletons into the unit's
/// scope and collects extension bindings for the registry.
pub struct Binder<'a> {
    plugin: &'a str,
    src: &'a Path,
    kind: ScopeKind,
    scope: &'a mut Scope,
    registry: &'a ExtensionRegistry,
    wiring: &'a mut Wiring,
    api: bool,
}

impl<'a> Binder<'a> {
    pub(crate) fn new(
        plugin: &'a str,
        src: &'a Path,
        kind: ScopeKind,
        scope: &'a mut Scope,
        registry: &'a ExtensionRegistry,
        wiring: &'a mut Wiring,
        api: bool,
    ) -> Self {
        Self {
            plugin,
            src,
            kind,
            scope,
            registry,
            wiring,
            api,
        }
    }

    pub fn plugin_name(&self) -> &str {
        self.plugin
    }

    pub fn scope_kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn scope(&self) -> &Scope {
        self.scope
    }

    /// Looks up a singleton visible from this scope.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        self.scope.get(key)
    }

    pub fn bind_singleton<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.scope.insert(key, value);
    }

    /// Registers `provider` for `contract` in this scope.
    pub fn bind<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
        key: BindingKey,
        export: Option<&str>,
        provider: Provider<T>,
    ) -> Result<(), PluginError> {
        let mut binding = Binding::new(self.kind, contract, key, provider);
        if let Some(export) = export {
            binding = binding.with_export(export);
        }
        self.push(binding)
    }

    /// Binds a single named instance.
    pub fn bind_instance<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
        name: &str,
        value: Arc<T>,
    ) -> Result<(), PluginError> {
        self.bind(contract, BindingKey::named(name), None, Provider::instance(value))
    }

    /// Registers `value` under `export` in a map point.
    pub fn export<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
        export: &str,
        value: Arc<T>,
    ) -> Result<(), PluginError> {
        self.bind(
            contract,
            BindingKey::named(export),
            Some(export),
            Provider::instance(value),
        )
    }

    /// Adds `value` to a set point under a fresh generated key.
    pub fn listen<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
        value: Arc<T>,
    ) -> Result<(), PluginError> {
        self.bind(contract, BindingKey::generated(), None, Provider::instance(value))
    }

    pub fn add_listener(&mut self, listener: impl LifecycleListener + 'static) {
        self.wiring.listeners.push(Arc::new(listener));
    }

    pub fn declare_item<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(contract, Cardinality::Item)
    }

    pub fn declare_set<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(contract, Cardinality::Set)
    }

    pub fn declare_map<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(contract, Cardinality::Map)
    }

    /// Declares a new point owned by this plugin. Only the API module may.
    fn declare<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        contract: &str,
        cardinality: Cardinality,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        if !self.api {
            return Err(PluginError::invalid(
                self.src,
                format!("only the api module may declare extension point {contract}"),
            ));
        }
        let point = self
            .registry
            .declare_owned::<T>(self.plugin, self.kind, contract, cardinality)?;
        self.wiring.declared_points = true;
        Ok(point)
    }

    fn push(&mut self, binding: Binding) -> Result<(), PluginError> {
        self.wiring.push(self.plugin, self.src, self.registry, binding)
    }
}
