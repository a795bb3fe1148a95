// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code bundles and per-unit symbol resolution.
//!
//! The host links every plugin's code in at build time and registers it in a
//! [`CodeLibrary`] under a bundle id. A unit resolves symbols through its
//! [`CodeDomain`]: its own bundle, then the bundles of the plugins it depends
//! on, then the host bundle, filtered by the unit's API type.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use plughost_core::{ApiType, PluginError};
use plughost_extension::{ErasedProvider, Provider};

use crate::module::PluginModule;
use crate::scope::Scope;

/// Prefix of the host symbols `extension` units may see.
pub const API_PREFIX: &str = "api.";
/// Prefix of symbols that never leave their bundle.
pub const INTERNAL_PREFIX: &str = "internal.";

type Factory = Arc<dyn Fn(&Scope) -> Result<ErasedProvider, PluginError> + Send + Sync>;

/// How an auto-discovered component asks to be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    /// Join a set (or replace an item) point.
    Listen,
    /// Register under an export name in a map point.
    Export(String),
}

/// A component offered to auto-discovery: what contract it implements, how
/// it is marked, and how to build it.
#[derive(Clone)]
pub struct ComponentSpec {
    pub contract: String,
    pub marker: Marker,
    /// Optional stable binding name.
    pub name: Option<String>,
    factory: Factory,
}

impl ComponentSpec {
    pub fn new<T: ?Sized + Send + Sync + 'static>(
        contract: impl Into<String>,
        marker: Marker,
        factory: impl Fn(&Scope) -> Result<Arc<T>, PluginError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            contract: contract.into(),
            marker,
            name: None,
            factory: Arc::new(move |scope| {
                factory(scope).map(|value| ErasedProvider::new(Provider::instance(value)))
            }),
        }
    }

    pub fn listen<T: ?Sized + Send + Sync + 'static>(
        contract: impl Into<String>,
        factory: impl Fn(&Scope) -> Result<Arc<T>, PluginError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(contract, Marker::Listen, factory)
    }

    pub fn export<T: ?Sized + Send + Sync + 'static>(
        contract: impl Into<String>,
        export: impl Into<String>,
        factory: impl Fn(&Scope) -> Result<Arc<T>, PluginError> + Send + Sync + 'static,
    ) -> Self {
        Self::new(contract, Marker::Export(export.into()), factory)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn instantiate(&self, scope: &Scope) -> Result<ErasedProvider, PluginError> {
        (self.factory)(scope)
    }
}

impl fmt::Debug for ComponentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentSpec")
            .field("contract", &self.contract)
            .field("marker", &self.marker)
            .field("name", &self.name)
            .finish()
    }
}

#[derive(Clone)]
pub enum Symbol {
    Module(Arc<dyn PluginModule>),
    Component(ComponentSpec),
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Module(_) => f.write_str("Module"),
            Symbol::Component(spec) => spec.fmt(f),
        }
    }
}

/// The symbol table of one build-time code bundle.
#[derive(Debug, Clone, Default)]
pub struct CodeBundle {
    id: String,
    symbols: BTreeMap<String, Symbol>,
}

impl CodeBundle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbols: BTreeMap::new(),
        }
    }

    pub fn module(mut self, name: impl Into<String>, module: impl PluginModule + 'static) -> Self {
        self.symbols
            .insert(name.into(), Symbol::Module(Arc::new(module)));
        self
    }

    pub fn component(mut self, name: impl Into<String>, spec: ComponentSpec) -> Self {
        self.symbols.insert(name.into(), Symbol::Component(spec));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn get(&self, symbol: &str) -> Option<&Symbol> {
        self.symbols.get(symbol)
    }

    /// Components in symbol-name order.
    pub fn components(&self) -> impl Iterator<Item = (&str, &ComponentSpec)> {
        self.symbols.iter().filter_map(|(name, sym)| match sym {
            Symbol::Component(spec) => Some((name.as_str(), spec)),
            Symbol::Module(_) => None,
        })
    }
}

/// Every code bundle linked into the host.
#[derive(Debug, Clone)]
pub struct CodeLibrary {
    host: Arc<CodeBundle>,
    bundles: HashMap<String, Arc<CodeBundle>>,
}

impl Default for CodeLibrary {
    fn default() -> Self {
        Self::new(CodeBundle::new("host"))
    }
}

impl CodeLibrary {
    pub fn new(host: CodeBundle) -> Self {
        Self {
            host: Arc::new(host),
            bundles: HashMap::new(),
        }
    }

    pub fn with_bundle(mut self, bundle: CodeBundle) -> Self {
        self.bundles
            .insert(bundle.id.clone(), Arc::new(bundle));
        self
    }

    pub fn bundle(&self, id: &str) -> Option<Arc<CodeBundle>> {
        self.bundles.get(id).cloned()
    }

    pub fn host(&self) -> Arc<CodeBundle> {
        Arc::clone(&self.host)
    }
}

/// True when a symbol may be seen from outside its bundle.
pub fn is_exported(symbol: &str) -> bool {
    !symbol.starts_with(INTERNAL_PREFIX)
}

fn host_visible(api_type: ApiType, symbol: &str) -> bool {
    is_exported(symbol) && (api_type != ApiType::Extension || symbol.starts_with(API_PREFIX))
}

/// Ordered symbol-resolution sources of one unit.
#[derive(Debug, Clone)]
pub struct CodeDomain {
    api_type: ApiType,
    own: Arc<CodeBundle>,
    dependencies: Vec<(String, Arc<CodeBundle>)>,
    host: Arc<CodeBundle>,
}

impl CodeDomain {
    pub fn new(
        api_type: ApiType,
        own: Arc<CodeBundle>,
        dependencies: Vec<(String, Arc<CodeBundle>)>,
        host: Arc<CodeBundle>,
    ) -> Self {
        Self {
            api_type,
            own,
            dependencies,
            host,
        }
    }

    pub fn resolve(&self, symbol: &str) -> Option<&Symbol> {
        if let Some(found) = self.own.get(symbol) {
            return Some(found);
        }
        if is_exported(symbol) {
            for (_, bundle) in &self.dependencies {
                if let Some(found) = bundle.get(symbol) {
                    return Some(found);
                }
            }
        }
        if host_visible(self.api_type, symbol) {
            return self.host.get(symbol);
        }
        None
    }

    pub fn own(&self) -> &Arc<CodeBundle> {
        &self.own
    }

    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.dependencies.iter().map(|(name, _)| name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl PluginModule for Noop {
        fn configure(&self, _: &mut crate::module::Binder<'_>) -> Result<(), PluginError> {
            Ok(())
        }
    }

    fn domain(api_type: ApiType) -> CodeDomain {
        let own = CodeBundle::new("own").module("Shared", Noop).module("Own", Noop);
        let dep = CodeBundle::new("dep")
            .module("Shared", Noop)
            .module("DepOnly", Noop)
            .module("internal.Secret", Noop);
        let host = CodeBundle::new("host")
            .module("api.Greeting", Noop)
            .module("HostModule", Noop)
            .module("internal.Db", Noop);
        CodeDomain::new(
            api_type,
            Arc::new(own),
            vec![("dep".into(), Arc::new(dep))],
            Arc::new(host),
        )
    }

    #[test]
    fn own_bundle_wins() {
        let d = domain(ApiType::Plugin);
        assert!(d.resolve("Shared").is_some());
        assert!(d.resolve("Own").is_some());
        assert!(d.resolve("DepOnly").is_some());
    }

    #[test]
    fn internal_symbols_are_never_exported() {
        let d = domain(ApiType::Plugin);
        assert!(d.resolve("internal.Secret").is_none());
        assert!(d.resolve("internal.Db").is_none());
    }

    #[test]
    fn extension_units_only_see_the_api() {
        let d = domain(ApiType::Extension);
        assert!(d.resolve("api.Greeting").is_some());
        assert!(d.resolve("HostModule").is_none());

        let d = domain(ApiType::Plugin);
        assert!(d.resolve("HostModule").is_some());
    }
}
