// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin units: one loaded artifact with its scopes, extensions and
//! lifecycle listeners.

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use plughost_core::{PluginDescription, PluginError, PluginState, ReloadMode, ScopeKind};
use plughost_extension::{Binding, BindingKey, Provider, RegistrationHandle};
use serde::Serialize;
use tracing::{debug, warn};

use crate::code::{CodeBundle, CodeDomain, ComponentSpec, Symbol};
use crate::contracts::{LifecycleListener, WEB_UI, WebUiPlugin};
use crate::discovery;
use crate::environment::PluginEnvironment;
use crate::manifest::PluginDescriptor;
use crate::module::{Binder, PluginModule, Wiring};
use crate::scope::{PLUGIN_DATA_DIR, PLUGIN_DESCRIPTION, PLUGIN_NAME, Scope};
use crate::snapshot::ArtifactSnapshot;

/// Serializable view of a plugin for listings and status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginInfo {
    pub name: String,
    pub version: Option<String>,
    pub api_version: Option<String>,
    pub state: PluginState,
    pub filename: String,
    pub index_url: String,
    pub disabled: bool,
}

/// A temporary copy of an artifact the unit was loaded from, held open while
/// the unit is alive.
#[derive(Debug)]
pub struct CleanupHandle {
    file: Option<File>,
    path: PathBuf,
}

impl CleanupHandle {
    /// Copies `src` to a fresh `plugin_<name>_*` file in `tmp_dir`.
    pub fn create(src: &Path, tmp_dir: &Path, name: &str) -> Result<Self, PluginError> {
        let suffix = src
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!("plugin_{name}_"))
            .suffix(&suffix)
            .tempfile_in(tmp_dir)
            .map_err(|e| PluginError::io(format!("cannot create temp copy in {}", tmp_dir.display()), e))?;
        let mut source = File::open(src)
            .map_err(|e| PluginError::io(format!("cannot open {}", src.display()), e))?;
        io::copy(&mut source, tmp.as_file_mut())
            .map_err(|e| PluginError::io(format!("cannot copy {}", src.display()), e))?;
        let (file, path) = tmp
            .keep()
            .map_err(|e| PluginError::io("cannot keep temp copy", e.error))?;
        Ok(Self {
            file: Some(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Releases the open handle to the copy.
    pub fn close(&mut self) {
        self.file = None;
    }

    /// Closes the copy and deletes it. A copy that is already gone counts as
    /// removed.
    pub fn remove(&mut self) -> io::Result<()> {
        self.file = None;
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

enum Body {
    Server {
        descriptor: PluginDescriptor,
        domain: CodeDomain,
        dependency_scopes: Vec<Arc<Scope>>,
    },
    Asset,
    /// A disabled artifact kept only so it can be listed and enabled.
    Inert,
}

/// One loaded plugin artifact.
pub struct Plugin {
    name: String,
    src_path: PathBuf,
    snapshot: ArtifactSnapshot,
    version: Option<String>,
    api_version: Option<String>,
    description: PluginDescription,
    state: PluginState,
    body: Body,
    handles: Vec<RegistrationHandle>,
    pending: Vec<Binding>,
    listeners: Vec<Arc<dyn LifecycleListener>>,
    scopes: BTreeMap<ScopeKind, Arc<Scope>>,
    cleanup: Option<CleanupHandle>,
    owns_points: bool,
}

impl Plugin {
    fn with_body(
        name: &str,
        src_path: &Path,
        snapshot: ArtifactSnapshot,
        description: PluginDescription,
        body: Body,
    ) -> Self {
        let state = match body {
            Body::Inert => PluginState::Disabled,
            _ => PluginState::Loading,
        };
        Self {
            name: name.to_string(),
            src_path: src_path.to_path_buf(),
            snapshot,
            version: None,
            api_version: None,
            description,
            state,
            body,
            handles: Vec::new(),
            pending: Vec::new(),
            listeners: Vec::new(),
            scopes: BTreeMap::new(),
            cleanup: None,
            owns_points: false,
        }
    }

    /// A server plugin resolved against its code domain.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn server(
        name: &str,
        src_path: &Path,
        snapshot: ArtifactSnapshot,
        description: PluginDescription,
        descriptor: PluginDescriptor,
        domain: CodeDomain,
        dependency_scopes: Vec<Arc<Scope>>,
        cleanup: CleanupHandle,
    ) -> Self {
        let version = descriptor.version.clone();
        let api_version = descriptor.api_version.clone();
        let mut plugin = Self::with_body(
            name,
            src_path,
            snapshot,
            description,
            Body::Server {
                descriptor,
                domain,
                dependency_scopes,
            },
        );
        plugin.version = version;
        plugin.api_version = api_version;
        plugin.cleanup = Some(cleanup);
        plugin
    }

    pub(crate) fn asset(
        name: &str,
        src_path: &Path,
        snapshot: ArtifactSnapshot,
        description: PluginDescription,
    ) -> Self {
        Self::with_body(name, src_path, snapshot, description, Body::Asset)
    }

    pub(crate) fn disabled(
        name: &str,
        src_path: &Path,
        snapshot: ArtifactSnapshot,
        description: PluginDescription,
        version: Option<String>,
        api_version: Option<String>,
    ) -> Self {
        let mut plugin = Self::with_body(name, src_path, snapshot, description, Body::Inert);
        plugin.version = version;
        plugin.api_version = api_version;
        plugin
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn src_path(&self) -> &Path {
        &self.src_path
    }

    pub fn snapshot(&self) -> &ArtifactSnapshot {
        &self.snapshot
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    pub fn api_version(&self) -> Option<&str> {
        self.api_version.as_deref()
    }

    pub fn description(&self) -> &PluginDescription {
        &self.description
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self.body, Body::Inert)
    }

    /// Units that extend the extension surface itself, or opt out, restart
    /// instead of reloading in place.
    pub fn can_reload(&self) -> bool {
        match &self.body {
            Body::Server { descriptor, .. } => {
                descriptor.api_module.is_none() && descriptor.reload == ReloadMode::Reload
            }
            Body::Asset => true,
            Body::Inert => false,
        }
    }

    pub fn registrations(&self) -> &[RegistrationHandle] {
        &self.handles
    }

    /// Scope a dependent unit inherits from.
    pub fn api_scope(&self) -> Option<Arc<Scope>> {
        self.scopes.get(&ScopeKind::Sys).cloned()
    }

    pub fn scope(&self, kind: ScopeKind) -> Option<Arc<Scope>> {
        self.scopes.get(&kind).cloned()
    }

    pub(crate) fn code_bundle(&self) -> Option<Arc<CodeBundle>> {
        match &self.body {
            Body::Server { domain, .. } => Some(Arc::clone(domain.own())),
            _ => None,
        }
    }

    pub fn cleanup_path(&self) -> Option<&Path> {
        self.cleanup.as_ref().map(CleanupHandle::path)
    }

    pub fn info(&self) -> PluginInfo {
        PluginInfo {
            name: self.name.clone(),
            version: self.version.clone(),
            api_version: self.api_version.clone(),
            state: self.state,
            filename: self
                .src_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
            index_url: self.description.canonical_web_url.clone(),
            disabled: self.is_disabled(),
        }
    }

    pub(crate) fn set_state(&mut self, state: PluginState) {
        self.state = state;
    }

    pub(crate) fn take_pending(&mut self) -> Vec<Binding> {
        std::mem::take(&mut self.pending)
    }

    pub(crate) fn take_handles(&mut self) -> Vec<RegistrationHandle> {
        std::mem::take(&mut self.handles)
    }

    pub(crate) fn set_handles(&mut self, handles: Vec<RegistrationHandle>) {
        self.handles = handles;
    }

    pub(crate) fn take_cleanup(&mut self) -> Option<CleanupHandle> {
        self.cleanup.take()
    }

    /// Builds the unit's scopes, runs its modules (or auto-discovery) and
    /// starts its lifecycle listeners. Extensions are collected but not yet
    /// attached.
    pub(crate) fn start(&mut self, env: &PluginEnvironment) -> Result<(), PluginError> {
        let mut wiring = Wiring::default();
        let result = match &self.body {
            Body::Server {
                descriptor,
                domain,
                dependency_scopes,
            } => self.wire_server(env, descriptor, domain, dependency_scopes, &mut wiring),
            Body::Asset => self.wire_asset(env, &mut wiring),
            Body::Inert => Err(PluginError::Internal(format!(
                "disabled plugin {} cannot be started",
                self.name
            ))),
        };
        self.owns_points = wiring.declared_points;
        let scopes = match result {
            Ok(scopes) => scopes,
            Err(err) => {
                self.retract_points(env);
                return Err(err);
            }
        };

        let mut started: Vec<Arc<dyn LifecycleListener>> = Vec::new();
        for listener in wiring.listeners {
            if let Err(err) = listener.start() {
                for done in started.iter().rev() {
                    done.stop();
                }
                self.retract_points(env);
                return Err(PluginError::Lifecycle {
                    plugin: self.name.clone(),
                    message: err.to_string(),
                });
            }
            started.push(listener);
        }

        self.listeners = started;
        self.pending = wiring.bindings;
        self.scopes = scopes;
        self.state = PluginState::Running;
        Ok(())
    }

    /// Detaches the unit's extensions, stops its listeners in reverse order
    /// and retracts any points it declared. Listener failures are logged.
    pub(crate) fn stop(&mut self, env: &PluginEnvironment) {
        self.state = PluginState::Unloading;
        for handle in self.handles.drain(..) {
            handle.remove();
        }
        self.pending.clear();
        for listener in self.listeners.drain(..).rev() {
            listener.stop();
        }
        self.retract_points(env);
        env.on_stop_plugin(self);
        self.scopes.clear();
    }

    fn retract_points(&mut self, env: &PluginEnvironment) {
        if std::mem::take(&mut self.owns_points) {
            env.registry().retract_owned(&self.name);
        }
    }

    fn base_scope(&self, kind: ScopeKind) -> Scope {
        let mut scope = Scope::new(format!("{}/{kind}", self.name));
        scope.insert(PLUGIN_NAME, self.name.clone());
        scope.insert(PLUGIN_DESCRIPTION, self.description.clone());
        scope.insert(PLUGIN_DATA_DIR, self.description.data_dir.clone());
        scope
    }

    fn wire_server(
        &self,
        env: &PluginEnvironment,
        descriptor: &PluginDescriptor,
        domain: &CodeDomain,
        dependency_scopes: &[Arc<Scope>],
        wiring: &mut Wiring,
    ) -> Result<BTreeMap<ScopeKind, Arc<Scope>>, PluginError> {
        let registry = env.registry();

        let mut sys = self.base_scope(ScopeKind::Sys);
        for parent in dependency_scopes {
            sys.add_parent(Arc::clone(parent));
        }
        if let Some(host) = env.host_scope(ScopeKind::Sys) {
            sys.add_parent(host);
        }

        if let Some(symbol) = &descriptor.api_module {
            let module = self.resolve_module(domain, symbol)?;
            let mut binder = Binder::new(
                &self.name,
                &self.src_path,
                ScopeKind::Sys,
                &mut sys,
                registry,
                wiring,
                true,
            );
            module.configure(&mut binder)?;
        }
        if let Some(symbol) = descriptor.modules.get(ScopeKind::Sys) {
            let module = self.resolve_module(domain, symbol)?;
            let mut binder = Binder::new(
                &self.name,
                &self.src_path,
                ScopeKind::Sys,
                &mut sys,
                registry,
                wiring,
                false,
            );
            module.configure(&mut binder)?;
        }

        let sys = Arc::new(sys);
        let mut scopes = BTreeMap::new();
        scopes.insert(ScopeKind::Sys, Arc::clone(&sys));

        for kind in [ScopeKind::Ssh, ScopeKind::Http] {
            let module = descriptor.modules.get(kind);
            let Some(host) = env.host_scope(kind) else {
                if let Some(symbol) = module {
                    warn!(plugin = %self.name, scope = %kind, module = symbol, "host has no such scope; module skipped");
                }
                continue;
            };
            let mut scope = self.base_scope(kind);
            scope.add_parent(Arc::clone(&sys));
            scope.add_parent(host);
            if let Some(symbol) = module {
                let module = self.resolve_module(domain, symbol)?;
                let mut binder = Binder::new(
                    &self.name,
                    &self.src_path,
                    kind,
                    &mut scope,
                    registry,
                    wiring,
                    false,
                );
                module.configure(&mut binder)?;
            }
            scopes.insert(kind, Arc::new(scope));
        }

        if !descriptor.has_explicit_modules() {
            self.discover(env, descriptor, domain, &scopes, wiring)?;
        }
        Ok(scopes)
    }

    fn discover(
        &self,
        env: &PluginEnvironment,
        descriptor: &PluginDescriptor,
        domain: &CodeDomain,
        scopes: &BTreeMap<ScopeKind, Arc<Scope>>,
        wiring: &mut Wiring,
    ) -> Result<(), PluginError> {
        let candidates: Vec<(&str, &ComponentSpec)> = if descriptor.classes.is_empty() {
            domain.own().components().collect()
        } else {
            descriptor
                .classes
                .iter()
                .map(|class| match domain.resolve(class) {
                    Some(Symbol::Component(spec)) => Ok((class.as_str(), spec)),
                    Some(Symbol::Module(_)) => Err(PluginError::invalid(
                        &self.src_path,
                        format!("class {class} is a module, not a component"),
                    )),
                    None => Err(PluginError::invalid(
                        &self.src_path,
                        format!("class {class} cannot be resolved"),
                    )),
                })
                .collect::<Result<_, _>>()?
        };

        for (class, spec) in candidates {
            let Some(target) = discovery::classify(class, spec, env.registry(), &self.src_path)?
            else {
                warn!(plugin = %self.name, class, contract = %spec.contract, "host does not serve this contract; class skipped");
                continue;
            };
            let Some(scope) = scopes.get(&target.scope) else {
                warn!(plugin = %self.name, class, scope = %target.scope, "host has no such scope; class skipped");
                continue;
            };
            let provider = spec.instantiate(scope)?;
            let mut binding =
                Binding::from_erased(target.scope, target.contract, target.key, provider);
            if let Some(export) = target.export {
                binding = binding.with_export(export);
            }
            debug!(plugin = %self.name, class, "discovered extension");
            wiring.push(&self.name, &self.src_path, env.registry(), binding)?;
        }
        Ok(())
    }

    fn wire_asset(
        &self,
        env: &PluginEnvironment,
        wiring: &mut Wiring,
    ) -> Result<BTreeMap<ScopeKind, Arc<Scope>>, PluginError> {
        let mut scopes = BTreeMap::new();
        let sys = Arc::new(self.base_scope(ScopeKind::Sys));
        scopes.insert(ScopeKind::Sys, sys);

        if env.has_scope(ScopeKind::Http)
            && env.registry().cardinality_of(ScopeKind::Http, WEB_UI).is_some()
        {
            let file = self
                .src_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default();
            let asset: Arc<dyn WebUiPlugin> = Arc::new(JsAsset {
                plugin: self.name.clone(),
                url: format!(
                    "{}/static/{file}",
                    self.description.canonical_web_url.trim_end_matches('/')
                ),
            });
            let binding = Binding::new(
                ScopeKind::Http,
                WEB_UI,
                BindingKey::named(&self.name),
                Provider::instance(asset),
            );
            wiring.push(&self.name, &self.src_path, env.registry(), binding)?;
        }
        Ok(scopes)
    }

    fn resolve_module(
        &self,
        domain: &CodeDomain,
        symbol: &str,
    ) -> Result<Arc<dyn PluginModule>, PluginError> {
        match domain.resolve(symbol) {
            Some(Symbol::Module(module)) => Ok(Arc::clone(module)),
            Some(Symbol::Component(_)) => Err(PluginError::invalid(
                &self.src_path,
                format!("{symbol} is a component, not a module"),
            )),
            None => Err(PluginError::invalid(
                &self.src_path,
                format!("module {symbol} cannot be resolved"),
            )),
        }
    }
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("src_path", &self.src_path)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("handles", &self.handles.len())
            .finish()
    }
}

/// Web UI entry contributed by a `.js` asset plugin.
struct JsAsset {
    plugin: String,
    url: String,
}

impl WebUiPlugin for JsAsset {
    fn plugin_name(&self) -> &str {
        &self.plugin
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_copy_is_removed_once() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("hello.plugin");
        std::fs::write(&src, "[plugin]\nname = \"hello\"\n").unwrap();
        let tmp = dir.path().join("tmp");
        std::fs::create_dir(&tmp).unwrap();

        let mut handle = CleanupHandle::create(&src, &tmp, "hello").unwrap();
        let name = handle.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("plugin_hello_"));
        assert!(name.ends_with(".plugin"));
        assert_eq!(
            std::fs::read_to_string(handle.path()).unwrap(),
            "[plugin]\nname = \"hello\"\n"
        );

        handle.remove().unwrap();
        assert!(!handle.path().exists());
        handle.remove().unwrap();
    }

    #[test]
    fn cleanup_fails_while_path_is_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.plugin");
        std::fs::write(&src, "x").unwrap();
        let mut handle = CleanupHandle::create(&src, dir.path(), "a").unwrap();
        std::fs::remove_file(handle.path()).unwrap();
        std::fs::create_dir(handle.path()).unwrap();
        assert!(handle.remove().is_err());
        std::fs::remove_dir(handle.path()).unwrap();
        handle.remove().unwrap();
    }
}
