// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The registry of declared extension points.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use plughost_core::{PluginError, ScopeKind};
use tracing::{debug, info};

use crate::binding::Binding;
use crate::handle::RegistrationHandle;
use crate::point::{Cardinality, ErasedPoint, ExtensionPoint, PointInner};

type PointKey = (ScopeKind, String);

/// Summary of a declared point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointInfo {
    pub scope: ScopeKind,
    pub contract: String,
    pub cardinality: Cardinality,
    pub type_name: &'static str,
    pub owner: Option<String>,
}

/// Counts from one [`ExtensionRegistry::reattach`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReattachStats {
    /// Old registrations whose provider was swapped in place.
    pub swapped: usize,
    /// New registrations with no stable counterpart.
    pub attached: usize,
    /// Old registrations that had no counterpart and were removed.
    pub detached: usize,
}

enum Step {
    Swap(usize, Binding),
    Fresh(Arc<dyn ErasedPoint>, Binding),
}

/// All extension points known to the host.
///
/// Lookups load the point table without locking. Declarations and every
/// multi-point mutation (attach batches, reattach, detach) are serialized by
/// one writer lock so their validation and application see the same state.
pub struct ExtensionRegistry {
    points: ArcSwap<HashMap<PointKey, Arc<dyn ErasedPoint>>>,
    write: Mutex<()>,
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self {
            points: ArcSwap::from_pointee(HashMap::new()),
            write: Mutex::new(()),
        }
    }

    /// Declares a point owned by the host.
    ///
    /// Declaring the same point again with the same type and cardinality
    /// returns the existing point.
    pub fn declare<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
        cardinality: Cardinality,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare_inner(scope, contract, cardinality, None)
    }

    /// Declares a point owned by a plugin's API module. It is removed by
    /// [`ExtensionRegistry::retract_owned`] when that plugin goes away.
    pub fn declare_owned<T: ?Sized + Send + Sync + 'static>(
        &self,
        owner: &str,
        scope: ScopeKind,
        contract: &str,
        cardinality: Cardinality,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare_inner(scope, contract, cardinality, Some(owner.to_string()))
    }

    pub fn declare_item<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(scope, contract, Cardinality::Item)
    }

    pub fn declare_set<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(scope, contract, Cardinality::Set)
    }

    pub fn declare_map<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        self.declare(scope, contract, Cardinality::Map)
    }

    fn declare_inner<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
        cardinality: Cardinality,
        owner: Option<String>,
    ) -> Result<ExtensionPoint<T>, PluginError> {
        let _guard = self.write.lock();
        let key = (scope, contract.to_string());

        if let Some(existing) = self.points.load().get(&key) {
            let existing_cardinality = existing.cardinality();
            let existing_type = existing.type_name();
            return match Arc::clone(existing).into_any().downcast::<PointInner<T>>() {
                Ok(inner) if existing_cardinality == cardinality => {
                    Ok(ExtensionPoint::from_inner(inner))
                }
                _ => Err(PluginError::Config(format!(
                    "extension point {contract} in scope {scope} is already declared as \
                     {existing_cardinality} of {existing_type}"
                ))),
            };
        }

        let point = ExtensionPoint::<T>::new(scope, contract, cardinality, owner);
        let mut next = HashMap::clone(&self.points.load());
        next.insert(key, point.erased());
        self.points.store(Arc::new(next));
        debug!(scope = %scope, contract, cardinality = %cardinality, "declared extension point");
        Ok(point)
    }

    /// The typed point declared under `(scope, contract)`, if its type is `T`.
    pub fn point<T: ?Sized + Send + Sync + 'static>(
        &self,
        scope: ScopeKind,
        contract: &str,
    ) -> Option<ExtensionPoint<T>> {
        let points = self.points.load();
        let erased = points.get(&(scope, contract.to_string()))?;
        Arc::clone(erased)
            .into_any()
            .downcast::<PointInner<T>>()
            .ok()
            .map(ExtensionPoint::from_inner)
    }

    pub fn cardinality_of(&self, scope: ScopeKind, contract: &str) -> Option<Cardinality> {
        self.points
            .load()
            .get(&(scope, contract.to_string()))
            .map(|p| p.cardinality())
    }

    /// Every declared point, ordered by scope then contract.
    pub fn points(&self) -> Vec<PointInfo> {
        let mut out: Vec<PointInfo> = self
            .points
            .load()
            .values()
            .map(|p| PointInfo {
                scope: p.scope(),
                contract: p.contract().to_string(),
                cardinality: p.cardinality(),
                type_name: p.type_name(),
                owner: p.owner().map(str::to_string),
            })
            .collect();
        out.sort_by(|a, b| (a.scope, &a.contract).cmp(&(b.scope, &b.contract)));
        out
    }

    fn resolve(&self, binding: &Binding) -> Result<Arc<dyn ErasedPoint>, PluginError> {
        let point = self
            .points
            .load()
            .get(&(binding.scope, binding.contract.clone()))
            .cloned()
            .ok_or_else(|| PluginError::UnknownExtensionPoint {
                scope: binding.scope.to_string(),
                contract: binding.contract.clone(),
            })?;
        if !point.accepts(&binding.provider) {
            return Err(PluginError::ContractMismatch {
                contract: binding.contract.clone(),
                expected: point.type_name().to_string(),
                actual: binding.provider_type().to_string(),
            });
        }
        Ok(point)
    }

    /// Registers one extension on behalf of `plugin`.
    pub fn attach(&self, plugin: &str, binding: Binding) -> Result<RegistrationHandle, PluginError> {
        let _guard = self.write.lock();
        let point = self.resolve(&binding)?;
        point.attach(plugin, binding)
    }

    /// Registers a batch of extensions for `plugin`, all or nothing.
    pub fn attach_all(
        &self,
        plugin: &str,
        bindings: Vec<Binding>,
    ) -> Result<Vec<RegistrationHandle>, PluginError> {
        let mut handles = Vec::new();
        let stats = self.reattach(plugin, &mut handles, bindings)?;
        debug_assert_eq!(stats.swapped + stats.detached, 0);
        Ok(handles)
    }

    /// Replaces a plugin's registrations with a new set.
    ///
    /// Each new binding with a stable key is matched against an unconsumed old
    /// handle with the same scope, contract, key and export name; a match
    /// keeps the old registration and swaps its provider, so consumers holding
    /// it observe the new implementation. Unmatched bindings are attached
    /// fresh and unmatched old handles are removed.
    ///
    /// Everything is validated before anything changes. On success `handles`
    /// holds the new registrations; on error it is left untouched.
    pub fn reattach(
        &self,
        plugin: &str,
        handles: &mut Vec<RegistrationHandle>,
        bindings: Vec<Binding>,
    ) -> Result<ReattachStats, PluginError> {
        let _guard = self.write.lock();

        let mut consumed = vec![false; handles.len()];
        let mut exports: HashSet<(ScopeKind, String, String)> = HashSet::new();
        let mut steps = Vec::with_capacity(bindings.len());

        for binding in bindings {
            let point = self.resolve(&binding)?;
            if let Some(export) = &binding.export
                && !exports.insert((binding.scope, binding.contract.clone(), export.clone()))
            {
                return Err(PluginError::AmbiguousExportName {
                    contract: binding.contract.clone(),
                    export: export.clone(),
                    existing: plugin.to_string(),
                    plugin: plugin.to_string(),
                });
            }

            let matched = handles.iter().enumerate().position(|(i, h)| {
                !consumed[i]
                    && h.accepts(&binding.provider)
                    && binding.same_identity(
                        h.scope(),
                        h.contract(),
                        h.binding_key(),
                        h.export_name(),
                    )
            });
            match matched {
                Some(i) => {
                    consumed[i] = true;
                    steps.push(Step::Swap(i, binding));
                }
                None => steps.push(Step::Fresh(point, binding)),
            }
        }

        let freed: HashSet<u64> = handles
            .iter()
            .zip(&consumed)
            .filter(|&(_, &c)| !c)
            .map(|(h, _)| h.slot_id())
            .collect();
        for step in &steps {
            if let Step::Fresh(point, binding) = step {
                point.check(plugin, binding.export.as_deref(), &freed)?;
            }
        }

        // Validated; apply.
        let mut old: Vec<Option<RegistrationHandle>> = handles.drain(..).map(Some).collect();
        let mut stats = ReattachStats::default();

        for (slot, used) in old.iter_mut().zip(&consumed) {
            if !used && let Some(handle) = slot.take() {
                handle.remove();
                stats.detached += 1;
            }
        }

        let mut next = Vec::with_capacity(steps.len());
        for step in steps {
            match step {
                Step::Swap(i, binding) => {
                    let Some(handle) = old[i].take() else {
                        return Err(PluginError::Internal(format!(
                            "registration {i} of plugin {plugin} matched twice"
                        )));
                    };
                    handle.replace(binding.provider)?;
                    stats.swapped += 1;
                    next.push(handle);
                }
                Step::Fresh(point, binding) => {
                    next.push(point.attach(plugin, binding)?);
                    stats.attached += 1;
                }
            }
        }
        *handles = next;

        if stats.swapped + stats.detached > 0 {
            info!(
                plugin,
                swapped = stats.swapped,
                attached = stats.attached,
                detached = stats.detached,
                "reattached extensions"
            );
        }
        Ok(stats)
    }

    /// Removes every registration owned by `plugin`.
    pub fn detach_all(&self, plugin: &str) -> usize {
        let _guard = self.write.lock();
        let removed: usize = self
            .points
            .load()
            .values()
            .map(|p| p.detach_plugin(plugin))
            .sum();
        if removed > 0 {
            debug!(plugin, removed, "detached all extensions");
        }
        removed
    }

    /// Removes the points declared by `owner`, detaching whatever was
    /// registered into them.
    pub fn retract_owned(&self, owner: &str) -> usize {
        let _guard = self.write.lock();
        let current = self.points.load();
        let (gone, kept): (HashMap<_, _>, HashMap<_, _>) = current
            .iter()
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .partition(|(_, p)| p.owner() == Some(owner));
        if gone.is_empty() {
            return 0;
        }
        for point in gone.values() {
            point.clear();
        }
        self.points.store(Arc::new(kept));
        info!(plugin = owner, points = gone.len(), "retracted extension points");
        gone.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{BindingKey, Provider};

    fn text(s: &'static str) -> Provider<str> {
        Provider::from_fn(move || Arc::from(s))
    }

    fn item(key: BindingKey, s: &'static str) -> Binding {
        Binding::new(ScopeKind::Sys, "greeting", key, text(s))
    }

    #[test]
    fn declaring_twice_returns_the_same_point() {
        let reg = ExtensionRegistry::new();
        let a = reg.declare_set::<str>(ScopeKind::Sys, "listeners").unwrap();
        let b = reg.declare_set::<str>(ScopeKind::Sys, "listeners").unwrap();
        a.register("host", BindingKey::generated(), None, text("x"))
            .unwrap();
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn redeclaring_with_another_shape_fails() {
        let reg = ExtensionRegistry::new();
        reg.declare_set::<str>(ScopeKind::Sys, "listeners").unwrap();
        assert!(reg.declare_map::<str>(ScopeKind::Sys, "listeners").is_err());
        assert!(reg.declare_set::<u32>(ScopeKind::Sys, "listeners").is_err());
    }

    #[test]
    fn attach_to_unknown_point_fails() {
        let reg = ExtensionRegistry::new();
        let err = reg.attach("a", item(BindingKey::generated(), "x")).unwrap_err();
        assert!(matches!(err, PluginError::UnknownExtensionPoint { .. }));
    }

    #[test]
    fn attach_with_wrong_type_fails() {
        let reg = ExtensionRegistry::new();
        reg.declare_item::<u32>(ScopeKind::Sys, "greeting").unwrap();
        let err = reg.attach("a", item(BindingKey::generated(), "x")).unwrap_err();
        assert!(matches!(err, PluginError::ContractMismatch { .. }));
    }

    #[test]
    fn attach_all_is_all_or_nothing() {
        let reg = ExtensionRegistry::new();
        let map = reg.declare_map::<str>(ScopeKind::Ssh, "commands").unwrap();
        map.register("other", BindingKey::named("ls"), Some("ls".into()), text("other"))
            .unwrap();

        let batch = vec![
            Binding::new(ScopeKind::Ssh, "commands", BindingKey::named("cat"), text("cat"))
                .with_export("cat"),
            Binding::new(ScopeKind::Ssh, "commands", BindingKey::named("ls"), text("ls"))
                .with_export("ls"),
        ];
        let err = reg.attach_all("a", batch).unwrap_err();
        assert!(matches!(err, PluginError::AmbiguousExportName { .. }));
        assert_eq!(map.exports(), vec!["ls"]);
    }

    #[test]
    fn reattach_swaps_stable_keys_in_place() {
        let reg = ExtensionRegistry::new();
        let point = reg.declare_item::<str>(ScopeKind::Sys, "greeting").unwrap();

        let mut handles = reg
            .attach_all("a", vec![item(BindingKey::named("greeter"), "v1")])
            .unwrap();
        let held = point.current().unwrap();
        assert_eq!(&*held.get(), "v1");

        let stats = reg
            .reattach("a", &mut handles, vec![item(BindingKey::named("greeter"), "v2")])
            .unwrap();
        assert_eq!(
            stats,
            ReattachStats {
                swapped: 1,
                attached: 0,
                detached: 0
            }
        );
        assert!(held.is_attached());
        assert_eq!(&*held.get(), "v2");
        assert_eq!(handles.len(), 1);
    }

    #[test]
    fn reattach_never_matches_generated_keys() {
        let reg = ExtensionRegistry::new();
        let point = reg.declare_item::<str>(ScopeKind::Sys, "greeting").unwrap();
        let mut handles = reg
            .attach_all("a", vec![item(BindingKey::generated(), "v1")])
            .unwrap();
        let held = point.current().unwrap();

        let stats = reg
            .reattach("a", &mut handles, vec![item(BindingKey::generated(), "v2")])
            .unwrap();
        assert_eq!(stats.swapped, 0);
        assert_eq!(stats.attached, 1);
        assert_eq!(stats.detached, 1);
        assert!(!held.is_attached());
        assert_eq!(&*point.get().unwrap(), "v2");
    }

    #[test]
    fn reattach_failure_leaves_everything_untouched() {
        let reg = ExtensionRegistry::new();
        let point = reg.declare_item::<str>(ScopeKind::Sys, "greeting").unwrap();
        let mut handles = reg
            .attach_all("a", vec![item(BindingKey::named("greeter"), "v1")])
            .unwrap();

        let bad = Binding::new(ScopeKind::Http, "missing", BindingKey::named("x"), text("x"));
        let err = reg
            .reattach(
                "a",
                &mut handles,
                vec![item(BindingKey::named("greeter"), "v2"), bad],
            )
            .unwrap_err();
        assert!(matches!(err, PluginError::UnknownExtensionPoint { .. }));
        assert_eq!(handles.len(), 1);
        assert_eq!(&*point.get().unwrap(), "v1");
    }

    #[test]
    fn reattach_frees_exports_of_removed_entries() {
        let reg = ExtensionRegistry::new();
        let map = reg.declare_map::<str>(ScopeKind::Http, "servlets").unwrap();
        let mut handles = reg
            .attach_all(
                "a",
                vec![
                    Binding::new(ScopeKind::Http, "servlets", BindingKey::generated(), text("v1"))
                        .with_export("index"),
                ],
            )
            .unwrap();
        reg.reattach(
            "a",
            &mut handles,
            vec![
                Binding::new(ScopeKind::Http, "servlets", BindingKey::generated(), text("v2"))
                    .with_export("index"),
            ],
        )
        .unwrap();
        assert_eq!(&*map.lookup("index").unwrap().get(), "v2");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn detach_all_removes_only_that_plugin() {
        let reg = ExtensionRegistry::new();
        let set = reg.declare_set::<str>(ScopeKind::Sys, "listeners").unwrap();
        let map = reg.declare_map::<str>(ScopeKind::Ssh, "commands").unwrap();
        set.register("a", BindingKey::generated(), None, text("a")).unwrap();
        set.register("b", BindingKey::generated(), None, text("b")).unwrap();
        map.register("a", BindingKey::generated(), Some("x".into()), text("a"))
            .unwrap();

        assert_eq!(reg.detach_all("a"), 2);
        assert_eq!(set.len(), 1);
        assert!(map.is_empty());
    }

    #[test]
    fn retract_owned_removes_points_and_their_entries() {
        let reg = ExtensionRegistry::new();
        let point = reg
            .declare_owned::<str>("api", ScopeKind::Sys, "api.hooks", Cardinality::Set)
            .unwrap();
        point
            .register("user", BindingKey::generated(), None, text("x"))
            .unwrap();
        let held = point.entries().pop().unwrap();

        assert_eq!(reg.retract_owned("api"), 1);
        assert!(reg.cardinality_of(ScopeKind::Sys, "api.hooks").is_none());
        assert!(!held.is_attached());
        assert_eq!(reg.retract_owned("api"), 0);
    }
}
