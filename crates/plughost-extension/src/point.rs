// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed extension points and the slots registered into them.
//!
//! Each point keeps its entries in a copy-on-write `Vec` behind an
//! [`ArcSwap`]: readers load a snapshot without locking, writers build a new
//! vector under the point's mutex and publish it in one store. Each entry's
//! provider sits in its own `ArcSwap`, which is how a reload swaps an
//! implementation without detaching the entry.

use std::any::{Any, TypeId};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use plughost_core::{PluginError, ScopeKind};
use strum::Display;
use tracing::debug;

use crate::binding::Binding;
use crate::handle::{ErasedHandle, RegistrationHandle};
use crate::provider::{BindingKey, ErasedProvider, Provider};

/// How many implementations a point holds and how they are addressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum Cardinality {
    /// Zero or one active implementation; the latest attach wins and a detach
    /// restores the one before it.
    Item,
    /// Any number of independently attached implementations.
    Set,
    /// Implementations keyed by a unique export name.
    Map,
}

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Slot<T: ?Sized> {
    id: u64,
    plugin: String,
    key: BindingKey,
    export: Option<String>,
    provider: ArcSwap<Provider<T>>,
    attached: AtomicBool,
}

/// A registered implementation as seen by consumers.
///
/// Holding an `Extension` keeps pointing at the same registration across
/// in-place reloads: [`Extension::get`] always goes through the current
/// provider.
pub struct Extension<T: ?Sized> {
    slot: Arc<Slot<T>>,
}

impl<T: ?Sized> Clone for Extension<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Extension<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("plugin", &self.slot.plugin)
            .field("key", &self.slot.key)
            .field("export", &self.slot.export)
            .field("attached", &self.slot.attached.load(Ordering::Acquire))
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Extension<T> {
    pub fn plugin_name(&self) -> &str {
        &self.slot.plugin
    }

    pub fn export_name(&self) -> Option<&str> {
        self.slot.export.as_deref()
    }

    pub fn binding_key(&self) -> &BindingKey {
        &self.slot.key
    }

    /// The implementation produced by the current provider.
    pub fn get(&self) -> Arc<T> {
        self.slot.provider.load().get()
    }

    pub fn provider(&self) -> Provider<T> {
        Provider::clone(&self.slot.provider.load())
    }

    pub fn is_attached(&self) -> bool {
        self.slot.attached.load(Ordering::Acquire)
    }
}

pub(crate) struct PointInner<T: ?Sized> {
    scope: ScopeKind,
    contract: String,
    cardinality: Cardinality,
    owner: Option<String>,
    slots: ArcSwap<Vec<Arc<Slot<T>>>>,
    write: Mutex<()>,
}

/// A host-declared slot that plugins register implementations of `T` into.
///
/// Cloning is cheap; clones share the same registrations.
pub struct ExtensionPoint<T: ?Sized> {
    inner: Arc<PointInner<T>>,
}

impl<T: ?Sized> Clone for ExtensionPoint<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: ?Sized> fmt::Debug for ExtensionPoint<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionPoint")
            .field("scope", &self.inner.scope)
            .field("contract", &self.inner.contract)
            .field("cardinality", &self.inner.cardinality)
            .field("entries", &self.inner.slots.load().len())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> ExtensionPoint<T> {
    pub(crate) fn new(
        scope: ScopeKind,
        contract: impl Into<String>,
        cardinality: Cardinality,
        owner: Option<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PointInner {
                scope,
                contract: contract.into(),
                cardinality,
                owner,
                slots: ArcSwap::from_pointee(Vec::new()),
                write: Mutex::new(()),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Arc<PointInner<T>>) -> Self {
        Self { inner }
    }

    pub(crate) fn erased(&self) -> Arc<dyn ErasedPoint> {
        Arc::clone(&self.inner) as Arc<dyn ErasedPoint>
    }

    pub fn scope(&self) -> ScopeKind {
        self.inner.scope
    }

    pub fn contract(&self) -> &str {
        &self.inner.contract
    }

    pub fn cardinality(&self) -> Cardinality {
        self.inner.cardinality
    }

    /// The active entry of an item point. Always `None` for sets and maps.
    pub fn current(&self) -> Option<Extension<T>> {
        if self.inner.cardinality != Cardinality::Item {
            return None;
        }
        self.inner
            .slots
            .load()
            .last()
            .map(|slot| Extension { slot: Arc::clone(slot) })
    }

    /// Shorthand for the implementation of the active item entry.
    pub fn get(&self) -> Option<Arc<T>> {
        self.current().map(|ext| ext.get())
    }

    /// Active entries in iteration order: attach order for sets, export name
    /// order for maps, the single active entry for items.
    pub fn entries(&self) -> Vec<Extension<T>> {
        if self.inner.cardinality == Cardinality::Item {
            return self.current().into_iter().collect();
        }
        self.inner
            .slots
            .load()
            .iter()
            .map(|slot| Extension { slot: Arc::clone(slot) })
            .collect()
    }

    pub fn implementations(&self) -> Vec<Arc<T>> {
        self.entries().iter().map(Extension::get).collect()
    }

    /// The map entry exported under `export`.
    pub fn lookup(&self, export: &str) -> Option<Extension<T>> {
        self.inner
            .slots
            .load()
            .iter()
            .find(|slot| slot.export.as_deref() == Some(export))
            .map(|slot| Extension { slot: Arc::clone(slot) })
    }

    pub fn exports(&self) -> Vec<String> {
        self.inner
            .slots
            .load()
            .iter()
            .filter_map(|slot| slot.export.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        match self.inner.cardinality {
            Cardinality::Item => usize::from(!self.inner.slots.load().is_empty()),
            _ => self.inner.slots.load().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.load().is_empty()
    }

    /// Registers a host-provided implementation directly.
    pub fn register(
        &self,
        owner: &str,
        key: BindingKey,
        export: Option<String>,
        provider: Provider<T>,
    ) -> Result<RegistrationHandle, PluginError> {
        self.inner.insert(owner, key, export, provider)
    }
}

impl<T: ?Sized + Send + Sync + 'static> PointInner<T> {
    fn check_export(
        &self,
        plugin: &str,
        export: Option<&str>,
        freed: &HashSet<u64>,
    ) -> Result<(), PluginError> {
        if self.cardinality != Cardinality::Map {
            return Ok(());
        }
        let Some(export) = export else {
            return Err(PluginError::Config(format!(
                "plugin {plugin} binds map point {} without an export name",
                self.contract
            )));
        };
        let slots = self.slots.load();
        if let Some(existing) = slots
            .iter()
            .find(|s| s.export.as_deref() == Some(export) && !freed.contains(&s.id))
        {
            return Err(PluginError::AmbiguousExportName {
                contract: self.contract.clone(),
                export: export.to_string(),
                existing: existing.plugin.clone(),
                plugin: plugin.to_string(),
            });
        }
        Ok(())
    }

    fn insert(
        self: &Arc<Self>,
        plugin: &str,
        key: BindingKey,
        export: Option<String>,
        provider: Provider<T>,
    ) -> Result<RegistrationHandle, PluginError> {
        let _guard = self.write.lock();
        self.check_export(plugin, export.as_deref(), &HashSet::new())?;

        let slot = Arc::new(Slot {
            id: NEXT_SLOT.fetch_add(1, Ordering::Relaxed),
            plugin: plugin.to_string(),
            key,
            export,
            provider: ArcSwap::from_pointee(provider),
            attached: AtomicBool::new(true),
        });

        let mut next = Vec::clone(&self.slots.load());
        match self.cardinality {
            Cardinality::Map => {
                let at = next.partition_point(|s| s.export <= slot.export);
                next.insert(at, Arc::clone(&slot));
            }
            Cardinality::Item | Cardinality::Set => next.push(Arc::clone(&slot)),
        }
        self.slots.store(Arc::new(next));

        debug!(
            plugin = %plugin,
            scope = %self.scope,
            contract = %self.contract,
            key = %slot.key,
            "attached extension"
        );

        Ok(RegistrationHandle::new(Box::new(SlotHandle {
            scope: self.scope,
            contract: self.contract.clone(),
            point: Arc::downgrade(self),
            slot,
        })))
    }

    fn remove_where(&self, pred: impl Fn(&Slot<T>) -> bool) -> usize {
        let _guard = self.write.lock();
        let current = self.slots.load();
        let (gone, kept): (Vec<_>, Vec<_>) = current.iter().cloned().partition(|s| pred(s));
        if gone.is_empty() {
            return 0;
        }
        self.slots.store(Arc::new(kept));
        for slot in &gone {
            slot.attached.store(false, Ordering::Release);
            debug!(
                plugin = %slot.plugin,
                scope = %self.scope,
                contract = %self.contract,
                key = %slot.key,
                "detached extension"
            );
        }
        gone.len()
    }
}

/// Type-erased view of a point, used by the registry to route bindings.
pub(crate) trait ErasedPoint: Send + Sync {
    fn scope(&self) -> ScopeKind;
    fn contract(&self) -> &str;
    fn cardinality(&self) -> Cardinality;
    fn owner(&self) -> Option<&str>;
    fn type_name(&self) -> &'static str;
    fn accepts(&self, provider: &ErasedProvider) -> bool;
    fn check(&self, plugin: &str, export: Option<&str>, freed: &HashSet<u64>)
    -> Result<(), PluginError>;
    fn attach(self: Arc<Self>, plugin: &str, binding: Binding)
    -> Result<RegistrationHandle, PluginError>;
    fn detach_plugin(&self, plugin: &str) -> usize;
    fn clear(&self) -> usize;
    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: ?Sized + Send + Sync + 'static> ErasedPoint for PointInner<T> {
    fn scope(&self) -> ScopeKind {
        self.scope
    }

    fn contract(&self) -> &str {
        &self.contract
    }

    fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn accepts(&self, provider: &ErasedProvider) -> bool {
        provider.matches(TypeId::of::<Provider<T>>())
    }

    fn check(
        &self,
        plugin: &str,
        export: Option<&str>,
        freed: &HashSet<u64>,
    ) -> Result<(), PluginError> {
        self.check_export(plugin, export, freed)
    }

    fn attach(
        self: Arc<Self>,
        plugin: &str,
        binding: Binding,
    ) -> Result<RegistrationHandle, PluginError> {
        let Binding {
            key,
            export,
            provider,
            ..
        } = binding;
        let provider = provider.downcast::<T>().map_err(|p| PluginError::ContractMismatch {
            contract: self.contract.clone(),
            expected: std::any::type_name::<T>().to_string(),
            actual: p.type_name().to_string(),
        })?;
        self.insert(plugin, key, export, provider)
    }

    fn detach_plugin(&self, plugin: &str) -> usize {
        self.remove_where(|s| s.plugin == plugin)
    }

    fn clear(&self) -> usize {
        self.remove_where(|_| true)
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

struct SlotHandle<T: ?Sized> {
    scope: ScopeKind,
    contract: String,
    point: Weak<PointInner<T>>,
    slot: Arc<Slot<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> ErasedHandle for SlotHandle<T> {
    fn scope(&self) -> ScopeKind {
        self.scope
    }

    fn contract(&self) -> &str {
        &self.contract
    }

    fn plugin_name(&self) -> &str {
        &self.slot.plugin
    }

    fn key(&self) -> &BindingKey {
        &self.slot.key
    }

    fn export(&self) -> Option<&str> {
        self.slot.export.as_deref()
    }

    fn slot_id(&self) -> u64 {
        self.slot.id
    }

    fn accepts(&self, provider: &ErasedProvider) -> bool {
        provider.matches(TypeId::of::<Provider<T>>())
    }

    fn replace(&self, provider: ErasedProvider) -> Result<(), PluginError> {
        let provider = provider.downcast::<T>().map_err(|p| PluginError::ContractMismatch {
            contract: self.contract.clone(),
            expected: std::any::type_name::<T>().to_string(),
            actual: p.type_name().to_string(),
        })?;
        self.slot.provider.store(Arc::new(provider));
        Ok(())
    }

    fn remove(&self) -> bool {
        let id = self.slot.id;
        match self.point.upgrade() {
            Some(point) => point.remove_where(|s| s.id == id) > 0,
            None => {
                self.slot.attached.store(false, Ordering::Release);
                false
            }
        }
    }

    fn is_attached(&self) -> bool {
        self.slot.attached.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(n: &str) -> BindingKey {
        BindingKey::named(n)
    }

    fn text(s: &'static str) -> Provider<str> {
        Provider::from_fn(move || Arc::from(s))
    }

    #[test]
    fn item_detach_restores_previous_entry() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Sys, "greeting", Cardinality::Item, None);
        assert!(point.get().is_none());

        let host = point.register("host", named("default"), None, text("host")).unwrap();
        let plugin = point.register("a", named("default"), None, text("plugin")).unwrap();
        assert_eq!(&*point.get().unwrap(), "plugin");
        assert_eq!(point.len(), 1);

        assert!(plugin.remove());
        assert_eq!(&*point.get().unwrap(), "host");

        assert!(host.remove());
        assert!(point.get().is_none());
    }

    #[test]
    fn map_rejects_duplicate_export_and_keeps_first() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Ssh, "commands", Cardinality::Map, None);
        point
            .register("a", named("ls"), Some("ls".into()), text("from a"))
            .unwrap();
        let err = point
            .register("b", named("ls"), Some("ls".into()), text("from b"))
            .unwrap_err();
        match err {
            PluginError::AmbiguousExportName {
                export,
                existing,
                plugin,
                ..
            } => {
                assert_eq!(export, "ls");
                assert_eq!(existing, "a");
                assert_eq!(plugin, "b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(&*point.lookup("ls").unwrap().get(), "from a");
        assert_eq!(point.len(), 1);
    }

    #[test]
    fn map_requires_export_name() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Ssh, "commands", Cardinality::Map, None);
        let err = point.register("a", named("x"), None, text("x")).unwrap_err();
        assert!(matches!(err, PluginError::Config(_)));
        assert!(point.is_empty());
    }

    #[test]
    fn map_iterates_in_export_order() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Http, "servlets", Cardinality::Map, None);
        for name in ["zeta", "alpha", "mid"] {
            point
                .register("a", BindingKey::generated(), Some(name.into()), text("x"))
                .unwrap();
        }
        assert_eq!(point.exports(), vec!["alpha", "mid", "zeta"]);
    }

    #[test]
    fn set_entries_are_removed_independently() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Sys, "listeners", Cardinality::Set, None);
        let first = point.register("a", BindingKey::generated(), None, text("1")).unwrap();
        point.register("b", BindingKey::generated(), None, text("2")).unwrap();
        first.remove();
        let left: Vec<String> = point.implementations().iter().map(|s| s.to_string()).collect();
        assert_eq!(left, vec!["2"]);
    }

    #[test]
    fn removed_extension_reports_detached() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Sys, "listeners", Cardinality::Set, None);
        let handle = point.register("a", BindingKey::generated(), None, text("1")).unwrap();
        let ext = point.entries().pop().unwrap();
        assert!(ext.is_attached());
        handle.remove();
        assert!(!ext.is_attached());
        assert!(!handle.remove(), "second removal is a no-op");
    }

    #[test]
    fn debug_shows_attachment_state() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Sys, "listeners", Cardinality::Set, None);
        let handle = point.register("a", named("audit"), None, text("1")).unwrap();
        let ext = point.entries().pop().unwrap();
        let rendered = format!("{ext:?}");
        assert!(rendered.contains("plugin: \"a\""), "{rendered}");
        assert!(rendered.contains("attached: true"), "{rendered}");
        handle.remove();
        assert!(format!("{ext:?}").contains("attached: false"));
    }

    #[test]
    fn readers_keep_their_snapshot_while_writers_publish() {
        let point = ExtensionPoint::<str>::new(ScopeKind::Sys, "listeners", Cardinality::Set, None);
        point.register("a", BindingKey::generated(), None, text("1")).unwrap();
        let before = point.entries();
        point.register("b", BindingKey::generated(), None, text("2")).unwrap();
        assert_eq!(before.len(), 1);
        assert_eq!(point.entries().len(), 2);
    }
}
