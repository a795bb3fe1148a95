// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Providers, their type-erased form, and binding keys.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces the implementation instance behind an extension.
pub struct Provider<T: ?Sized> {
    get: Arc<dyn Fn() -> Arc<T> + Send + Sync>,
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("type", &std::any::type_name::<T>())
            .finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    /// A provider that calls `f` on every lookup.
    pub fn from_fn(f: impl Fn() -> Arc<T> + Send + Sync + 'static) -> Self {
        Self { get: Arc::new(f) }
    }

    /// A provider that always hands out the same instance.
    pub fn instance(value: Arc<T>) -> Self {
        Self::from_fn(move || Arc::clone(&value))
    }

    pub fn get(&self) -> Arc<T> {
        (self.get)()
    }
}

/// A [`Provider`] whose implementation type has been erased so that plugin
/// units can hand heterogeneous bindings to the registry.
pub struct ErasedProvider {
    type_id: TypeId,
    type_name: &'static str,
    inner: Box<dyn Any + Send + Sync>,
}

impl ErasedProvider {
    pub fn new<T: ?Sized + Send + Sync + 'static>(provider: Provider<T>) -> Self {
        Self {
            type_id: TypeId::of::<Provider<T>>(),
            type_name: std::any::type_name::<T>(),
            inner: Box::new(provider),
        }
    }

    /// Name of the erased implementation type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// True when this provider produces `T`.
    pub fn is<T: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<Provider<T>>()
    }

    pub(crate) fn matches(&self, type_id: TypeId) -> bool {
        self.type_id == type_id
    }

    /// Recovers the typed provider, or returns `self` unchanged on mismatch.
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(self) -> Result<Provider<T>, Self> {
        if !self.is::<T>() {
            return Err(self);
        }
        let Self {
            type_id,
            type_name,
            inner,
        } = self;
        inner
            .downcast::<Provider<T>>()
            .map(|boxed| *boxed)
            .map_err(|inner| Self {
                type_id,
                type_name,
                inner,
            })
    }
}

impl fmt::Debug for ErasedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedProvider")
            .field("type", &self.type_name)
            .finish()
    }
}

static NEXT_GENERATED: AtomicU64 = AtomicU64::new(1);

/// Identity used to match an old and a new extension across a reload.
///
/// Only [`BindingKey::Named`] keys are stable. Generated keys are unique per
/// binding and never match anything after a reload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BindingKey {
    Named(String),
    Generated(u64),
}

impl BindingKey {
    pub fn named(name: impl Into<String>) -> Self {
        BindingKey::Named(name.into())
    }

    /// A fresh process-unique key.
    pub fn generated() -> Self {
        BindingKey::Generated(NEXT_GENERATED.fetch_add(1, Ordering::Relaxed))
    }

    pub fn is_stable(&self) -> bool {
        matches!(self, BindingKey::Named(_))
    }
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKey::Named(name) => write!(f, "@Named({name})"),
            BindingKey::Generated(id) => write!(f, "@Unique({id})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct Hello;

    impl Greeter for Hello {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn instance_provider_returns_same_arc() {
        let p = Provider::<dyn Greeter>::instance(Arc::new(Hello));
        assert!(Arc::ptr_eq(&p.get(), &p.get()));
        assert_eq!(p.get().greet(), "hello");
    }

    #[test]
    fn erased_provider_round_trips_for_matching_type() {
        let erased = ErasedProvider::new(Provider::<dyn Greeter>::instance(Arc::new(Hello)));
        assert!(erased.is::<dyn Greeter>());
        let typed = erased.downcast::<dyn Greeter>().unwrap();
        assert_eq!(typed.get().greet(), "hello");
    }

    #[test]
    fn erased_provider_rejects_other_types() {
        let erased = ErasedProvider::new(Provider::<str>::from_fn(|| Arc::from("x")));
        let back = erased.downcast::<dyn Greeter>().unwrap_err();
        assert_eq!(back.type_name(), "str");
    }

    #[test]
    fn generated_keys_are_unique_and_unstable() {
        let a = BindingKey::generated();
        let b = BindingKey::generated();
        assert_ne!(a, b);
        assert!(!a.is_stable());
        assert!(BindingKey::named("x").is_stable());
    }
}
