// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Containers of named singletons with parent fallback.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Keys every plugin scope binds.
pub const PLUGIN_NAME: &str = "plugin.name";
pub const PLUGIN_DESCRIPTION: &str = "plugin.description";
pub const PLUGIN_DATA_DIR: &str = "plugin.data_dir";

type Value = Arc<dyn Any + Send + Sync>;

/// A scope: named singletons plus the parents consulted, in order, when a
/// key is not bound locally.
#[derive(Clone, Default)]
pub struct Scope {
    name: String,
    values: BTreeMap<String, Value>,
    parents: Vec<Arc<Scope>>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_parent(mut self, parent: Arc<Scope>) -> Self {
        self.parents.push(parent);
        self
    }

    pub fn add_parent(&mut self, parent: Arc<Scope>) {
        self.parents.push(parent);
    }

    /// Binds `value` under `key`, replacing any local binding.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    pub fn insert_arc<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: Arc<T>) {
        self.values.insert(key.into(), value);
    }

    /// Looks `key` up locally, then in each parent depth-first.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        if let Some(value) = self.values.get(key) {
            return Arc::clone(value).downcast::<T>().ok();
        }
        self.parents.iter().find_map(|p| p.get::<T>(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key) || self.parents.iter().any(|p| p.contains(key))
    }

    /// Keys bound locally, sorted.
    pub fn local_keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// A parentless copy of the local bindings, minus every key starting with
    /// one of `deny`.
    pub fn filtered_copy(&self, deny: &[&str]) -> Scope {
        let values = self
            .values
            .iter()
            .filter(|(k, _)| !deny.iter().any(|prefix| k.starts_with(prefix)))
            .map(|(k, v)| (k.clone(), Arc::clone(v)))
            .collect();
        Scope {
            name: self.name.clone(),
            values,
            parents: Vec::new(),
        }
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("name", &self.name)
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("parents", &self.parents.len())
            .finish()
    }
}
