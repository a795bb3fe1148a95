// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use plughost_core::{PluginError, ScopeKind};

use crate::provider::{BindingKey, ErasedProvider};

pub(crate) trait ErasedHandle: Send + Sync {
    fn scope(&self) -> ScopeKind;
    fn contract(&self) -> &str;
    fn plugin_name(&self) -> &str;
    fn key(&self) -> &BindingKey;
    fn export(&self) -> Option<&str>;
    fn slot_id(&self) -> u64;
    fn accepts(&self, provider: &ErasedProvider) -> bool;
    fn replace(&self, provider: ErasedProvider) -> Result<(), PluginError>;
    fn remove(&self) -> bool;
    fn is_attached(&self) -> bool;
}

/// Owner's handle to one registration. Plugin units keep these so they can
/// detach on unload or hand them to [`crate::ExtensionRegistry::reattach`].
pub struct RegistrationHandle {
    inner: Box<dyn ErasedHandle>,
}

impl RegistrationHandle {
    pub(crate) fn new(inner: Box<dyn ErasedHandle>) -> Self {
        Self { inner }
    }

    pub fn scope(&self) -> ScopeKind {
        self.inner.scope()
    }

    pub fn contract(&self) -> &str {
        self.inner.contract()
    }

    pub fn plugin_name(&self) -> &str {
        self.inner.plugin_name()
    }

    pub fn binding_key(&self) -> &BindingKey {
        self.inner.key()
    }

    pub fn export_name(&self) -> Option<&str> {
        self.inner.export()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.is_attached()
    }

    /// Detaches the registration. Returns false if it was already gone.
    pub fn remove(&self) -> bool {
        self.inner.remove()
    }

    pub(crate) fn slot_id(&self) -> u64 {
        self.inner.slot_id()
    }

    pub(crate) fn accepts(&self, provider: &ErasedProvider) -> bool {
        self.inner.accepts(provider)
    }

    pub(crate) fn replace(&self, provider: ErasedProvider) -> Result<(), PluginError> {
        self.inner.replace(provider)
    }
}

impl fmt::Debug for RegistrationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationHandle")
            .field("scope", &self.scope())
            .field("contract", &self.contract())
            .field("plugin", &self.plugin_name())
            .field("key", self.binding_key())
            .field("export", &self.export_name())
            .finish()
    }
}
