// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use plughost_core::ScopeKind;

use crate::provider::{BindingKey, ErasedProvider, Provider};

/// An extension a plugin unit wants registered: which point it targets, the
/// identity it carries across reloads and the provider behind it.
pub struct Binding {
    pub scope: ScopeKind,
    pub contract: String,
    pub key: BindingKey,
    pub export: Option<String>,
    pub(crate) provider: ErasedProvider,
}

impl Binding {
    pub fn new<T: ?Sized + Send + Sync + 'static>(
        scope: ScopeKind,
        contract: impl Into<String>,
        key: BindingKey,
        provider: Provider<T>,
    ) -> Self {
        Self::from_erased(scope, contract, key, ErasedProvider::new(provider))
    }

    pub fn from_erased(
        scope: ScopeKind,
        contract: impl Into<String>,
        key: BindingKey,
        provider: ErasedProvider,
    ) -> Self {
        Self {
            scope,
            contract: contract.into(),
            key,
            export: None,
            provider,
        }
    }

    /// Sets the export name used as the key of a map point.
    pub fn with_export(mut self, export: impl Into<String>) -> Self {
        self.export = Some(export.into());
        self
    }

    pub fn provider_type(&self) -> &'static str {
        self.provider.type_name()
    }

    /// True when `other` targets the same point with the same stable identity.
    pub(crate) fn same_identity(
        &self,
        scope: ScopeKind,
        contract: &str,
        key: &BindingKey,
        export: Option<&str>,
    ) -> bool {
        self.key.is_stable()
            && self.scope == scope
            && self.contract == contract
            && &self.key == key
            && self.export.as_deref() == export
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("scope", &self.scope)
            .field("contract", &self.contract)
            .field("key", &self.key)
            .field("export", &self.export)
            .field("provider", &self.provider)
            .finish()
    }
}
