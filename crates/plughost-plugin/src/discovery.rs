// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Auto-discovery: classifying a unit's marked components into the points
//! they register with.
//!
//! Discovery fails closed. A marked component whose contract is neither a
//! conventional one nor a declared point aborts the load.

use std::path::Path;

use plughost_core::{PluginError, ScopeKind};
use plughost_extension::{BindingKey, Cardinality, ExtensionRegistry};

use crate::code::{ComponentSpec, Marker};
use crate::contracts::known_contract;

/// Where a discovered component registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub scope: ScopeKind,
    pub contract: String,
    pub key: BindingKey,
    pub export: Option<String>,
}

/// Classifies component `class`.
///
/// Returns `Ok(None)` for a conventional contract whose point the host does
/// not declare (for instance commands on a host without the ssh subsystem).
pub fn classify(
    class: &str,
    spec: &ComponentSpec,
    registry: &ExtensionRegistry,
    src: &Path,
) -> Result<Option<Target>, PluginError> {
    let (scope, contract, cardinality) = match known_contract(&spec.contract) {
        Some((scope, point)) => match registry.cardinality_of(scope, point) {
            Some(cardinality) => (scope, point.to_string(), cardinality),
            None => return Ok(None),
        },
        None => ScopeKind::ALL
            .into_iter()
            .find_map(|scope| {
                registry
                    .cardinality_of(scope, &spec.contract)
                    .map(|c| (scope, spec.contract.clone(), c))
            })
            .ok_or_else(|| {
                PluginError::invalid(
                    src,
                    format!(
                        "class {class} is marked for {} but no such extension point is declared",
                        spec.contract
                    ),
                )
            })?,
    };

    let (key, export) = match (cardinality, &spec.marker) {
        (Cardinality::Map, Marker::Export(name)) => (BindingKey::named(name), Some(name.clone())),
        (Cardinality::Map, Marker::Listen) => {
            return Err(PluginError::invalid(
                src,
                format!("class {class} must be exported under a name to join map point {contract}"),
            ));
        }
        (Cardinality::Set, Marker::Export(name)) => (BindingKey::named(name), None),
        (Cardinality::Set, Marker::Listen) => (
            spec.name
                .as_deref()
                .map_or_else(BindingKey::generated, BindingKey::named),
            None,
        ),
        (Cardinality::Item, _) => (BindingKey::named(spec.name.as_deref().unwrap_or(class)), None),
    };

    Ok(Some(Target {
        scope,
        contract,
        key,
        export,
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::contracts::{self, HttpServlet, SshCommand};

    trait Listener: Send + Sync {}
    struct L;
    impl Listener for L {}

    struct Cmd;
    impl SshCommand for Cmd {
        fn run(&self, _: &[String]) -> Result<String, PluginError> {
            Ok(String::new())
        }
    }

    fn registry(scopes: &[ScopeKind]) -> ExtensionRegistry {
        let registry = ExtensionRegistry::new();
        contracts::declare_host_points(&registry, scopes).unwrap();
        registry
            .declare_set::<dyn Listener>(ScopeKind::Sys, "listeners")
            .unwrap();
        registry
            .declare_item::<dyn Listener>(ScopeKind::Sys, "primary")
            .unwrap();
        registry
    }

    fn cmd(export: &str) -> ComponentSpec {
        ComponentSpec::export::<dyn SshCommand>(contracts::SSH_COMMAND, export, |_| {
            Ok(Arc::new(Cmd) as Arc<dyn SshCommand>)
        })
    }

    fn listener(contract: &str) -> ComponentSpec {
        ComponentSpec::listen::<dyn Listener>(contract, |_| Ok(Arc::new(L) as Arc<dyn Listener>))
    }

    #[test]
    fn exported_command_goes_to_the_ssh_map() {
        let reg = registry(&ScopeKind::ALL);
        let target = classify("Status", &cmd("status"), &reg, Path::new("p.plugin"))
            .unwrap()
            .unwrap();
        assert_eq!(target.scope, ScopeKind::Ssh);
        assert_eq!(target.contract, contracts::SSH_COMMANDS);
        assert_eq!(target.key, BindingKey::named("status"));
        assert_eq!(target.export.as_deref(), Some("status"));
    }

    #[test]
    fn command_without_ssh_subsystem_is_skipped() {
        let reg = registry(&[ScopeKind::Sys]);
        assert!(
            classify("Status", &cmd("status"), &reg, Path::new("p.plugin"))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn unmarked_servlet_is_rejected() {
        let reg = registry(&ScopeKind::ALL);
        let spec = ComponentSpec::listen::<dyn HttpServlet>(contracts::HTTP_SERVLET, |_| {
            Err(PluginError::Internal("unused".into()))
        });
        let err = classify("Index", &spec, &reg, Path::new("p.plugin")).unwrap_err();
        assert!(err.to_string().contains("Index"));
    }

    #[test]
    fn set_listener_gets_a_generated_key_unless_named() {
        let reg = registry(&ScopeKind::ALL);
        let t = classify("A", &listener("listeners"), &reg, Path::new("p"))
            .unwrap()
            .unwrap();
        assert!(!t.key.is_stable());

        let t = classify("A", &listener("listeners").named("audit"), &reg, Path::new("p"))
            .unwrap()
            .unwrap();
        assert_eq!(t.key, BindingKey::named("audit"));
    }

    #[test]
    fn item_is_keyed_by_class() {
        let reg = registry(&ScopeKind::ALL);
        let t = classify("Primary", &listener("primary"), &reg, Path::new("p"))
            .unwrap()
            .unwrap();
        assert_eq!(t.key, BindingKey::named("Primary"));
    }

    #[test]
    fn unknown_contract_fails_closed() {
        let reg = registry(&ScopeKind::ALL);
        let err = classify("Stray", &listener("nowhere"), &reg, Path::new("p.plugin")).unwrap_err();
        assert!(matches!(err, PluginError::InvalidArtifact { .. }));
        assert!(err.to_string().contains("Stray"));
    }
}
