// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the plughost plugin host.
//!
//! This crate provides the error taxonomy and the small value types shared by
//! every other crate in the workspace: scope kinds, lifecycle states, reload
//! modes and the per-plugin description.

pub mod error;
pub mod types;

pub use error::PluginError;
pub use types::{ApiType, PluginDescription, PluginState, PluginUser, ReloadMode, ScopeKind};

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::str::FromStr;

    use super::*;

    #[test]
    fn only_missing_mandatory_is_fatal() {
        let fatal = PluginError::MissingMandatoryPlugin {
            names: vec!["replication".into()],
        };
        assert!(fatal.is_fatal());

        let recoverable = [
            PluginError::invalid("a.plugin", "bad"),
            PluginError::RemoteAdminDisabled,
            PluginError::CyclicDependency {
                remaining: "a -> b".into(),
            },
            PluginError::Internal("oops".into()),
        ];
        for err in &recoverable {
            assert!(!err.is_fatal(), "{err} should not be fatal");
        }
    }

    #[test]
    fn install_failure_wraps_once() {
        let err = PluginError::invalid("a.plugin", "bad descriptor").into_install_failure("a");
        let err = err.into_install_failure("a");
        match err {
            PluginError::InstallFailure { name, source } => {
                assert_eq!(name, "a");
                assert!(matches!(*source, PluginError::InvalidArtifact { .. }));
            }
            other => panic!("expected InstallFailure, got {other:?}"),
        }
    }

    #[test]
    fn not_running_lists_every_name() {
        let err = PluginError::NotRunning {
            names: vec!["a".into(), "b".into()],
        };
        assert_eq!(err.to_string(), "plugin(s) \"a\", \"b\" not running");
    }

    #[test]
    fn scope_kind_round_trips_through_strings() {
        for kind in ScopeKind::ALL {
            let parsed = ScopeKind::from_str(&kind.to_string()).expect("should parse back");
            assert_eq!(kind, parsed);
        }
        assert_eq!(ScopeKind::Http.to_string(), "http");
    }

    #[test]
    fn reload_mode_defaults_to_reload() {
        assert_eq!(ReloadMode::default(), ReloadMode::Reload);
        let parsed: ReloadMode = serde_json::from_str("\"restart\"").unwrap();
        assert_eq!(parsed, ReloadMode::Restart);
    }

    #[test]
    fn description_without_canonical_url_is_relative() {
        let d = PluginDescription::new("hello", None, Path::new("/srv/data"));
        assert_eq!(d.canonical_web_url, "/plugins/hello");
        assert_eq!(d.data_dir, Path::new("/srv/data/hello"));
        assert_eq!(d.user.principal(), "plugin/hello");
    }

    #[test]
    fn description_trims_trailing_slashes() {
        let d = PluginDescription::new("hello", Some("https://review.example.com/"), Path::new("/d"));
        assert_eq!(
            d.canonical_web_url,
            "https://review.example.com/plugins/hello/"
        );
    }
}
