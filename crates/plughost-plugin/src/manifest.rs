// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of `.plugin` descriptors.
//!
//! A descriptor is a TOML file with a `[plugin]` table describing the plugin
//! and an optional `[modules]` table naming the module symbol to run in each
//! scope.

use std::path::Path;

use plughost_core::{ApiType, PluginError, ReloadMode, ScopeKind};
use semver::{Version, VersionReq};
use serde::Deserialize;

/// Version of the extension API this host implements.
pub const HOST_API_VERSION: &str = "1.2.0";

/// Parsed `.plugin` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: Option<String>,
    pub api_version: Option<String>,
    pub api_type: ApiType,
    /// Id of the code bundle in the host's library.
    pub code: String,
    pub reload: ReloadMode,
    /// Module that extends the shared extension surface itself.
    pub api_module: Option<String>,
    pub dependencies: Vec<String>,
    /// Component symbols offered to auto-discovery. Empty means every
    /// component of the plugin's own bundle.
    pub classes: Vec<String>,
    pub modules: ModuleNames,
}

/// Module symbol per scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleNames {
    pub sys: Option<String>,
    pub ssh: Option<String>,
    pub http: Option<String>,
}

impl ModuleNames {
    pub fn get(&self, scope: ScopeKind) -> Option<&str> {
        match scope {
            ScopeKind::Sys => self.sys.as_deref(),
            ScopeKind::Ssh => self.ssh.as_deref(),
            ScopeKind::Http => self.http.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.sys.is_none() && self.ssh.is_none() && self.http.is_none()
    }
}

impl PluginDescriptor {
    /// True when the plugin declares explicit modules and skips auto-discovery.
    pub fn has_explicit_modules(&self) -> bool {
        !self.modules.is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorFile {
    plugin: PluginSection,
    #[serde(default)]
    modules: ModuleNames,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PluginSection {
    name: String,
    version: Option<String>,
    api_version: Option<String>,
    #[serde(default)]
    api_type: ApiType,
    code: Option<String>,
    #[serde(default)]
    reload: ReloadMode,
    api_module: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    classes: Vec<String>,
}

/// Parses a descriptor read from `path`.
pub fn parse_descriptor(content: &str, path: &Path) -> Result<PluginDescriptor, PluginError> {
    let file: DescriptorFile = toml::from_str(content)
        .map_err(|e| PluginError::invalid(path, format!("malformed descriptor: {e}")))?;
    let section = file.plugin;

    if section.name.trim().is_empty() {
        return Err(PluginError::invalid(path, "plugin name must not be empty"));
    }
    if section.name.starts_with('.') || section.name.contains(['/', '\\']) {
        return Err(PluginError::invalid(
            path,
            format!("plugin name `{}` is not a valid file name", section.name),
        ));
    }

    if section.api_type == ApiType::Js {
        return Err(PluginError::invalid(
            path,
            "api_type `js` is reserved for asset plugins",
        ));
    }

    if let Some(api) = &section.api_version {
        check_api_version(api, path)?;
    }

    if file.modules.ssh.is_some() && section.api_type != ApiType::Plugin {
        return Err(PluginError::invalid(
            path,
            "an ssh module requires api_type = \"plugin\"",
        ));
    }

    if section.dependencies.iter().any(|d| *d == section.name) {
        return Err(PluginError::invalid(path, "a plugin cannot depend on itself"));
    }

    Ok(PluginDescriptor {
        code: section.code.unwrap_or_else(|| section.name.clone()),
        name: section.name,
        version: section.version,
        api_version: section.api_version,
        api_type: section.api_type,
        reload: section.reload,
        api_module: section.api_module,
        dependencies: section.dependencies,
        classes: section.classes,
        modules: file.modules,
    })
}

/// Reads only the declared name, for scanning. Unreadable or malformed
/// descriptors yield `None`; the load itself reports the problem.
pub fn declared_name(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_descriptor(&content, path).ok().map(|d| d.name)
}

fn check_api_version(api: &str, path: &Path) -> Result<(), PluginError> {
    let built_against = Version::parse(api)
        .map_err(|e| PluginError::invalid(path, format!("invalid api_version `{api}`: {e}")))?;
    let req = VersionReq::parse(&format!("^{built_against}"))
        .map_err(|e| PluginError::Internal(e.to_string()))?;
    let host = Version::parse(HOST_API_VERSION).map_err(|e| PluginError::Internal(e.to_string()))?;
    if !req.matches(&host) {
        return Err(PluginError::invalid(
            path,
            format!("built against API {built_against}, host provides {host}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Result<PluginDescriptor, PluginError> {
        parse_descriptor(toml, Path::new("test.plugin"))
    }

    #[test]
    fn parse_full_descriptor() {
        let d = parse(
            r#"
[plugin]
name = "replication"
version = "3.1"
api_version = "1.1.0"
api_type = "plugin"
code = "replication-3.1"
reload = "restart"
dependencies = ["events"]
classes = ["ReplicateCommand"]

[modules]
sys = "ReplicationModule"
ssh = "ReplicationSshModule"
"#,
        )
        .unwrap();
        assert_eq!(d.name, "replication");
        assert_eq!(d.version.as_deref(), Some("3.1"));
        assert_eq!(d.code, "replication-3.1");
        assert_eq!(d.reload, ReloadMode::Restart);
        assert_eq!(d.dependencies, vec!["events"]);
        assert_eq!(d.modules.get(ScopeKind::Ssh), Some("ReplicationSshModule"));
        assert_eq!(d.modules.get(ScopeKind::Http), None);
        assert!(d.has_explicit_modules());
    }

    #[test]
    fn minimal_descriptor_uses_defaults() {
        let d = parse("[plugin]\nname = \"hello\"\n").unwrap();
        assert_eq!(d.code, "hello");
        assert_eq!(d.api_type, ApiType::Plugin);
        assert_eq!(d.reload, ReloadMode::Reload);
        assert!(!d.has_explicit_modules());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("[plugin]\nname = \"hello\"\nrelaod = \"restart\"\n").unwrap_err();
        assert!(matches!(err, PluginError::InvalidArtifact { .. }));
    }

    #[test]
    fn ssh_module_requires_plugin_api() {
        let err = parse(
            "[plugin]\nname = \"x\"\napi_type = \"extension\"\n[modules]\nssh = \"M\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("ssh module"));
    }

    #[test]
    fn incompatible_api_version_is_rejected() {
        assert!(parse("[plugin]\nname = \"x\"\napi_version = \"2.0.0\"\n").is_err());
        assert!(parse("[plugin]\nname = \"x\"\napi_version = \"1.9.0\"\n").is_err());
        assert!(parse("[plugin]\nname = \"x\"\napi_version = \"1.0.3\"\n").is_ok());
    }

    #[test]
    fn bad_names_are_rejected() {
        assert!(parse("[plugin]\nname = \"\"\n").is_err());
        assert!(parse("[plugin]\nname = \".hidden\"\n").is_err());
        assert!(parse("[plugin]\nname = \"a/b\"\n").is_err());
    }

    #[test]
    fn self_dependency_is_rejected() {
        assert!(parse("[plugin]\nname = \"a\"\ndependencies = [\"a\"]\n").is_err());
    }
}
