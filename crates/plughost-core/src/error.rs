// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the plughost plugin host.

use std::path::PathBuf;

use thiserror::Error;

/// The primary error type used by the loader, the extension registry and the
/// administrative surface.
///
/// Only [`PluginError::MissingMandatoryPlugin`] is fatal to server startup;
/// every other variant is recovered locally and reported.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Malformed metadata, unsupported packaging or a discovery classification failure.
    #[error("invalid plugin artifact {}: {message}", path.display())]
    InvalidArtifact { path: PathBuf, message: String },

    /// The unit parsed but failed to start. The previously active version is kept.
    #[error("cannot install plugin {name}: {source}")]
    InstallFailure {
        name: String,
        source: Box<PluginError>,
    },

    /// One unit bound the same contract under the same binding key twice.
    #[error("plugin {plugin} provides {contract} with binding key `{key}` more than once")]
    DuplicateProvider {
        plugin: String,
        contract: String,
        key: String,
    },

    /// A keyed-map export name collides with an existing registration.
    #[error(
        "export `{export}` of {contract} is already provided by plugin {existing}; \
         plugin {plugin} cannot register it"
    )]
    AmbiguousExportName {
        contract: String,
        export: String,
        existing: String,
        plugin: String,
    },

    /// The dependency graph contains a cycle; `remaining` lists the unresolved nodes.
    #[error("cyclic dependency among: {remaining}")]
    CyclicDependency { remaining: String },

    /// Plugins required by policy did not load.
    #[error("mandatory plugins not loaded: {}", names.join(", "))]
    MissingMandatoryPlugin { names: Vec<String> },

    /// Remote administration is turned off by policy.
    #[error("remote plugin administration is disabled")]
    RemoteAdminDisabled,

    /// An operation that requires running plugins named ones that are not running.
    #[error("plugin(s) \"{}\" not running", names.join("\", \""))]
    NotRunning { names: Vec<String> },

    /// No plugin with this name is known to the loader.
    #[error("plugin not found: {name}")]
    NotFound { name: String },

    /// A binding's implementation type does not match the extension point.
    #[error("extension point {contract} expects {expected}, got {actual}")]
    ContractMismatch {
        contract: String,
        expected: String,
        actual: String,
    },

    /// No extension point with this contract is declared in the scope.
    #[error("no extension point {contract} declared in scope {scope}")]
    UnknownExtensionPoint { scope: String, contract: String },

    /// A lifecycle listener failed while a unit was starting.
    #[error("plugin {plugin} failed to start: {message}")]
    Lifecycle { plugin: String, message: String },

    /// Filesystem errors with the operation that caused them.
    #[error("{context}: {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    /// Invalid configuration or administrative request.
    #[error("configuration error: {0}")]
    Config(String),

    /// Fetching an artifact from a remote location failed.
    #[error("cannot fetch artifact: {0}")]
    Fetch(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PluginError {
    /// Wraps an I/O error with a description of what was being attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        PluginError::Io {
            context: context.into(),
            source,
        }
    }

    /// Builds an [`PluginError::InvalidArtifact`] for `path`.
    pub fn invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        PluginError::InvalidArtifact {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wraps `self` as the cause of a failed install of `name`.
    ///
    /// Already-wrapped failures are returned unchanged.
    pub fn into_install_failure(self, name: &str) -> Self {
        match self {
            err @ PluginError::InstallFailure { .. } => err,
            other => PluginError::InstallFailure {
                name: name.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// True only for failures that must abort server startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PluginError::MissingMandatoryPlugin { .. })
    }
}
