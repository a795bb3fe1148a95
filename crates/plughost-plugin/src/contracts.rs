// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Capability contracts the host knows by convention, and the extension
//! points it declares for them.

use plughost_core::{PluginError, ScopeKind};
use plughost_extension::ExtensionRegistry;

/// Contract id of command handlers; auto-discovered into [`SSH_COMMANDS`].
pub const SSH_COMMAND: &str = "ssh.command";
/// Contract id of HTTP handlers; auto-discovered into [`HTTP_SERVLETS`].
pub const HTTP_SERVLET: &str = "http.servlet";

/// `ssh` map point of commands keyed by command name.
pub const SSH_COMMANDS: &str = "commands";
/// `http` map point of servlets keyed by path.
pub const HTTP_SERVLETS: &str = "servlets";
/// `http` set point of web UI assets.
pub const WEB_UI: &str = "web-ui";

/// A command reachable through the command-line subsystem.
pub trait SshCommand: Send + Sync {
    fn run(&self, args: &[String]) -> Result<String, PluginError>;
}

/// A handler mounted under the plugin's URL space.
pub trait HttpServlet: Send + Sync {
    /// Body for `path`, or `None` when the servlet does not serve it.
    fn service(&self, path: &str) -> Option<String>;
}

/// A client-side asset the web UI loads.
pub trait WebUiPlugin: Send + Sync {
    fn plugin_name(&self) -> &str;
    fn url(&self) -> &str;
}

/// Start/stop hooks a module registers for its unit.
pub trait LifecycleListener: Send + Sync {
    fn start(&self) -> Result<(), PluginError>;
    fn stop(&self);
}

/// Declares the points for the conventional contracts. Scopes the host does
/// not serve are skipped.
pub fn declare_host_points(
    registry: &ExtensionRegistry,
    scopes: &[ScopeKind],
) -> Result<(), PluginError> {
    if scopes.contains(&ScopeKind::Ssh) {
        registry.declare_map::<dyn SshCommand>(ScopeKind::Ssh, SSH_COMMANDS)?;
    }
    if scopes.contains(&ScopeKind::Http) {
        registry.declare_map::<dyn HttpServlet>(ScopeKind::Http, HTTP_SERVLETS)?;
        registry.declare_set::<dyn WebUiPlugin>(ScopeKind::Http, WEB_UI)?;
    }
    Ok(())
}

/// Point a conventional contract is registered into.
pub(crate) fn known_contract(contract: &str) -> Option<(ScopeKind, &'static str)> {
    match contract {
        SSH_COMMAND => Some((ScopeKind::Ssh, SSH_COMMANDS)),
        HTTP_SERVLET => Some((ScopeKind::Http, HTTP_SERVLETS)),
        _ => None,
    }
}
