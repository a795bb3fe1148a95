// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code bundles linked into this binary.
//!
//! A plugin artifact names the bundle holding its code (`code = "..."`,
//! default: the plugin name). Bundles shipped with the host are registered
//! here.

use std::sync::Arc;

use plughost_core::PluginError;
use plughost_plugin::contracts::{HTTP_SERVLET, HttpServlet, SSH_COMMAND, SshCommand};
use plughost_plugin::scope::PLUGIN_NAME;
use plughost_plugin::{CodeBundle, CodeLibrary, ComponentSpec, Scope};

/// Host bundle plus every plugin bundle.
pub fn library() -> CodeLibrary {
    CodeLibrary::new(CodeBundle::new("host")).with_bundle(hello_bundle())
}

/// `hello`: a command and a servlet that greet from their plugin.
fn hello_bundle() -> CodeBundle {
    CodeBundle::new("hello")
        .component(
            "HelloCommand",
            ComponentSpec::export::<dyn SshCommand>(SSH_COMMAND, "hello", |scope| {
                Ok(Arc::new(HelloCommand {
                    plugin: plugin_name(scope)?,
                }) as Arc<dyn SshCommand>)
            }),
        )
        .component(
            "HelloServlet",
            ComponentSpec::export::<dyn HttpServlet>(HTTP_SERVLET, "hello", |scope| {
                Ok(Arc::new(HelloServlet {
                    plugin: plugin_name(scope)?,
                }) as Arc<dyn HttpServlet>)
            }),
        )
}

fn plugin_name(scope: &Scope) -> Result<String, PluginError> {
    scope
        .get::<String>(PLUGIN_NAME)
        .map(|name| (*name).clone())
        .ok_or_else(|| PluginError::Internal("plugin.name is not bound".to_string()))
}

struct HelloCommand {
    plugin: String,
}

impl SshCommand for HelloCommand {
    fn run(&self, args: &[String]) -> Result<String, PluginError> {
        let who = args.first().map_or("world", String::as_str);
        Ok(format!("hello {who} from {}", self.plugin))
    }
}

struct HelloServlet {
    plugin: String,
}

impl HttpServlet for HelloServlet {
    fn service(&self, path: &str) -> Option<String> {
        (path.is_empty() || path == "/").then(|| format!("hello from {}", self.plugin))
    }
}
