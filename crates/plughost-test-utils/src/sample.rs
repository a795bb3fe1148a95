// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A sample `Greeter` contract with modules and components built on it.

use std::sync::Arc;

use parking_lot::Mutex;
use plughost_core::PluginError;
use plughost_plugin::contracts::LifecycleListener;
use plughost_plugin::scope::PLUGIN_NAME;
use plughost_plugin::{Binder, ComponentSpec, PluginModule};

/// `sys` map point of greeters keyed by export name.
pub const GREETERS: &str = "greeters";
/// `sys` item point holding the preferred greeter.
pub const DEFAULT_GREETER: &str = "default-greeter";

pub trait Greeter: Send + Sync {
    fn greet(&self, who: &str) -> String;
}

pub struct StaticGreeter {
    message: String,
}

impl StaticGreeter {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Greeter for StaticGreeter {
    fn greet(&self, who: &str) -> String {
        format!("{}, {who}", self.message)
    }
}

/// Exports one [`StaticGreeter`] into [`GREETERS`].
pub struct GreeterModule {
    export: String,
    message: String,
}

impl GreeterModule {
    pub fn new(export: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            export: export.into(),
            message: message.into(),
        }
    }
}

impl PluginModule for GreeterModule {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), PluginError> {
        let greeter: Arc<dyn Greeter> = Arc::new(StaticGreeter::new(&self.message));
        binder.export(GREETERS, &self.export, greeter)
    }
}

/// Binds the same export twice.
pub struct DuplicateModule;

impl PluginModule for DuplicateModule {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), PluginError> {
        let greeter: Arc<dyn Greeter> = Arc::new(StaticGreeter::new("hi"));
        binder.export(GREETERS, "twice", Arc::clone(&greeter))?;
        binder.export(GREETERS, "twice", greeter)
    }
}

/// Declares a `sys` set point of greeters owned by the plugin.
pub struct ExtraPointModule {
    pub contract: String,
}

impl PluginModule for ExtraPointModule {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), PluginError> {
        binder.declare_set::<dyn Greeter>(&self.contract)?;
        Ok(())
    }
}

/// Shared record of lifecycle events, e.g. `start:a`, `stop:a`.
pub type EventLog = Arc<Mutex<Vec<String>>>;

/// Registers listeners that record their start and stop into a log.
pub struct ListenerModule {
    pub log: EventLog,
    pub names: Vec<String>,
    /// Listener whose start fails.
    pub failing: Option<String>,
}

impl PluginModule for ListenerModule {
    fn configure(&self, binder: &mut Binder<'_>) -> Result<(), PluginError> {
        for name in &self.names {
            binder.add_listener(RecordingListener {
                log: Arc::clone(&self.log),
                name: name.clone(),
                fail: self.failing.as_deref() == Some(name.as_str()),
            });
        }
        Ok(())
    }
}

struct RecordingListener {
    log: EventLog,
    name: String,
    fail: bool,
}

impl LifecycleListener for RecordingListener {
    fn start(&self) -> Result<(), PluginError> {
        if self.fail {
            return Err(PluginError::Internal(format!("{} refused to start", self.name)));
        }
        self.log.lock().push(format!("start:{}", self.name));
        Ok(())
    }

    fn stop(&self) {
        self.log.lock().push(format!("stop:{}", self.name));
    }
}

/// Component exported into [`GREETERS`] that greets with its plugin's name.
pub fn greeter_component(export: &str) -> ComponentSpec {
    ComponentSpec::export::<dyn Greeter>(GREETERS, export, |scope| {
        let plugin = scope
            .get::<String>(PLUGIN_NAME)
            .ok_or_else(|| PluginError::Internal("plugin.name not bound".into()))?;
        Ok(Arc::new(StaticGreeter::new(format!("hello from {plugin}"))) as Arc<dyn Greeter>)
    })
}

/// Component offered for [`DEFAULT_GREETER`].
pub fn default_greeter_component(message: &str) -> ComponentSpec {
    let message = message.to_string();
    ComponentSpec::listen::<dyn Greeter>(DEFAULT_GREETER, move |_| {
        Ok(Arc::new(StaticGreeter::new(message.clone())) as Arc<dyn Greeter>)
    })
}
