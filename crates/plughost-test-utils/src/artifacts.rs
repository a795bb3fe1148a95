// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Writing plugin artifacts to disk.

use std::path::{Path, PathBuf};

use toml::{Table, Value};

/// Writes `content` to `dir/file` and returns the path.
pub fn write_artifact(dir: &Path, file: &str, content: &str) -> std::io::Result<PathBuf> {
    let path = dir.join(file);
    std::fs::write(&path, content)?;
    Ok(path)
}

/// Builder for `.plugin` descriptor text.
#[derive(Debug, Clone, Default)]
pub struct Descriptor {
    name: String,
    version: Option<String>,
    api_version: Option<String>,
    api_type: Option<String>,
    code: Option<String>,
    restart: bool,
    api_module: Option<String>,
    dependencies: Vec<String>,
    classes: Vec<String>,
    modules: Vec<(String, String)>,
}

impl Descriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    pub fn api_type(mut self, api_type: impl Into<String>) -> Self {
        self.api_type = Some(api_type.into());
        self
    }

    /// Code bundle id; defaults to the plugin name.
    pub fn code(mut self, id: impl Into<String>) -> Self {
        self.code = Some(id.into());
        self
    }

    pub fn restart(mut self) -> Self {
        self.restart = true;
        self
    }

    pub fn api_module(mut self, symbol: impl Into<String>) -> Self {
        self.api_module = Some(symbol.into());
        self
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    pub fn class(mut self, symbol: impl Into<String>) -> Self {
        self.classes.push(symbol.into());
        self
    }

    /// Explicit module for `scope` (`sys`, `ssh` or `http`).
    pub fn module(mut self, scope: impl Into<String>, symbol: impl Into<String>) -> Self {
        self.modules.push((scope.into(), symbol.into()));
        self
    }

    pub fn render(&self) -> String {
        let mut plugin = Table::new();
        plugin.insert("name".into(), Value::String(self.name.clone()));
        let optional = [
            ("version", &self.version),
            ("api_version", &self.api_version),
            ("api_type", &self.api_type),
            ("code", &self.code),
            ("api_module", &self.api_module),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                plugin.insert(key.into(), Value::String(value.clone()));
            }
        }
        if self.restart {
            plugin.insert("reload".into(), Value::String("restart".into()));
        }
        if !self.dependencies.is_empty() {
            plugin.insert("dependencies".into(), strings(&self.dependencies));
        }
        if !self.classes.is_empty() {
            plugin.insert("classes".into(), strings(&self.classes));
        }

        let mut root = Table::new();
        root.insert("plugin".into(), Value::Table(plugin));
        if !self.modules.is_empty() {
            let modules: Table = self
                .modules
                .iter()
                .map(|(scope, symbol)| (scope.clone(), Value::String(symbol.clone())))
                .collect();
            root.insert("modules".into(), Value::Table(modules));
        }
        root.to_string()
    }

    /// Writes the descriptor as `dir/file`.
    pub fn write(&self, dir: &Path, file: &str) -> std::io::Result<PathBuf> {
        write_artifact(dir, file, &self.render())
    }
}

fn strings(values: &[String]) -> Value {
    Value::Array(values.iter().cloned().map(Value::String).collect())
}
