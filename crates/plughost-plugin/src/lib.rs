// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin loading for the plughost plugin host.
//!
//! The [`PluginLoader`] scans a plugins directory, builds a [`Plugin`] unit
//! for each artifact and wires the unit's extensions into the shared
//! [`plughost_extension::ExtensionRegistry`]. Changed artifacts are reloaded
//! in place when both versions allow it, so consumers holding extension
//! handles see the new implementation. Background tasks rescan the directory
//! ([`PeriodicRescan`]) and delete the temp copies unloaded units leave
//! behind ([`PluginCleaner`]).

pub mod admin;
pub mod cleaner;
pub mod code;
pub mod contracts;
pub mod discovery;
pub mod environment;
pub mod loader;
pub mod manifest;
pub mod module;
pub mod periodic;
pub mod provider;
pub mod recording;
pub mod scanner;
pub mod scope;
pub mod snapshot;
pub mod unit;

pub use admin::{ArtifactFetcher, InstallSource, ListOptions, PluginAdmin};
pub use cleaner::PluginCleaner;
pub use code::{CodeBundle, CodeDomain, CodeLibrary, ComponentSpec, Marker, Symbol};
pub use environment::{PluginEnvironment, PluginObserver};
pub use loader::{BrokenArtifact, LoadOutcome, LoaderConfig, PluginLoader};
pub use manifest::{HOST_API_VERSION, PluginDescriptor};
pub use module::{Binder, PluginModule};
pub use periodic::PeriodicRescan;
pub use provider::{ArtifactProvider, AssetProvider, LoadContext, ManifestProvider, ProviderSet};
pub use scope::Scope;
pub use snapshot::ArtifactSnapshot;
pub use unit::{CleanupHandle, Plugin, PluginInfo};
