// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extension registry for the plughost plugin host.
//!
//! Host code declares typed [`ExtensionPoint`]s of item, set or map
//! cardinality. Plugin units hand [`Binding`]s to the [`ExtensionRegistry`],
//! keep the returned [`RegistrationHandle`]s, and on reload pass them back to
//! [`ExtensionRegistry::reattach`] so that registrations with a stable
//! [`BindingKey`] keep their identity while their implementation changes.

pub mod binding;
pub mod handle;
pub mod point;
pub mod provider;
pub mod registry;

pub use binding::Binding;
pub use handle::RegistrationHandle;
pub use point::{Cardinality, Extension, ExtensionPoint};
pub use provider::{BindingKey, ErasedProvider, Provider};
pub use registry::{ExtensionRegistry, PointInfo, ReattachStats};
