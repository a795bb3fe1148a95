// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for plughost integration tests.
//!
//! # Components
//!
//! - [`TestHost`] - a loader over a scratch plugins directory with the
//!   sample extension points declared
//! - [`Descriptor`] - builder for `.plugin` descriptors
//! - [`sample`] - a `Greeter` contract with modules and components using it

pub mod artifacts;
pub mod harness;
pub mod sample;

pub use artifacts::{Descriptor, write_artifact};
pub use harness::{TestHost, TestHostBuilder};
pub use sample::{DEFAULT_GREETER, GREETERS, Greeter, StaticGreeter};
