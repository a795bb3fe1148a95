// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade; the binary decides which recorder collects
//! them.

use metrics::{describe_counter, describe_gauge};
use plughost_extension::ReattachStats;

/// Register all loader metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "plughost_plugin_loads_total",
        "Plugin load attempts by outcome"
    );
    describe_counter!("plughost_plugin_unloads_total", "Plugin units unloaded");
    describe_counter!("plughost_plugin_rescans_total", "Plugin directory rescans");
    describe_gauge!(
        "plughost_plugin_cleanups_pending",
        "Unloaded units whose artifact copy is not yet deleted"
    );
    describe_gauge!("plughost_plugins_running", "Currently running plugins");
    describe_counter!(
        "plughost_extension_reattach_total",
        "Registrations handled by reloads, by mode"
    );
}

/// Record a load attempt. `outcome` is loaded, reloaded, restarted or failed.
pub fn record_load(outcome: &'static str) {
    metrics::counter!("plughost_plugin_loads_total", "outcome" => outcome).increment(1);
}

pub fn record_unload() {
    metrics::counter!("plughost_plugin_unloads_total").increment(1);
}

pub fn record_rescan() {
    metrics::counter!("plughost_plugin_rescans_total").increment(1);
}

pub fn set_cleanups_pending(count: usize) {
    metrics::gauge!("plughost_plugin_cleanups_pending").set(count as f64);
}

pub fn set_running(count: usize) {
    metrics::gauge!("plughost_plugins_running").set(count as f64);
}

/// Record the outcome of one reattach pass.
pub fn record_reattach(stats: &ReattachStats) {
    metrics::counter!("plughost_extension_reattach_total", "mode" => "swapped")
        .increment(stats.swapped as u64);
    metrics::counter!("plughost_extension_reattach_total", "mode" => "attached")
        .increment(stats.attached as u64);
    metrics::counter!("plughost_extension_reattach_total", "mode" => "detached")
        .increment(stats.detached as u64);
}
