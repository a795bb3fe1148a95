// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `plughost serve` command implementation.
//!
//! Loads the plugins directory, then keeps it in sync with a periodic rescan
//! while the cleaner removes the temp copies of unloaded plugins. SIGINT or
//! SIGTERM stops both tasks and unloads every plugin.

use std::sync::Arc;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use plughost_config::PlughostConfig;
use plughost_core::PluginError;
use plughost_plugin::{PeriodicRescan, PluginCleaner, PluginLoader, recording};
use tracing::{debug, info, warn};

use crate::host;
use crate::shutdown;

/// Runs the `plughost serve` command until a shutdown signal arrives.
pub async fn run_serve(config: PlughostConfig) -> Result<(), PluginError> {
    init_tracing(&config.host.log_level);
    let metrics = install_metrics();

    let loader = host::build_loader(&config)?;
    blocking(&loader, |loader| loader.start()).await??;
    info!(
        running = loader.list(false).len(),
        broken = loader.broken().len(),
        "plughost started"
    );

    let cancel = shutdown::install_signal_handler();
    let rescan = match config.plugins.check_frequency() {
        Some(period) => Some(PeriodicRescan::spawn(
            Arc::clone(&loader),
            period,
            cancel.child_token(),
        )),
        None => {
            info!("periodic plugin rescan disabled");
            None
        }
    };
    let cleaner = PluginCleaner::spawn(
        Arc::clone(&loader),
        config.plugins.cleanup_retry(),
        config.plugins.cleanup_max_attempts,
        cancel.child_token(),
    );

    cancel.cancelled().await;

    if let Some(rescan) = rescan {
        rescan.shutdown().await;
    }
    blocking(&loader, |loader| loader.stop()).await?;
    cleaner.shutdown().await;

    if let Some(handle) = metrics {
        debug!(metrics = %handle.render(), "final metrics");
    }
    info!("plughost stopped");
    Ok(())
}

/// Runs `f` against the loader on the blocking pool.
pub async fn blocking<R: Send + 'static>(
    loader: &Arc<PluginLoader>,
    f: impl FnOnce(&PluginLoader) -> R + Send + 'static,
) -> Result<R, PluginError> {
    let loader = Arc::clone(loader);
    tokio::task::spawn_blocking(move || f(&loader))
        .await
        .map_err(|e| PluginError::Internal(format!("loader task failed: {e}")))
}

/// Installs the Prometheus recorder. Metrics are optional: a failure is
/// logged and the host runs without them.
fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            recording::register_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "cannot install metrics recorder");
            None
        }
    }
}

/// Initializes the tracing subscriber with an env filter.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("plughost={log_level},warn")));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
