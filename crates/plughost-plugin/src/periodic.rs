// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background task rescanning the plugins directory on a fixed period.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::loader::PluginLoader;

pub struct PeriodicRescan {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PeriodicRescan {
    /// Starts rescanning every `period`, first after one full period.
    pub fn spawn(loader: Arc<PluginLoader>, period: Duration, cancel: CancellationToken) -> Self {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(period_secs = period.as_secs_f64(), "periodic plugin rescan started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let loader = Arc::clone(&loader);
                        match tokio::task::spawn_blocking(move || loader.rescan()).await {
                            Ok(Ok(())) => debug!("periodic plugin rescan finished"),
                            Ok(Err(e)) => warn!(error = %e, "periodic plugin rescan failed"),
                            Err(e) => error!(error = %e, "periodic plugin rescan panicked"),
                        }
                    }
                    _ = token.cancelled() => {
                        info!("periodic plugin rescan shutting down");
                        break;
                    }
                }
            }
        });
        Self { cancel, task }
    }

    /// Stops the task and waits for an in-flight rescan to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "periodic plugin rescan task failed");
        }
    }
}
