// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background deletion of the temp copies unloaded units leave behind.
//!
//! A copy can still be in use for a while after its unit stops. The cleaner
//! waits for the loader's unload hint, then retries with a doubling delay
//! until the queue is empty or the attempt budget is spent.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::loader::PluginLoader;

pub struct PluginCleaner {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PluginCleaner {
    pub fn spawn(
        loader: Arc<PluginLoader>,
        retry: Duration,
        max_attempts: u32,
        cancel: CancellationToken,
    ) -> Self {
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loader.cleanup_hint().notified() => {
                        drain_with_retry(&loader, retry, max_attempts, &token).await;
                    }
                    _ = token.cancelled() => break,
                }
            }
            let left = drain(&loader).await;
            info!(left, "plugin cleaner shutting down");
        });
        Self { cancel, task }
    }

    /// Cancels the task after one last drain.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "plugin cleaner task failed");
        }
    }
}

async fn drain(loader: &Arc<PluginLoader>) -> usize {
    let loader = Arc::clone(loader);
    match tokio::task::spawn_blocking(move || loader.process_pending_cleanups()).await {
        Ok(left) => left,
        Err(e) => {
            warn!(error = %e, "plugin cleanup panicked");
            0
        }
    }
}

async fn drain_with_retry(
    loader: &Arc<PluginLoader>,
    retry: Duration,
    max_attempts: u32,
    cancel: &CancellationToken,
) {
    let mut delay = retry;
    for attempt in 1..=max_attempts.max(1) {
        let left = drain(loader).await;
        if left == 0 {
            return;
        }
        if attempt >= max_attempts {
            warn!(left, attempts = attempt, "plugin temp copies still in use; waiting for the next unload");
            return;
        }
        debug!(left, attempt, delay_ms = delay.as_millis() as u64, "retrying plugin cleanup");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return,
        }
        delay = delay.saturating_mul(2);
    }
}
