// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Downloading plugin artifacts over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use plughost_core::PluginError;
use plughost_plugin::ArtifactFetcher;
use tracing::debug;

/// [`ArtifactFetcher`] backed by a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, PluginError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("plughost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| PluginError::Fetch(format!("cannot build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PluginError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PluginError::Fetch(format!("{url}: {e}")))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| PluginError::Fetch(format!("{url}: {e}")))?;
        debug!(url, len = bytes.len(), "fetched plugin artifact");
        Ok(bytes.to_vec())
    }
}

/// True when `source` names a remote artifact rather than a local file.
pub fn is_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_told_apart_from_paths() {
        assert!(is_url("https://example.com/a.plugin"));
        assert!(is_url("http://localhost:8080/a.plugin"));
        assert!(!is_url("./a.plugin"));
        assert!(!is_url("/srv/plugins/a.plugin"));
    }
}
