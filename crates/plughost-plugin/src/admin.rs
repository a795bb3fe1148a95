// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Administrative operations, as exposed to the REST and SSH layers.

use std::sync::Arc;

use async_trait::async_trait;
use plughost_core::PluginError;
use regex::Regex;
use tracing::info;

use crate::loader::PluginLoader;
use crate::unit::PluginInfo;

/// Fetches artifact bytes from a URL.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PluginError>;
}

/// Where an installed artifact comes from.
#[derive(Debug, Clone)]
pub enum InstallSource {
    Bytes(Vec<u8>),
    Url(String),
}

/// Listing filters. At most one of `prefix`, `substring` and `regex` may be
/// set.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Include disabled plugins.
    pub all: bool,
    pub prefix: Option<String>,
    /// Case-insensitive.
    pub substring: Option<String>,
    /// Must match the whole name.
    pub regex: Option<String>,
    pub start: usize,
    pub limit: Option<usize>,
}

enum NameFilter {
    Any,
    Prefix(String),
    Substring(String),
    Regex(Regex),
}

impl NameFilter {
    fn from_options(opts: &ListOptions) -> Result<Self, PluginError> {
        let set = [
            opts.prefix.is_some(),
            opts.substring.is_some(),
            opts.regex.is_some(),
        ];
        if set.iter().filter(|s| **s).count() > 1 {
            return Err(PluginError::Config(
                "specify only one of prefix, substring or regex".to_string(),
            ));
        }
        if let Some(prefix) = &opts.prefix {
            return Ok(NameFilter::Prefix(prefix.clone()));
        }
        if let Some(substring) = &opts.substring {
            return Ok(NameFilter::Substring(substring.to_lowercase()));
        }
        if let Some(pattern) = &opts.regex {
            let re = Regex::new(&format!("^(?:{pattern})$"))
                .map_err(|e| PluginError::Config(format!("invalid regex `{pattern}`: {e}")))?;
            return Ok(NameFilter::Regex(re));
        }
        Ok(NameFilter::Any)
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            NameFilter::Any => true,
            NameFilter::Prefix(p) => name.starts_with(p.as_str()),
            NameFilter::Substring(s) => name.to_lowercase().contains(s.as_str()),
            NameFilter::Regex(re) => re.is_match(name),
        }
    }
}

/// Policy-checked front of the loader.
pub struct PluginAdmin {
    loader: Arc<PluginLoader>,
    fetcher: Option<Arc<dyn ArtifactFetcher>>,
}

impl PluginAdmin {
    pub fn new(loader: Arc<PluginLoader>) -> Self {
        Self {
            loader,
            fetcher: None,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ArtifactFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn list(&self, opts: &ListOptions) -> Result<Vec<PluginInfo>, PluginError> {
        let filter = NameFilter::from_options(opts)?;
        let matching = self
            .loader
            .list(opts.all)
            .into_iter()
            .filter(|p| filter.matches(&p.name))
            .skip(opts.start);
        Ok(match opts.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    pub fn status(&self, name: &str) -> Result<PluginInfo, PluginError> {
        self.loader.get(name).ok_or_else(|| PluginError::NotFound {
            name: name.to_string(),
        })
    }

    /// Installs `name` from bytes or a URL.
    pub async fn install(
        &self,
        name: &str,
        source: InstallSource,
    ) -> Result<PluginInfo, PluginError> {
        self.check_policy()?;
        let bytes = match source {
            InstallSource::Bytes(bytes) => bytes,
            InstallSource::Url(url) => {
                let fetcher = self.fetcher.as_ref().ok_or_else(|| {
                    PluginError::Config("installing from a URL is not supported".to_string())
                })?;
                info!(plugin = name, url = %url, "fetching plugin");
                fetcher.fetch(&url).await?
            }
        };
        let loader = Arc::clone(&self.loader);
        let name = name.to_string();
        tokio::task::spawn_blocking(move || loader.install(&name, &bytes))
            .await
            .map_err(|e| PluginError::Internal(format!("install task failed: {e}")))?
    }

    pub fn enable(&self, names: &[String]) -> Result<(), PluginError> {
        self.check_policy()?;
        self.loader.enable(names)
    }

    pub fn disable(&self, names: &[String]) -> Result<(), PluginError> {
        self.check_policy()?;
        self.loader.disable(names)
    }

    pub fn reload(&self, names: &[String]) -> Result<(), PluginError> {
        self.check_policy()?;
        self.loader.reload(names)
    }

    fn check_policy(&self) -> Result<(), PluginError> {
        if self.loader.remote_admin_enabled() {
            Ok(())
        } else {
            Err(PluginError::RemoteAdminDisabled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(opts: ListOptions) -> Result<NameFilter, PluginError> {
        NameFilter::from_options(&opts)
    }

    #[test]
    fn filters_are_mutually_exclusive() {
        let err = filter(ListOptions {
            prefix: Some("a".into()),
            regex: Some("a.*".into()),
            ..Default::default()
        });
        assert!(matches!(err, Err(PluginError::Config(_))));
    }

    #[test]
    fn regex_matches_whole_name() {
        let f = filter(ListOptions {
            regex: Some("rep.*n".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(f.matches("replication"));
        assert!(!f.matches("xreplication"));
    }

    #[test]
    fn substring_ignores_case() {
        let f = filter(ListOptions {
            substring: Some("LIC".into()),
            ..Default::default()
        })
        .unwrap();
        assert!(f.matches("replication"));
        assert!(!f.matches("hooks"));
    }

    #[test]
    fn bad_regex_is_a_config_error() {
        assert!(matches!(
            filter(ListOptions {
                regex: Some("(".into()),
                ..Default::default()
            }),
            Err(PluginError::Config(_))
        ));
    }
}
