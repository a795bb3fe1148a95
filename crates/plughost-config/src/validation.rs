// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation. Collects every problem instead of
//! stopping at the first.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::PlughostConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &PlughostConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.host.log_level.as_str()) {
        invalid(format!(
            "host.log_level `{}` is not one of {}",
            config.host.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    if let Some(url) = &config.host.canonical_web_url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        invalid(format!(
            "host.canonical_web_url `{url}` must be an http:// or https:// URL"
        ));
    }

    let plugins = &config.plugins;
    for (key, path) in [
        ("directory", &plugins.directory),
        ("data_directory", &plugins.data_directory),
        ("temp_directory", &plugins.temp_directory),
    ] {
        if path.as_os_str().is_empty() {
            invalid(format!("plugins.{key} must not be empty"));
        }
    }

    if plugins.cleanup_max_attempts == 0 {
        invalid("plugins.cleanup_max_attempts must be at least 1".to_string());
    }

    let mut seen = HashSet::new();
    for (i, name) in plugins.mandatory.iter().enumerate() {
        if name.trim().is_empty() {
            invalid(format!("plugins.mandatory[{i}] must not be empty"));
        } else if !seen.insert(name.as_str()) {
            invalid(format!("duplicate mandatory plugin `{name}`"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn messages(config: &PlughostConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&PlughostConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_problem() {
        let mut config = PlughostConfig::default();
        config.plugins.directory = PathBuf::new();
        config.plugins.cleanup_max_attempts = 0;
        config.plugins.mandatory = vec!["a".into(), "a".into(), " ".into()];

        let msgs = messages(&config);
        assert_eq!(msgs.len(), 4, "{msgs:?}");
        assert!(msgs.iter().any(|m| m.contains("plugins.directory")));
        assert!(msgs.iter().any(|m| m.contains("cleanup_max_attempts")));
        assert!(msgs.iter().any(|m| m.contains("duplicate mandatory plugin `a`")));
        assert!(msgs.iter().any(|m| m.contains("mandatory[2]")));
    }

    #[test]
    fn rejects_unknown_log_level_and_bad_url() {
        let mut config = PlughostConfig::default();
        config.host.log_level = "loud".into();
        config.host.canonical_web_url = Some("review.example.com".into());
        assert_eq!(messages(&config).len(), 2);
    }

    #[test]
    fn zero_check_frequency_is_allowed() {
        let mut config = PlughostConfig::default();
        config.plugins.check_frequency_secs = 0;
        assert!(validate_config(&config).is_ok());
        assert!(config.plugins.check_frequency().is_none());
    }
}
