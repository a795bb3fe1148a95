// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration errors as miette diagnostics pointing into `plughost.toml`.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// A configuration problem, renderable by miette.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(plughost::config::unknown_key),
        help("{}", key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("not a plughost setting")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(plughost::config::invalid_type))]
    InvalidType { key: String, detail: String },

    /// A value that parsed but makes no sense.
    #[error("validation error: {message}")]
    #[diagnostic(code(plughost::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(plughost::config::other))]
    Other(String),
}

fn key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? expected one of: {valid_keys}"),
        None => format!("expected one of: {valid_keys}"),
    }
}

/// Converts every error carried by `err` into a [`ConfigError`].
///
/// `toml_sources` holds `(path, content)` pairs used to point at the
/// offending key.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let table: Vec<String> = error.path.iter().map(ToString::to_string).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let table = match table.split_last() {
                        Some((last, parent)) if last == field => parent,
                        _ => &table[..],
                    };
                    let located = source_of(&error, toml_sources).and_then(|(path, content)| {
                        let offset = locate_key(content, table, field)?;
                        Some((
                            SourceSpan::new(offset.into(), field.len()),
                            NamedSource::new(path, content.clone()),
                        ))
                    });
                    let (span, src) = located.unzip();
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: closest_key(field, expected),
                        valid_keys: expected.join(", "),
                        span,
                        src,
                    }
                }
                Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
                    key: table.join("."),
                    detail: format!("found {actual}, expected {expected}"),
                },
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

/// The file an error came from. Inline strings carry no file, so the only
/// source given stands in for them.
fn source_of<'a>(
    error: &figment::Error,
    toml_sources: &'a [(String, String)],
) -> Option<&'a (String, String)> {
    let file = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => Some(path.display().to_string()),
        _ => None,
    };
    match file {
        Some(file) => toml_sources.iter().find(|(p, _)| *p == file),
        None if toml_sources.len() == 1 => toml_sources.first(),
        None => None,
    }
}

/// Byte offset of `key` as written in `content`, either as `key = ...`
/// inside the table named by `table`, or as a `[key]` header when `table`
/// is the root.
pub fn locate_key(content: &str, table: &[String], key: &str) -> Option<usize> {
    let wanted = table.join(".");
    let mut current = String::new();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim();
        if let Some(header) = trimmed.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
            current = header.trim().to_string();
            if wanted.is_empty() && current == key {
                return line.find(key).map(|at| offset + at);
            }
        } else if current == wanted
            && let Some(rest) = trimmed.strip_prefix(key)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + indent);
        }
        offset += line.len();
    }
    None
}

/// The expected key closest to `unknown`, if any is close enough to be a
/// likely typo.
pub fn closest_key(unknown: &str, expected: &[&str]) -> Option<String> {
    expected
        .iter()
        .map(|&key| (strsim::jaro_winkler(unknown, key), key))
        .filter(|&(score, _)| score > 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Renders diagnostics to stderr with miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        if handler.render_report(&mut out, error).is_err() {
            out.push_str(&format!("error: {error}\n"));
        }
    }
    eprint!("{out}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suggests_close_key() {
        let valid = &["directory", "data_directory", "check_frequency_secs"];
        assert_eq!(
            closest_key("check_frequncy_secs", valid),
            Some("check_frequency_secs".to_string())
        );
        assert_eq!(closest_key("zzzzzz", &["directory", "mandatory"]), None);
    }

    #[test]
    fn locates_key_inside_its_table() {
        let content = "mandatry = 1\n[host]\nmandatry = 2\n\n[plugins]\n  mandatry = []\n";
        let o = locate_key(content, &["plugins".to_string()], "mandatry").unwrap();
        assert_eq!(o, content.rfind("mandatry").unwrap());
        assert_eq!(locate_key(content, &[], "mandatry"), Some(0));
    }

    #[test]
    fn locates_unknown_table_header() {
        let content = "[host]\nlog_level = \"info\"\n[server]\nport = 1\n";
        let o = locate_key(content, &[], "server").unwrap();
        assert_eq!(&content[o..o + 6], "server");
    }

    #[test]
    fn prefix_of_a_longer_key_does_not_match() {
        let content = "[plugins]\ndirectory_extra = 1\n";
        assert_eq!(locate_key(content, &["plugins".to_string()], "directory"), None);
    }
}
