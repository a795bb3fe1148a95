// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin directory scanning and filename deduplication.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use plughost_core::PluginError;
use tracing::{debug, warn};

use crate::provider::ProviderSet;

/// Suffix marking an inactive artifact.
pub const DISABLED_SUFFIX: &str = ".disabled";

pub fn is_disabled(path: &Path) -> bool {
    path.file_name()
        .and_then(OsStr::to_str)
        .is_some_and(|n| n.ends_with(DISABLED_SUFFIX))
}

/// `path` without a `.disabled` suffix.
pub fn active_path(path: &Path) -> PathBuf {
    match path.file_name().and_then(OsStr::to_str) {
        Some(name) if name.ends_with(DISABLED_SUFFIX) => {
            path.with_file_name(&name[..name.len() - DISABLED_SUFFIX.len()])
        }
        _ => path.to_path_buf(),
    }
}

/// `path` with a `.disabled` suffix appended.
pub fn disabled_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsStr::to_os_string).unwrap_or_default();
    name.push(DISABLED_SUFFIX);
    path.with_file_name(name)
}

/// Name a plugin file is known by: its declared name, else the file stem.
pub fn plugin_name(path: &Path, providers: &ProviderSet) -> Option<String> {
    let provider = providers.for_path(path)?;
    provider.declared_name(path).or_else(|| {
        active_path(path)
            .file_stem()
            .and_then(OsStr::to_str)
            .map(str::to_string)
    })
}

/// Every artifact in `dir` by plugin name, active and disabled alike.
///
/// Hidden files (including install staging and replaced-version files),
/// directories and unknown formats are skipped. Paths per name are in
/// filename order.
pub fn scan(
    dir: &Path,
    providers: &ProviderSet,
) -> Result<BTreeMap<String, Vec<PathBuf>>, PluginError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(PluginError::io(format!("cannot list {}", dir.display()), e));
        }
    };

    let mut found: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| PluginError::io(format!("cannot list {}", dir.display()), e))?;
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden || !path.is_file() {
            continue;
        }
        if let Some(name) = plugin_name(&path, providers) {
            found.entry(name).or_default().push(path);
        }
    }
    for paths in found.values_mut() {
        paths.sort();
    }
    Ok(found)
}

/// Result of a scan after deduplication.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Winning artifact per name, canonical formats first, then by filename.
    pub active: Vec<(String, PathBuf)>,
    /// Names with no active artifact and their first disabled file.
    pub disabled: BTreeMap<String, PathBuf>,
    /// Duplicates left in place because their disabled name is taken.
    pub stuck: Vec<PathBuf>,
}

impl ScanOutcome {
    pub fn active_path(&self, name: &str) -> Option<&Path> {
        self.active
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, p)| p.as_path())
    }
}

/// The artifact that loads for a name: first active path by canonical
/// format, then filename.
pub fn winner<'a>(providers: &ProviderSet, paths: &'a [PathBuf]) -> Option<&'a PathBuf> {
    paths
        .iter()
        .filter(|p| !is_disabled(p))
        .min_by(|a, b| precedence(providers, a, b))
}

fn precedence(providers: &ProviderSet, a: &Path, b: &Path) -> Ordering {
    let canonical = |p: &Path| providers.for_path(p).is_some_and(|p| p.is_canonical());
    canonical(b)
        .cmp(&canonical(a))
        .then_with(|| a.file_name().cmp(&b.file_name()))
}

/// Scans `dir` and disables every duplicate artifact.
///
/// When more than one active file maps to a name, the canonical format
/// wins, then the lowest filename; losers are renamed with the disabled
/// suffix. Running it twice without changes renames nothing the second
/// time.
pub fn scan_and_prune(dir: &Path, providers: &ProviderSet) -> Result<ScanOutcome, PluginError> {
    let mut outcome = ScanOutcome::default();
    for (name, paths) in scan(dir, providers)? {
        let (mut active, disabled): (Vec<_>, Vec<_>) =
            paths.into_iter().partition(|p| !is_disabled(p));
        active.sort_by(|a, b| precedence(providers, a, b));

        let mut candidates = active.into_iter();
        match candidates.next() {
            Some(winner) => {
                for loser in candidates {
                    if !demote(&name, &winner, &loser) {
                        outcome.stuck.push(loser);
                    }
                }
                outcome.active.push((name, winner));
            }
            None => {
                if let Some(first) = disabled.into_iter().next() {
                    outcome.disabled.insert(name, first);
                }
            }
        }
    }
    outcome
        .active
        .sort_by(|(_, a), (_, b)| precedence(providers, a, b));
    Ok(outcome)
}

/// Renames `loser` aside. False when its disabled name is already taken.
fn demote(name: &str, winner: &Path, loser: &Path) -> bool {
    let target = disabled_path(loser);
    if target.exists() {
        debug!(plugin = name, loser = %loser.display(), "disabled name already taken");
        return false;
    }
    match std::fs::rename(loser, &target) {
        Ok(()) => warn!(
            plugin = name,
            winner = %winner.display(),
            loser = %loser.display(),
            "duplicate plugin disabled"
        ),
        Err(e) => warn!(
            plugin = name,
            loser = %loser.display(),
            error = %e,
            "cannot disable duplicate plugin"
        ),
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, file: &str, content: &str) -> PathBuf {
        let path = dir.join(file);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn disabled_suffix_helpers() {
        let p = Path::new("/x/a.plugin.disabled");
        assert!(is_disabled(p));
        assert_eq!(active_path(p), Path::new("/x/a.plugin"));
        assert_eq!(disabled_path(Path::new("/x/a.js")), Path::new("/x/a.js.disabled"));
        assert!(!is_disabled(Path::new("/x/a.plugin")));
    }

    #[test]
    fn scan_skips_hidden_and_unknown_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello.plugin", "[plugin]\nname = \"hello\"\n");
        write(dir.path(), ".next_hello.plugin_1.tmp", "");
        write(dir.path(), ".last_hello.plugin", "");
        write(dir.path(), "notes.txt", "");
        std::fs::create_dir(dir.path().join("sub.plugin")).unwrap();

        let found = scan(dir.path(), &ProviderSet::default()).unwrap();
        assert_eq!(found.keys().collect::<Vec<_>>(), vec!["hello"]);
    }

    #[test]
    fn declared_name_overrides_the_file_name() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello-1.0.plugin", "[plugin]\nname = \"hello\"\n");
        write(dir.path(), "ui.js", "");
        let found = scan(dir.path(), &ProviderSet::default()).unwrap();
        assert!(found.contains_key("hello"));
        assert!(found.contains_key("ui"));
    }

    #[test]
    fn canonical_format_wins_and_dedup_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let providers = ProviderSet::default();
        write(dir.path(), "a.js", "");
        write(dir.path(), "b.plugin", "[plugin]\nname = \"a\"\n");
        write(dir.path(), "c.plugin", "[plugin]\nname = \"a\"\n");

        let first = scan_and_prune(dir.path(), &providers).unwrap();
        assert_eq!(first.active, vec![("a".to_string(), dir.path().join("b.plugin"))]);
        assert!(dir.path().join("a.js.disabled").exists());
        assert!(dir.path().join("c.plugin.disabled").exists());

        let listing = |d: &Path| {
            let mut names: Vec<_> = std::fs::read_dir(d)
                .unwrap()
                .map(|e| e.unwrap().file_name())
                .collect();
            names.sort();
            names
        };
        let before = listing(dir.path());
        let second = scan_and_prune(dir.path(), &providers).unwrap();
        assert_eq!(first, second);
        assert_eq!(before, listing(dir.path()));
    }

    #[test]
    fn loser_is_kept_when_disabled_name_is_taken() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.plugin", "[plugin]\nname = \"a\"\n");
        write(dir.path(), "a.js", "");
        write(dir.path(), "a.js.disabled", "old");
        let outcome = scan_and_prune(dir.path(), &ProviderSet::default()).unwrap();
        assert_eq!(outcome.active_path("a"), Some(dir.path().join("a.plugin").as_path()));
        assert!(dir.path().join("a.js").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.js.disabled")).unwrap(),
            "old"
        );
        assert_eq!(outcome.stuck, vec![dir.path().join("a.js")]);

        let again = scan_and_prune(dir.path(), &ProviderSet::default()).unwrap();
        assert_eq!(again, outcome);
    }

    #[test]
    fn winner_prefers_canonical_format_and_skips_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let providers = ProviderSet::default();
        write(dir.path(), "a.js", "");
        write(dir.path(), "b.plugin", "[plugin]\nname = \"a\"\n");
        write(dir.path(), "a.plugin.disabled", "[plugin]\nname = \"a\"\n");
        let found = scan(dir.path(), &providers).unwrap();
        let paths = &found["a"];
        assert_eq!(paths[0], dir.path().join("a.js"), "scan keeps filename order");
        assert_eq!(winner(&providers, paths), Some(&dir.path().join("b.plugin")));

        let only_disabled = vec![dir.path().join("a.plugin.disabled")];
        assert_eq!(winner(&providers, &only_disabled), None);
    }

    #[test]
    fn only_disabled_names_are_reported_as_disabled() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.plugin", "[plugin]\nname = \"a\"\n");
        write(dir.path(), "a.plugin.disabled", "[plugin]\nname = \"a\"\n");
        write(dir.path(), "b.plugin.disabled", "[plugin]\nname = \"b\"\n");
        let outcome = scan_and_prune(dir.path(), &ProviderSet::default()).unwrap();
        assert_eq!(outcome.active.len(), 1);
        assert_eq!(
            outcome.disabled.keys().collect::<Vec<_>>(),
            vec!["b"]
        );
    }

    #[test]
    fn missing_directory_scans_empty() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = scan_and_prune(&dir.path().join("absent"), &ProviderSet::default()).unwrap();
        assert!(outcome.active.is_empty());
    }
}
