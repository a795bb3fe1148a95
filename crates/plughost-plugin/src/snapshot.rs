// SPDX-FileCopyrightText: 2026 Plughost Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Content fingerprints of artifacts.

use std::path::Path;
use std::time::SystemTime;

use plughost_core::PluginError;
use sha2::{Digest, Sha256};

/// Fingerprint of an artifact: modification time, size and SHA-256 digest.
///
/// The digest catches rewrites that keep both mtime and size, which happens
/// when an artifact is replaced within the filesystem's timestamp resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    modified: Option<SystemTime>,
    len: u64,
    digest: String,
}

impl ArtifactSnapshot {
    pub fn save(path: &Path) -> Result<Self, PluginError> {
        let context = || format!("cannot snapshot {}", path.display());
        let meta = std::fs::metadata(path).map_err(|e| PluginError::io(context(), e))?;
        let bytes = std::fs::read(path).map_err(|e| PluginError::io(context(), e))?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
            digest: hex::encode(Sha256::digest(&bytes)),
        })
    }

    /// True when `path` no longer matches this snapshot, including when it
    /// cannot be read at all.
    pub fn is_modified(&self, path: &Path) -> bool {
        Self::save(path).map_or(true, |now| now != *self)
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_file_is_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.plugin");
        std::fs::write(&path, "v1").unwrap();
        let snap = ArtifactSnapshot::save(&path).unwrap();
        assert!(!snap.is_modified(&path));
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn same_size_rewrite_is_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.plugin");
        std::fs::write(&path, "v1").unwrap();
        let snap = ArtifactSnapshot::save(&path).unwrap();
        std::fs::write(&path, "v2").unwrap();
        assert!(snap.is_modified(&path));
    }

    #[test]
    fn missing_file_is_modified() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.plugin");
        std::fs::write(&path, "v1").unwrap();
        let snap = ArtifactSnapshot::save(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(snap.is_modified(&path));
        assert!(ArtifactSnapshot::save(&path).is_err());
    }
}
