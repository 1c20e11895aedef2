// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Manifest of installed paths.
//!
//! The manifest is the durable record of every destination path that dotup
//! previously installed. It is what separates "this file is ours to update"
//! from "this file was already here, hands off until the user says so", and
//! it is the only way stale installs can be detected once their declaration
//! goes away.
//!
//! # File Layout
//!
//! The manifest is a single JSON object:
//!
//! ```json
//! {
//!     "version": 1,
//!     "revision": "<commit of the dotfiles repository at save time>",
//!     "installed": ["sorted", "destination", "paths"]
//! }
//! ```
//!
//! The version field guards the format. If it ever needs to change, the
//! version *must* be bumped and a migration has to be written. Until such a
//! migration exists, any unrecognized version is fatal rather than silently
//! reset, because resetting would orphan every previously installed path.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::debug;

const MANIFEST_VERSION: u64 = 1;

/// Persisted set of installed destination paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    path: PathBuf,
    installed: BTreeSet<String>,
}

#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    version: Option<u64>,

    #[serde(default)]
    installed: BTreeSet<String>,
}

#[derive(Debug, Serialize)]
struct SavedManifest<'set> {
    version: u64,
    revision: String,
    installed: &'set BTreeSet<String>,
}

impl Manifest {
    /// Load manifest from target path.
    ///
    /// A missing file is a fresh install, not an error, and yields an empty
    /// installed-set bound to the same path.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::UnsupportedVersion`] if the version field is
    ///   absent or unrecognized.
    /// - Return [`ManifestError::Deserialize`] if the file is not valid JSON.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("no manifest at {:?}, starting fresh", path.display());
            return Ok(Self {
                path,
                installed: BTreeSet::new(),
            });
        }

        let raw: RawManifest = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if raw.version != Some(MANIFEST_VERSION) {
            return Err(ManifestError::UnsupportedVersion { found: raw.version });
        }

        Ok(Self {
            path,
            installed: raw.installed,
        })
    }

    /// Set of currently installed destination paths.
    pub fn installed(&self) -> &BTreeSet<String> {
        &self.installed
    }

    /// Check whether target destination path is tracked.
    pub fn is_tracked(&self, name: &str) -> bool {
        self.installed.contains(name)
    }

    /// Record target destination path as installed.
    pub fn add(&mut self, name: impl Into<String>) {
        self.installed.insert(name.into());
    }

    /// Forget target destination path.
    ///
    /// Removing a path that was never tracked is a no-op. The installed-set
    /// may already be inconsistent from manual edits, so there is nothing
    /// useful to report here.
    pub fn remove(&mut self, name: &str) {
        self.installed.remove(name);
    }

    /// Write manifest back to its file.
    ///
    /// Serializes `{version, revision, sorted installed-set}` and replaces
    /// the previous file through a sibling temp file and rename, so a crash
    /// mid-write never leaves a truncated manifest behind.
    ///
    /// # Errors
    ///
    /// - Return [`ManifestError::Io`] if the file cannot be written.
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&SavedManifest {
            version: MANIFEST_VERSION,
            revision: source_revision(),
            installed: &self.installed,
        })?;

        let staging = self.path.with_extension("tmp");
        fs::write(&staging, content)?;
        fs::rename(&staging, &self.path)?;

        Ok(())
    }
}

/// Determine the commit the dotfiles repository is currently at.
///
/// Reads `.git/HEAD` from the current working directory directly instead of
/// invoking git, since git might be absent on a machine for some weird
/// reason. Returns `"unknown"` when there is no repository to inspect.
pub fn source_revision() -> String {
    read_head(Path::new(".git")).unwrap_or_else(|| "unknown".into())
}

fn read_head(gitdir: &Path) -> Option<String> {
    let head = fs::read_to_string(gitdir.join("HEAD")).ok()?;
    let head = head.lines().next()?.trim();

    match head.strip_prefix("ref: ") {
        Some(reference) => {
            let revision = fs::read_to_string(gitdir.join(reference)).ok()?;
            Some(revision.lines().next()?.trim().to_string())
        }
        None => Some(head.to_string()),
    }
}

/// Manifest error types.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// Manifest file exists, but its format version is not one we know how
    /// to read. Requires a migration, which does not exist yet.
    #[error("manifest format version {found:?} is not supported")]
    UnsupportedVersion { found: Option<u64> },

    /// Failed to deserialize or serialize manifest content.
    #[error(transparent)]
    Deserialize(#[from] serde_json::Error),

    /// Failed to read or write manifest file.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = ManifestError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;
    use std::fs;

    #[test]
    fn load_missing_file_yields_empty_set() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let manifest = Manifest::load(dir.path().join(".dotfiles"))?;
        assert!(manifest.installed().is_empty());
        Ok(())
    }

    #[test]
    fn save_then_load_round_trips_installed_set() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".dotfiles");

        let mut manifest = Manifest::load(&path)?;
        manifest.add(".vimrc");
        manifest.add(".zshrc");
        manifest.add(".config/fish/config.fish");
        manifest.save()?;

        let reloaded = Manifest::load(&path)?;
        assert_eq!(reloaded.installed(), manifest.installed());
        Ok(())
    }

    #[test]
    fn save_writes_sorted_version_one_layout() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".dotfiles");

        let mut manifest = Manifest::load(&path)?;
        manifest.add(".zshrc");
        manifest.add(".aliases");
        manifest.save()?;

        let content: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(content["version"], 1);
        assert_eq!(
            content["installed"],
            serde_json::json!([".aliases", ".zshrc"])
        );
        assert!(content["revision"].is_string());
        Ok(())
    }

    #[test]
    fn load_rejects_unknown_version() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".dotfiles");
        fs::write(
            &path,
            indoc! {r#"
                {
                    "version": 2,
                    "revision": "deadbeef",
                    "installed": [".vimrc"]
                }
            "#},
        )?;

        let result = Manifest::load(&path);
        assert!(matches!(
            result,
            Err(ManifestError::UnsupportedVersion { found: Some(2) })
        ));
        Ok(())
    }

    #[test]
    fn load_rejects_missing_version() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(".dotfiles");
        fs::write(&path, r#"{ "installed": [".vimrc"] }"#)?;

        let result = Manifest::load(&path);
        assert!(matches!(
            result,
            Err(ManifestError::UnsupportedVersion { found: None })
        ));
        Ok(())
    }

    #[test]
    fn remove_of_untracked_path_is_noop() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut manifest = Manifest::load(dir.path().join(".dotfiles"))?;
        manifest.add(".vimrc");

        manifest.remove(".never-added");
        assert_eq!(manifest.installed().len(), 1);
        Ok(())
    }

    #[sealed_test]
    fn source_revision_resolves_symbolic_head() {
        fs::create_dir_all(".git/refs/heads").unwrap();
        fs::write(".git/HEAD", "ref: refs/heads/main\n").unwrap();
        fs::write(
            ".git/refs/heads/main",
            "0123456789abcdef0123456789abcdef01234567\n",
        )
        .unwrap();

        assert_eq!(
            source_revision(),
            "0123456789abcdef0123456789abcdef01234567"
        );
    }

    #[sealed_test]
    fn source_revision_reads_detached_head() {
        fs::create_dir_all(".git").unwrap();
        fs::write(".git/HEAD", "fedcba9876543210fedcba9876543210fedcba98\n").unwrap();

        assert_eq!(
            source_revision(),
            "fedcba9876543210fedcba9876543210fedcba98"
        );
    }

    #[sealed_test]
    fn source_revision_without_repository_is_unknown() {
        assert_eq!(source_revision(), "unknown");
    }
}
