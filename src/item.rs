// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Installation items.
//!
//! An __item__ is one thing the installer knows how to place at a
//! destination path: either a plain file copied byte-for-byte from the
//! dotfiles repository, or an editor plugin repository cloned and pinned to
//! an exact revision. Every item answers the same three questions: did the
//! destination drift from the declared state, what does that drift look
//! like, and how do we bring the destination back in line.
//!
//! Only these two variants exist, so the capability set is a plain sum type
//! rather than a trait object hierarchy.
//!
//! # Identity
//!
//! Items are identified by their destination path relative to the install
//! root. That relative path is also what the manifest records, which is why
//! two declared items must never share one.

use crate::{
    diff::{unified_diff, DiffLine, DiffTag},
    git::{GitClient, GitError},
};

use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// One declared installation item.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Item {
    /// Single file copied from the dotfiles repository.
    File(FileItem),

    /// Pinned external repository, e.g. an editor plugin.
    Repo(RepoItem),
}

impl Item {
    /// Destination path relative to the install root.
    pub fn name(&self) -> &str {
        match self {
            Item::File(file) => &file.name,
            Item::Repo(repo) => &repo.name,
        }
    }

    /// Full destination path.
    pub fn dest(&self) -> &Path {
        match self {
            Item::File(file) => &file.dest,
            Item::Repo(repo) => &repo.dest,
        }
    }

    /// Check whether the destination drifted from the declared state.
    ///
    /// Read-only; never mutates the destination.
    ///
    /// # Errors
    ///
    /// - Return [`ItemError::SourceMissing`] if a file item's source is gone.
    /// - Return [`ItemError::Io`] if the destination cannot be read.
    /// - Return [`ItemError::Git`] if the destination is not a repository
    ///   that git can inspect.
    pub fn changed(&self, git: &impl GitClient) -> Result<bool> {
        match self {
            Item::File(file) => file.changed(),
            Item::Repo(repo) => repo.changed(git),
        }
    }

    /// Render a line comparison between current and desired state.
    ///
    /// Pure read; printing and colorizing belong to the output collaborator.
    pub fn render_diff(&self, git: &impl GitClient) -> Result<Vec<DiffLine>> {
        match self {
            Item::File(file) => file.render_diff(),
            Item::Repo(repo) => repo.render_diff(git),
        }
    }

    /// Bring the destination into the declared state.
    ///
    /// Safe to re-run when the destination is already correct.
    pub fn install(&self, git: &impl GitClient) -> Result<()> {
        match self {
            Item::File(file) => file.install(),
            Item::Repo(repo) => repo.install(git),
        }
    }

    /// Anchor the destination path under target install root.
    pub(crate) fn rooted(self, root: &Path) -> Self {
        match self {
            Item::File(mut file) => {
                file.dest = root.join(&file.name);
                Item::File(file)
            }
            Item::Repo(mut repo) => {
                repo.dest = root.join(&repo.name);
                Item::Repo(repo)
            }
        }
    }
}

/// File copied byte-for-byte to its destination.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileItem {
    name: String,
    source: PathBuf,
    dest: PathBuf,
}

impl FileItem {
    /// Construct new file item.
    ///
    /// `name` is the destination path relative to the install root, and
    /// `source` is the actual file location to copy from.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        let name = name.into();
        let dest = PathBuf::from(&name);
        Self {
            name,
            source: source.into(),
            dest,
        }
    }

    fn changed(&self) -> Result<bool> {
        if !self.source.exists() {
            return Err(ItemError::SourceMissing(self.source.clone()));
        }

        let source = fs::read(&self.source)?;
        let dest = fs::read(&self.dest)?;
        Ok(source != dest)
    }

    fn render_diff(&self) -> Result<Vec<DiffLine>> {
        let current = String::from_utf8_lossy(&fs::read(&self.dest)?).into_owned();
        let desired = String::from_utf8_lossy(&fs::read(&self.source)?).into_owned();

        Ok(unified_diff(
            &current,
            &desired,
            &self.dest.display().to_string(),
            &self.source.display().to_string(),
        ))
    }

    fn install(&self) -> Result<()> {
        if !self.source.exists() {
            return Err(ItemError::SourceMissing(self.source.clone()));
        }

        if let Some(parent) = self.dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&self.source, &self.dest)?;
        debug!("copied {:?} to {:?}", self.source.display(), self.dest.display());

        Ok(())
    }
}

/// External repository pinned to an exact revision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepoItem {
    name: String,
    dest: PathBuf,
    url: String,
    revision: String,
}

/// Which editor's native package directory a plugin gets installed into.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EditorFlavor {
    #[default]
    Neovim,

    Vim,
}

impl RepoItem {
    /// Construct new repository item.
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        revision: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let dest = PathBuf::from(&name);
        Self {
            name,
            dest,
            url: url.into(),
            revision: revision.into(),
        }
    }

    /// Derive a plugin item from its short GitHub name.
    ///
    /// Given `owner/repo`, the remote URL becomes
    /// `https://github.com/owner/repo.git`, and the destination lands in the
    /// editor's native package directory under `pack/default/start`. Pure
    /// derivation, no I/O.
    pub fn vim_plugin(
        name: &str,
        revision: impl Into<String>,
        flavor: EditorFlavor,
    ) -> Self {
        let repo = name.rsplit('/').next().unwrap_or(name);
        let relative = match flavor {
            EditorFlavor::Neovim => {
                format!(".local/share/nvim/site/pack/default/start/{repo}")
            }
            EditorFlavor::Vim => format!(".vim/pack/default/start/{repo}"),
        };

        Self::new(relative, format!("https://github.com/{name}.git"), revision)
    }

    /// Remote URL the repository must point at.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Commit the repository must be checked out to.
    pub fn revision(&self) -> &str {
        &self.revision
    }

    fn changed(&self, git: &impl GitClient) -> Result<bool> {
        if git.head_revision(&self.dest)? != self.revision {
            return Ok(true);
        }

        Ok(git.remote_url(&self.dest)? != self.url)
    }

    fn render_diff(&self, git: &impl GitClient) -> Result<Vec<DiffLine>> {
        let head = git.head_revision(&self.dest)?;
        let url = git.remote_url(&self.dest)?;
        let mut lines = Vec::new();

        if head != self.revision {
            lines.push(DiffLine::new(DiffTag::Removed, format!("-revision: {head}")));
            lines.push(DiffLine::new(
                DiffTag::Added,
                format!("+revision: {}", self.revision),
            ));
        }

        if url != self.url {
            lines.push(DiffLine::new(DiffTag::Removed, format!("-url: {url}")));
            lines.push(DiffLine::new(DiffTag::Added, format!("+url: {}", self.url)));
        }

        Ok(lines)
    }

    fn install(&self, git: &impl GitClient) -> Result<()> {
        if !self.dest.join(".git").exists() {
            git.clone_repo(&self.url, &self.dest)?;

            // INVARIANT: Never leave an unpinned checkout behind.
            if let Err(error) = git.checkout(&self.dest, &self.revision) {
                if let Err(cleanup) = fs::remove_dir_all(&self.dest) {
                    warn!(
                        "failed to remove partial clone {:?}: {cleanup}",
                        self.dest.display()
                    );
                }
                return Err(error.into());
            }

            return Ok(());
        }

        if git.remote_url(&self.dest)? != self.url {
            git.set_remote_url(&self.dest, &self.url)?;
        }
        git.fetch(&self.dest)?;
        git.checkout(&self.dest, &self.revision)?;

        Ok(())
    }
}

/// Installation item error types.
#[derive(Debug, thiserror::Error)]
pub enum ItemError {
    /// Declared source file does not exist in the dotfiles repository.
    #[error("source file {0:?} does not exist")]
    SourceMissing(PathBuf),

    /// Git client failed while inspecting or installing a repository item.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Destination or source could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = ItemError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;
    use std::fs;

    struct NoGit;

    impl GitClient for NoGit {
        fn clone_repo(&self, _: &str, _: &Path) -> std::result::Result<(), GitError> {
            unreachable!("file items never touch git")
        }

        fn fetch(&self, _: &Path) -> std::result::Result<(), GitError> {
            unreachable!("file items never touch git")
        }

        fn checkout(&self, _: &Path, _: &str) -> std::result::Result<(), GitError> {
            unreachable!("file items never touch git")
        }

        fn remote_url(&self, _: &Path) -> std::result::Result<String, GitError> {
            unreachable!("file items never touch git")
        }

        fn set_remote_url(&self, _: &Path, _: &str) -> std::result::Result<(), GitError> {
            unreachable!("file items never touch git")
        }

        fn head_revision(&self, _: &Path) -> std::result::Result<String, GitError> {
            unreachable!("file items never touch git")
        }
    }

    fn file_item(dir: &Path, name: &str, source_content: &str) -> Item {
        let source = dir.join("repo").join(name);
        fs::create_dir_all(source.parent().unwrap()).unwrap();
        fs::write(&source, source_content).unwrap();
        Item::File(FileItem::new(name, source)).rooted(&dir.join("home"))
    }

    #[test]
    fn file_with_identical_content_is_unchanged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = file_item(dir.path(), ".vimrc", "set nocompatible\n");
        item.install(&NoGit)?;

        assert!(!item.changed(&NoGit)?);
        Ok(())
    }

    #[test]
    fn file_with_different_content_is_changed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = file_item(dir.path(), ".vimrc", "set nocompatible\n");
        item.install(&NoGit)?;
        fs::write(item.dest(), "set compatible\n")?;

        assert!(item.changed(&NoGit)?);
        Ok(())
    }

    #[test]
    fn file_install_creates_parent_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = file_item(dir.path(), ".config/fish/config.fish", "set -x EDITOR nvim\n");
        item.install(&NoGit)?;

        assert_eq!(
            fs::read_to_string(item.dest())?,
            "set -x EDITOR nvim\n"
        );
        Ok(())
    }

    #[test]
    fn file_install_overwrites_existing_destination() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = file_item(dir.path(), ".zshrc", "export PAGER=less\n");
        fs::create_dir_all(item.dest().parent().unwrap())?;
        fs::write(item.dest(), "stale content\n")?;

        item.install(&NoGit)?;
        assert_eq!(fs::read_to_string(item.dest())?, "export PAGER=less\n");
        Ok(())
    }

    #[test]
    fn missing_source_is_reported_as_such() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = Item::File(FileItem::new(".vimrc", dir.path().join("nowhere")))
            .rooted(dir.path());

        assert!(matches!(
            item.changed(&NoGit),
            Err(ItemError::SourceMissing(_))
        ));
        assert!(matches!(
            item.install(&NoGit),
            Err(ItemError::SourceMissing(_))
        ));
        Ok(())
    }

    #[test]
    fn file_diff_shows_drift_between_destination_and_source() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let item = file_item(dir.path(), ".aliases", "alias ll='ls -l'\n");
        item.install(&NoGit)?;
        fs::write(item.dest(), "alias ll='ls -la'\n")?;

        let lines = item.render_diff(&NoGit)?;
        assert!(lines
            .iter()
            .any(|line| line.tag == DiffTag::Removed && line.text == "-alias ll='ls -la'"));
        assert!(lines
            .iter()
            .any(|line| line.tag == DiffTag::Added && line.text == "+alias ll='ls -l'"));
        Ok(())
    }

    #[test_case(
        EditorFlavor::Neovim,
        ".local/share/nvim/site/pack/default/start/vim-commentary";
        "neovim native package path"
    )]
    #[test_case(
        EditorFlavor::Vim,
        ".vim/pack/default/start/vim-commentary";
        "vim native package path"
    )]
    #[test]
    fn vim_plugin_derives_destination_from_short_name(flavor: EditorFlavor, expect: &str) {
        use pretty_assertions::assert_eq;

        let plugin = RepoItem::vim_plugin("tpope/vim-commentary", "abc123", flavor);

        assert_eq!(Item::Repo(plugin.clone()).name(), expect);
        assert_eq!(plugin.url(), "https://github.com/tpope/vim-commentary.git");
        assert_eq!(plugin.revision(), "abc123");
    }
}
