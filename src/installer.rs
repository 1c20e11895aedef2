// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Reconciliation engine.
//!
//! The installer compares the declared item set against the filesystem and
//! the manifest, classifies every tracked path, and applies the resulting
//! plan. Classification follows three rules:
//!
//! 1. A declared item whose destination does not exist is __new__.
//! 2. A declared item that exists but is untracked got there outside of
//!    dotup's control. It is adopted: reported with a warning, classified
//!    new when its content already matches the declared state, and changed
//!    otherwise. Adopting identical files avoids asking the user to "apply"
//!    an empty diff; different ones still get reviewed before overwrite.
//! 3. A tracked item is __changed__ exactly when its destination drifted,
//!    and skipped otherwise.
//!
//! Manifest entries no longer backed by a declaration form the __removed__
//! bucket. Their original item type is lost by then, so deletion probes the
//! filesystem instead: directories go recursively, files singly, and an
//! already-missing path counts as done.
//!
//! # Manifest Consistency
//!
//! The manifest is mutated per successfully applied item and written out
//! once the apply pass finishes. When a later item fails, the write still
//! happens, so everything installed before the failure stays tracked
//! instead of being re-reported as drift on the next run. The single
//! exception is user cancellation, which discards the whole plan without a
//! manifest write.

use crate::{
    git::{GitClient, SystemGit},
    item::{Item, ItemError},
    manifest::{Manifest, ManifestError},
    report::Reporter,
};

use inquire::{Confirm, InquireError};
use std::{
    collections::HashSet,
    fs,
    io::{stdout, ErrorKind, IsTerminal},
    path::{Path, PathBuf},
};
use tracing::{info, warn};

/// Reconciliation plan: three disjoint buckets of work.
#[derive(Clone, Debug, Default)]
pub struct Plan {
    /// Declared items whose destination does not exist yet.
    pub new: Vec<Item>,

    /// Declared items whose destination drifted from the declared state.
    pub changed: Vec<Item>,

    /// Tracked destination paths no longer backed by a declaration.
    pub removed: Vec<String>,
}

impl Plan {
    pub fn is_empty(&self) -> bool {
        self.new.is_empty() && self.changed.is_empty() && self.removed.is_empty()
    }
}

/// Dotfiles installer.
///
/// Owns the declared item set, the in-memory manifest, and the plan derived
/// from them for the duration of one run. Nothing else mutates either.
#[derive(Debug)]
pub struct Installer<G = SystemGit>
where
    G: GitClient,
{
    root: PathBuf,
    manifest: Manifest,
    items: Vec<Item>,
    git: G,
    reporter: Reporter,
    attended: bool,
}

impl<G> Installer<G>
where
    G: GitClient,
{
    /// Construct new installer over target install root.
    pub fn new(root: impl Into<PathBuf>, manifest: Manifest, git: G, reporter: Reporter) -> Self {
        Self {
            root: root.into(),
            manifest,
            items: Vec::new(),
            git,
            reporter,
            attended: stdout().is_terminal(),
        }
    }

    /// Override terminal detection.
    ///
    /// Interactive installs require an attended terminal; by default that is
    /// detected from stdout. Threading the value through here keeps the
    /// decision out of process-wide state.
    pub fn attended(mut self, attended: bool) -> Self {
        self.attended = attended;
        self
    }

    /// Declare a list of files to install.
    ///
    /// Each name is a destination path relative to the install root; the
    /// matching source lives at the same relative path under `base`.
    pub fn add_files(
        &mut self,
        files: impl IntoIterator<Item = impl Into<String>>,
        base: impl AsRef<Path>,
    ) {
        for file in files {
            let name = file.into();
            let source = base.as_ref().join(&name);
            self.add_item(Item::File(crate::item::FileItem::new(name, source)));
        }
    }

    /// Declare a single item to install.
    ///
    /// # Panics
    ///
    /// Two declared items must never share a destination path; a duplicate
    /// is a mistake in the declared lists, not a runtime condition.
    pub fn add_item(&mut self, item: Item) {
        let item = item.rooted(&self.root);
        assert!(
            self.items.iter().all(|known| known.name() != item.name()),
            "duplicate declared item {:?}",
            item.name()
        );
        self.items.push(item);
    }

    /// Compare declared items against the filesystem and the manifest.
    ///
    /// Read-only; the returned plan partitions the declared set that exists
    /// on disk into new and changed, and lists stale manifest entries as
    /// removed.
    pub fn collect_changes(&self) -> Result<Plan> {
        let mut plan = Plan::default();

        for item in &self.items {
            if !item.dest().exists() {
                plan.new.push(item.clone());
            } else if !self.manifest.is_tracked(item.name()) {
                warn!("{:?} already installed but untracked", item.name());
                if item.changed(&self.git)? {
                    plan.changed.push(item.clone());
                } else {
                    plan.new.push(item.clone());
                }
            } else if item.changed(&self.git)? {
                plan.changed.push(item.clone());
            }
        }

        let declared: HashSet<&str> = self.items.iter().map(Item::name).collect();
        plan.removed = self
            .manifest
            .installed()
            .iter()
            .filter(|name| !declared.contains(name.as_str()))
            .cloned()
            .collect();

        Ok(plan)
    }

    /// Print the plan's three buckets as a summary list.
    pub fn print_changes(&self, plan: &Plan) {
        self.reporter.summary(plan);
    }

    /// Dry run: report what would change without changing anything.
    ///
    /// Prints the summary plus the diff of every changed item. Performs no
    /// filesystem mutation and no manifest save under any circumstance.
    pub fn preview(&self) -> Result<()> {
        let plan = self.collect_changes()?;
        self.print_changes(&plan);

        for item in &plan.changed {
            self.reporter.diff(&item.render_diff(&self.git)?);
        }

        Ok(())
    }

    /// Apply the reconciliation plan.
    ///
    /// Non-interactive: installs every new and changed item, deletes every
    /// removed path, then saves the manifest.
    ///
    /// Interactive: requires an attended terminal up front, prints the
    /// summary, asks once whether to proceed at all, then confirms each
    /// changed item (with its diff) and each removed path individually. New
    /// items never prompt, since installing one cannot clobber unreviewed
    /// local edits. Skipped items keep their manifest entry untouched.
    ///
    /// # Errors
    ///
    /// - Return [`InstallerError::NotATty`] if interactive mode was requested
    ///   without an attended terminal, before any mutation.
    /// - Return [`InstallerError::Cancelled`] if the user declined or
    ///   interrupted; nothing more gets applied and the manifest stays
    ///   untouched on disk.
    pub fn apply(&mut self, interactive: bool) -> Result<()> {
        if interactive && !self.attended {
            return Err(InstallerError::NotATty);
        }

        let plan = self.collect_changes()?;

        if interactive {
            self.print_changes(&plan);
            if !plan.is_empty() && !self.confirm("Apply the changes above?")? {
                return Err(InstallerError::Cancelled);
            }
        }

        let outcome = self.apply_plan(&plan, interactive);
        if matches!(outcome, Err(InstallerError::Cancelled)) {
            return outcome;
        }

        // Failures keep whatever was applied before them, so the manifest
        // write must happen even on the error path.
        self.manifest.save()?;
        outcome
    }

    fn apply_plan(&mut self, plan: &Plan, interactive: bool) -> Result<()> {
        for item in &plan.new {
            info!("installing {:?}", item.name());
            item.install(&self.git)?;
            self.manifest.add(item.name());
        }

        for item in &plan.changed {
            if interactive {
                self.reporter.diff(&item.render_diff(&self.git)?);
                if !self.confirm(&format!("Apply changes to {:?}?", item.name()))? {
                    continue;
                }
            }

            info!("updating {:?}", item.name());
            item.install(&self.git)?;
            self.manifest.add(item.name());

            if interactive {
                self.reporter.applied(item.name());
            }
        }

        for name in &plan.removed {
            if interactive && !self.confirm(&format!("Delete {name:?}?"))? {
                continue;
            }

            info!("removing {name:?}");
            self.remove_path(name)?;
            self.manifest.remove(name);
        }

        Ok(())
    }

    // The removed bucket only has paths, not typed items, so the kind of
    // deletion is decided by probing the filesystem at removal time.
    fn remove_path(&self, name: &str) -> Result<()> {
        let dest = self.root.join(name);
        match fs::symlink_metadata(&dest) {
            Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(&dest)?,
            Ok(_) => fs::remove_file(&dest)?,
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(error.into()),
        }

        Ok(())
    }

    fn confirm(&self, message: &str) -> Result<bool> {
        match Confirm::new(message).with_default(false).prompt() {
            Ok(answer) => Ok(answer),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => {
                Err(InstallerError::Cancelled)
            }
            Err(error) => Err(InstallerError::Prompt(error)),
        }
    }
}

/// Installer error types.
#[derive(Debug, thiserror::Error)]
pub enum InstallerError {
    /// Interactive install requested without an attended terminal. Raised
    /// before any mutation; the caller should retry non-interactively.
    #[error("cannot run interactive install while not at a tty")]
    NotATty,

    /// User declined or interrupted the run. Nothing further was applied
    /// and the manifest was not saved.
    #[error("installation cancelled")]
    Cancelled,

    /// An item failed to inspect or install.
    #[error(transparent)]
    Item(#[from] ItemError),

    /// Manifest could not be loaded or saved.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Confirmation prompt failed for a reason other than cancellation.
    #[error(transparent)]
    Prompt(#[from] InquireError),

    /// Removed path could not be deleted.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = InstallerError> = std::result::Result<T, E>;
