// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! Personal dotfiles installer.
//!
//! Dotup copies a declared set of dotfiles, and clones a declared set of
//! pinned editor plugins, into a user's home directory. Every path it
//! installs gets recorded in a persisted __manifest__, which lets later runs
//! detect drift: files the user edited by hand, files that showed up outside
//! of dotup's control, and stale entries whose declaration was dropped.
//!
//! # Reconciliation
//!
//! A run always follows the same shape. The declared items get compared
//! against the filesystem and the manifest, producing a plan of three
//! disjoint buckets: new items that do not exist yet, changed items whose
//! on-disk state differs from the declared state, and removed paths that the
//! manifest still tracks but nothing declares anymore. The plan is then
//! applied either unattended, or interactively with a per-item confirmation
//! for anything that would clobber local edits.
//!
//! The manifest is only written back at the end of a run that actually
//! applied changes. A cancelled run discards the whole plan without touching
//! it.

pub mod diff;
pub mod git;
pub mod installer;
pub mod item;
pub mod manifest;
pub mod path;
pub mod report;

pub use crate::{
    git::{GitClient, GitError, SystemGit},
    installer::{Installer, InstallerError, Plan},
    item::{EditorFlavor, FileItem, Item, ItemError, RepoItem},
    manifest::{Manifest, ManifestError},
    report::Reporter,
};
