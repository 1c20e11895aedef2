// SPDX-FileCopyrightText: 2022 Dmitry Gerasimov <di.gerasimov@gmail.com>
// SPDX-License-Identifier: MIT

//! External git client seam.
//!
//! Plugin repositories are cloned and pinned through an external git client.
//! The installer only depends on this narrow synchronous contract: each call
//! either yields captured stdout or fails with the command's own complaint.
//! Everything else about the binary is a black box.

use std::{ffi::OsString, path::Path, process::Command};
use tracing::debug;

/// Version-control operations the installer needs from a git client.
pub trait GitClient {
    /// Clone remote repository to target destination path.
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Fetch latest state from the configured remote.
    fn fetch(&self, workdir: &Path) -> Result<()>;

    /// Check out target revision.
    fn checkout(&self, workdir: &Path, revision: &str) -> Result<()>;

    /// URL of the `origin` remote.
    fn remote_url(&self, workdir: &Path) -> Result<String>;

    /// Point the `origin` remote at a new URL.
    fn set_remote_url(&self, workdir: &Path, url: &str) -> Result<()>;

    /// Commit the repository is currently checked out at.
    fn head_revision(&self, workdir: &Path) -> Result<String>;
}

impl<G: GitClient + ?Sized> GitClient for &G {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        (**self).clone_repo(url, dest)
    }

    fn fetch(&self, workdir: &Path) -> Result<()> {
        (**self).fetch(workdir)
    }

    fn checkout(&self, workdir: &Path, revision: &str) -> Result<()> {
        (**self).checkout(workdir, revision)
    }

    fn remote_url(&self, workdir: &Path) -> Result<String> {
        (**self).remote_url(workdir)
    }

    fn set_remote_url(&self, workdir: &Path, url: &str) -> Result<()> {
        (**self).set_remote_url(workdir, url)
    }

    fn head_revision(&self, workdir: &Path) -> Result<String> {
        (**self).head_revision(workdir)
    }
}

/// Git client backed by the system git binary.
#[derive(Clone, Debug)]
pub struct SystemGit {
    program: OsString,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

impl SystemGit {
    /// Construct new client around target git program.
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn call(&self, args: impl IntoIterator<Item = OsString>) -> Result<String> {
        let args: Vec<OsString> = args.into_iter().collect();
        debug!("run {:?} {:?}", self.program, args);

        let output = Command::new(&self.program).args(&args).output()?;
        let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
        let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();

        if !output.status.success() {
            let message = if stderr.is_empty() { stdout } else { stderr };
            return Err(GitError::CommandFailed {
                args: args
                    .iter()
                    .map(|arg| arg.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(" "),
                message: chomp(message),
            });
        }

        Ok(chomp(stdout))
    }

    fn call_in(
        &self,
        workdir: &Path,
        args: impl IntoIterator<Item = OsString>,
    ) -> Result<String> {
        let mut full_args = vec![OsString::from("-C"), workdir.as_os_str().to_os_string()];
        full_args.extend(args);
        self.call(full_args)
    }
}

impl GitClient for SystemGit {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        self.call([
            OsString::from("clone"),
            OsString::from(url),
            dest.as_os_str().to_os_string(),
        ])?;
        Ok(())
    }

    fn fetch(&self, workdir: &Path) -> Result<()> {
        self.call_in(workdir, [OsString::from("fetch")])?;
        Ok(())
    }

    fn checkout(&self, workdir: &Path, revision: &str) -> Result<()> {
        self.call_in(
            workdir,
            [OsString::from("checkout"), OsString::from(revision)],
        )?;
        Ok(())
    }

    fn remote_url(&self, workdir: &Path) -> Result<String> {
        self.call_in(
            workdir,
            [
                OsString::from("remote"),
                OsString::from("get-url"),
                OsString::from("origin"),
            ],
        )
    }

    fn set_remote_url(&self, workdir: &Path, url: &str) -> Result<()> {
        self.call_in(
            workdir,
            [
                OsString::from("remote"),
                OsString::from("set-url"),
                OsString::from("origin"),
                OsString::from(url),
            ],
        )?;
        Ok(())
    }

    fn head_revision(&self, workdir: &Path) -> Result<String> {
        self.call_in(
            workdir,
            [OsString::from("rev-parse"), OsString::from("HEAD")],
        )
    }
}

// INVARIANT: Chomp trailing newlines.
fn chomp(message: String) -> String {
    message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message)
}

/// Git client error types.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Git exited non-zero.
    #[error("git {args} failed:\n{message}")]
    CommandFailed { args: String, message: String },

    /// Git binary could not be spawned at all.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Friendly result alias :3
type Result<T, E = GitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chomp_strips_one_trailing_newline() {
        assert_eq!(chomp("abc\n".into()), "abc");
        assert_eq!(chomp("abc\r\n".into()), "abc");
        assert_eq!(chomp("abc".into()), "abc");
        assert_eq!(chomp("abc\n\n".into()), "abc\n");
    }
}
