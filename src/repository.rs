//! # Transport Seams
//!
//! The clone executor never talks to the network directly. It goes through
//! two traits:
//!
//! - **`GitOperations`**: listing remote refs and cloning with git.
//! - **`ArchiveOperations`**: downloading and extracting archives.
//!
//! In the main application, `DefaultGitOperations` and
//! `DefaultArchiveOperations` are used, which wrap the system `git` command and
//! an HTTP client. In tests, these are replaced with mock implementations to
//! simulate outages, cache hits and misses without network access.

use std::path::Path;

use crate::error::Result;
use crate::git::RefEntry;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Lists every ref of a remote repository, in listing order.
    fn list_refs(&self, url: &str) -> Result<Vec<RefEntry>>;

    /// Clones `url` into `target` and strips the version-control metadata.
    fn clone_detached(
        &self,
        url: &str,
        ref_name: Option<&str>,
        subdir: Option<&str>,
        target: &Path,
    ) -> Result<()>;
}

/// Trait for archive operations - allows mocking in tests
pub trait ArchiveOperations: Send + Sync {
    /// Downloads `url` to `dest`, optionally through `proxy`.
    fn download(&self, url: &str, dest: &Path, proxy: Option<&str>) -> Result<()>;

    /// Extracts the archive at `archive` into `dest`.
    fn extract(&self, archive: &Path, dest: &Path, subdir: Option<&str>) -> Result<()> {
        crate::archive::extract(archive, dest, subdir)
    }
}

/// The default implementation of `GitOperations`, which uses the system's
/// `git` command.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultGitOperations;

impl GitOperations for DefaultGitOperations {
    fn list_refs(&self, url: &str) -> Result<Vec<RefEntry>> {
        crate::git::list_refs(url)
    }

    fn clone_detached(
        &self,
        url: &str,
        ref_name: Option<&str>,
        subdir: Option<&str>,
        target: &Path,
    ) -> Result<()> {
        crate::git::clone_detached(url, ref_name, subdir, target)
    }
}

/// The default implementation of `ArchiveOperations`, which downloads over
/// HTTP(S).
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultArchiveOperations;

impl ArchiveOperations for DefaultArchiveOperations {
    fn download(&self, url: &str, dest: &Path, proxy: Option<&str>) -> Result<()> {
        crate::archive::download(url, dest, proxy)
    }
}
