//! # Directive Pipeline
//!
//! A cloned tree may carry a manifest (`.stencil.json`) at its root listing
//! follow-up actions:
//!
//! ```json
//! [
//!   { "action": "remove", "files": ["LICENSE", "docs"] },
//!   { "action": "clone", "src": "acme/shared-config", "cache": true }
//! ]
//! ```
//!
//! The manifest is consumed: it is deleted as soon as it has been read, and
//! its directives run once, in order.
//!
//! ## Stash and restore
//!
//! A nested `clone` writes into the same destination. Before the first one
//! runs, everything currently in the destination is moved aside into a fresh
//! stash directory under the owning repository's cache directory. Once every directive has
//! succeeded the stash is copied back over the destination, so content that
//! existed before the nested clones survives them, and is then deleted.
//! `remove` directives act on the live destination, so a removal that precedes
//! the first nested clone is not undone by the restore. Their paths must stay
//! inside the destination: absolute paths, `..` and paths through a symlink
//! are skipped with a warning.
//!
//! When a directive fails the error is returned immediately and no restore
//! happens. The destination is then in an unspecified intermediate state, and
//! the stashed content is left in the stash directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::clone::{CloneOptions, Cloner};
use crate::defaults::MANIFEST_FILE_NAME;
use crate::descriptor::RepoDescriptor;
use crate::error::{Error, Result};
use crate::events::{EventCode, EventSink, Reporter};
use crate::filesystem::{
    copy_merge, is_contained, move_contents, remove_if_exists, remove_path, symlinked_ancestor,
};

/// One action of a directive manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Directive {
    /// Clone another repository into the same destination.
    Clone {
        src: String,
        #[serde(default)]
        cache: bool,
        #[serde(default)]
        verbose: bool,
    },
    /// Delete files or directories, relative to the destination.
    Remove { files: FileList },
}

/// A single path or a list of paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileList {
    One(String),
    Many(Vec<String>),
}

impl FileList {
    pub fn paths(&self) -> Vec<&str> {
        match self {
            FileList::One(path) => vec![path.as_str()],
            FileList::Many(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

/// Read and delete the manifest in `dest`.
///
/// Returns `None` when there is no manifest.
pub fn read_manifest(dest: &Path) -> Result<Option<Vec<Directive>>> {
    let path = dest.join(MANIFEST_FILE_NAME);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let directives: Vec<Directive> =
        serde_json::from_str(&content).map_err(|e| Error::Manifest {
            path: path.clone(),
            message: e.to_string(),
        })?;

    if let Err(e) = fs::remove_file(&path) {
        if e.kind() != io::ErrorKind::NotFound {
            return Err(e.into());
        }
    }

    Ok(Some(directives))
}

/// Runs the manifest left in a destination by a finished clone.
pub struct DirectivePipeline<'a> {
    cloner: &'a Cloner,
    repo: &'a RepoDescriptor,
    dest: &'a Path,
    sink: &'a dyn EventSink,
    reporter: Reporter<'a>,
    stash: Option<PathBuf>,
}

impl<'a> DirectivePipeline<'a> {
    pub fn new(
        cloner: &'a Cloner,
        repo: &'a RepoDescriptor,
        dest: &'a Path,
        sink: &'a dyn EventSink,
        verbose: bool,
    ) -> Self {
        Self {
            cloner,
            repo,
            dest,
            sink,
            reporter: Reporter::new(sink, verbose),
            stash: None,
        }
    }

    /// Execute the destination's manifest, if there is one.
    pub fn run(self) -> Result<()> {
        match read_manifest(self.dest)? {
            Some(directives) => self.execute(&directives),
            None => Ok(()),
        }
    }

    /// Execute `directives` in order, then restore stashed content.
    pub fn execute(mut self, directives: &[Directive]) -> Result<()> {
        for directive in directives {
            match directive {
                Directive::Clone {
                    src,
                    cache,
                    verbose,
                } => self.nested_clone(src, *cache, *verbose)?,
                Directive::Remove { files } => self.remove(files)?,
            }
        }

        if let Some(stash) = self.stash.take() {
            copy_merge(&stash, self.dest, |relative| {
                relative == Path::new(MANIFEST_FILE_NAME)
            })?;
            remove_if_exists(&stash)?;
        }
        Ok(())
    }

    fn nested_clone(&mut self, src: &str, cache_only: bool, verbose: bool) -> Result<()> {
        if self.stash.is_none() {
            let stash = self.cloner.cache().create_stash(self.repo)?;
            move_contents(self.dest, &stash)?;
            self.stash = Some(stash);
        }

        let options = CloneOptions {
            force: true,
            verbose,
            cache_only,
            mode: None,
        };
        self.cloner
            .clone_src(src, self.dest, &options, self.sink)
            .map(|_| ())
    }

    fn remove(&self, files: &FileList) -> Result<()> {
        let mut removed = Vec::new();

        for file in files.paths() {
            let relative = Path::new(file);
            if !is_contained(relative) || symlinked_ancestor(self.dest, relative).is_some() {
                self.reporter.warn(
                    EventCode::FileDoesNotExist,
                    format!("action wants to remove {} but it is outside the destination", file),
                );
                continue;
            }

            let path = self.dest.join(relative);
            match fs::symlink_metadata(&path) {
                Ok(metadata) => {
                    remove_path(&path)?;
                    if metadata.is_dir() {
                        removed.push(format!("{}/", file));
                    } else {
                        removed.push(file.to_string());
                    }
                }
                Err(_) => self.reporter.warn(
                    EventCode::FileDoesNotExist,
                    format!("action wants to remove {} but it does not exist", file),
                ),
            }
        }

        if !removed.is_empty() {
            self.reporter
                .info(EventCode::Removed, format!("removed: {}", removed.join(", ")));
        }
        Ok(())
    }
}
