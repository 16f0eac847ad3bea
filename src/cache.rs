//! # On-disk Archive Cache
//!
//! Every repository gets its own directory under the cache root, keyed by
//! `{site}/{user}/{name}`:
//!
//! ```text
//! {root}/github.com/acme/widget/
//!     map.json          ref -> commit hash
//!     access.json       ref -> last access time (RFC 3339)
//!     {hash}.tar.gz     downloaded archives
//!     .tmp-*/           stashes used by directive pipelines
//! ```
//!
//! All refs of one repository share a single [`CacheRecord`]. An archive is
//! kept for as long as at least one ref in `map.json` points at its hash; when
//! a ref moves to a new hash and nothing else references the old one, the old
//! archive is deleted.
//!
//! The cache is not locked. Two processes working on the same repository at
//! once may race on `map.json` and on archive eviction.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use walkdir::WalkDir;

use crate::descriptor::RepoDescriptor;
use crate::error::Result;

const MAP_FILE: &str = "map.json";
const ACCESS_FILE: &str = "access.json";
const STASH_PREFIX: &str = ".tmp-";

/// Persistent per-repository cache state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheRecord {
    /// Ref selector to resolved commit hash.
    pub refs: BTreeMap<String, String>,
    /// Ref selector to the last time it was cloned.
    pub access: BTreeMap<String, DateTime<Utc>>,
}

impl CacheRecord {
    pub fn hash_for(&self, r#ref: &str) -> Option<&str> {
        self.refs.get(r#ref).map(String::as_str)
    }

    /// Whether any ref other than `except` still points at `hash`.
    pub fn is_referenced(&self, hash: &str, except: &str) -> bool {
        self.refs
            .iter()
            .any(|(r#ref, value)| r#ref != except && value == hash)
    }

    /// Most recent access over all refs.
    pub fn last_access(&self) -> Option<DateTime<Utc>> {
        self.access.values().max().copied()
    }
}

/// A repository directory found while scanning the cache root.
#[derive(Debug, Clone)]
pub struct CachedRepo {
    pub site: String,
    pub user: String,
    pub name: String,
    pub dir: PathBuf,
    pub record: CacheRecord,
}

/// Handle on a cache root directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the state of `repo`.
    pub fn repo_dir(&self, repo: &RepoDescriptor) -> PathBuf {
        self.root.join(&repo.site).join(&repo.user).join(&repo.name)
    }

    /// Location of the archive for `hash`.
    pub fn archive_path(&self, repo: &RepoDescriptor, hash: &str) -> PathBuf {
        self.repo_dir(repo).join(format!("{}.tar.gz", hash))
    }

    /// Create a fresh, empty directory to stash destination contents in.
    ///
    /// Every call gets its own directory, so nested pipelines working on the
    /// same repository never share a stash. The directory is not removed
    /// automatically.
    pub fn create_stash(&self, repo: &RepoDescriptor) -> Result<PathBuf> {
        let repo_dir = self.repo_dir(repo);
        fs::create_dir_all(&repo_dir)?;
        let stash = tempfile::Builder::new()
            .prefix(STASH_PREFIX)
            .keep(true)
            .tempdir_in(&repo_dir)?;
        Ok(stash.path().to_path_buf())
    }

    /// Load the record for `repo`, or an empty one if nothing is cached yet.
    pub fn load_record(&self, repo: &RepoDescriptor) -> CacheRecord {
        load_record_from(&self.repo_dir(repo))
    }

    /// Stamp `ref` with the current time and persist the access log.
    pub fn record_access(
        &self,
        repo: &RepoDescriptor,
        r#ref: &str,
        record: &mut CacheRecord,
    ) -> Result<()> {
        record.access.insert(r#ref.to_string(), Utc::now());
        write_json(&self.repo_dir(repo).join(ACCESS_FILE), &record.access)
    }

    /// Point `ref` at `hash`, evicting the previous archive if it became
    /// unreferenced.
    ///
    /// Returns `false` when `ref` already resolved to `hash`.
    pub fn update_hash(
        &self,
        repo: &RepoDescriptor,
        r#ref: &str,
        hash: &str,
        record: &mut CacheRecord,
    ) -> Result<bool> {
        if record.hash_for(r#ref) == Some(hash) {
            return Ok(false);
        }

        if let Some(old) = record.refs.insert(r#ref.to_string(), hash.to_string()) {
            if !record.is_referenced(&old, r#ref) {
                let stale = self.archive_path(repo, &old);
                match fs::remove_file(&stale) {
                    Ok(()) => debug!("Evicted unreferenced archive {}", stale.display()),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Could not evict {}: {}", stale.display(), e),
                }
            }
        }

        write_json(&self.repo_dir(repo).join(MAP_FILE), &record.refs)?;
        Ok(true)
    }

    /// Every repository with a ref map under the cache root.
    pub fn list(&self) -> Result<Vec<CachedRepo>> {
        let mut repos = Vec::new();
        if !self.root.exists() {
            return Ok(repos);
        }

        for entry in WalkDir::new(&self.root)
            .min_depth(4)
            .max_depth(4)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name() == MAP_FILE && entry.file_type().is_file())
        {
            let Some(dir) = entry.path().parent() else {
                continue;
            };
            let Ok(relative) = dir.strip_prefix(&self.root) else {
                continue;
            };
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            if let [site, user, name] = parts.as_slice() {
                repos.push(CachedRepo {
                    site: site.clone(),
                    user: user.clone(),
                    name: name.clone(),
                    dir: dir.to_path_buf(),
                    record: load_record_from(dir),
                });
            }
        }

        repos.sort_by(|a, b| {
            (&a.site, &a.user, &a.name).cmp(&(&b.site, &b.user, &b.name))
        });
        Ok(repos)
    }
}

fn load_record_from(dir: &Path) -> CacheRecord {
    CacheRecord {
        refs: read_json(&dir.join(MAP_FILE)),
        access: read_json(&dir.join(ACCESS_FILE)),
    }
}

fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!("Ignoring unreadable cache file {}: {}", path.display(), e);
            return T::default();
        }
    };
    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!("Ignoring corrupt cache file {}: {}", path.display(), e);
        T::default()
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}
