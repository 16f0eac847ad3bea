//! # Clone Executor
//!
//! [`Cloner`] turns a [`RepoDescriptor`] into files on disk.
//!
//! ## Strategies
//!
//! - **Archive mode** (the default for every supported host): resolve the ref
//!   to a commit hash, reuse `{hash}.tar.gz` from the cache or download it,
//!   record the hash and access time, then extract it into the destination.
//!   Any failure while fetching or extracting downgrades to a direct git clone
//!   over HTTP(S).
//! - **VCS mode**: clone over SSH, falling back to HTTP(S). No ref listing and
//!   no archive are involved.
//!
//! Either way the destination ends up without version-control metadata, a
//! `SUCCESS` event is emitted, and the destination's directive manifest (if
//! any) is executed by the [`DirectivePipeline`].

use std::path::{Path, PathBuf};

use log::debug;

use crate::archive::archive_url;
use crate::cache::{CacheRecord, CacheStore};
use crate::config::Config;
use crate::descriptor::{Mode, RepoDescriptor, SpecifierParser};
use crate::directives::DirectivePipeline;
use crate::error::{Error, Result};
use crate::events::{EventCode, EventSink, Reporter};
use crate::filesystem::is_empty_dir;
use crate::repository::{
    ArchiveOperations, DefaultArchiveOperations, DefaultGitOperations, GitOperations,
};
use crate::resolve::RefResolver;

/// Per-invocation switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Write into a non-empty destination.
    pub force: bool,
    /// Deliver verbose-only events.
    pub verbose: bool,
    /// Skip the remote ref listing and use the cached hash.
    pub cache_only: bool,
    /// Override the descriptor's clone mode.
    pub mode: Option<Mode>,
}

/// Outcome of a successful clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneResult {
    pub descriptor: RepoDescriptor,
    pub destination: PathBuf,
    /// Resolved commit hash; `None` for VCS-mode clones, which never resolve.
    pub hash: Option<String>,
}

/// Clones repositories into local directories.
pub struct Cloner {
    config: Config,
    cache: CacheStore,
    parser: SpecifierParser,
    git_ops: Box<dyn GitOperations>,
    archive_ops: Box<dyn ArchiveOperations>,
}

impl Cloner {
    /// Creates a `Cloner` backed by the system `git` and an HTTP client.
    pub fn new(config: Config) -> Self {
        Self::with_operations(
            config,
            Box::new(DefaultGitOperations),
            Box::new(DefaultArchiveOperations),
        )
    }

    /// Creates a `Cloner` with custom transports.
    pub fn with_operations(
        config: Config,
        git_ops: Box<dyn GitOperations>,
        archive_ops: Box<dyn ArchiveOperations>,
    ) -> Self {
        Self {
            cache: config.cache_store(),
            parser: config.parser(),
            config,
            git_ops,
            archive_ops,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Parse `src` and clone it into `dest`.
    pub fn clone_src(
        &self,
        src: &str,
        dest: &Path,
        options: &CloneOptions,
        sink: &dyn EventSink,
    ) -> Result<CloneResult> {
        let repo = self.parser.parse(src)?;
        self.clone_repo(&repo, dest, options, sink)
    }

    /// Clone `repo` into `dest`, then run the directive manifest it left
    /// behind.
    ///
    /// If a nested clone directive fails, the error is returned as is and the
    /// destination is left in whatever state the pipeline reached. Content
    /// stashed before the failure stays in the cache's stash directory.
    pub fn clone_repo(
        &self,
        repo: &RepoDescriptor,
        dest: &Path,
        options: &CloneOptions,
        sink: &dyn EventSink,
    ) -> Result<CloneResult> {
        let reporter = Reporter::new(sink, options.verbose);
        check_destination(dest, options.force, reporter)?;

        let hash = match options.mode.unwrap_or(repo.mode) {
            Mode::Archive => Some(self.clone_archive(repo, dest, options.cache_only, reporter)?),
            Mode::Vcs => {
                self.clone_vcs(repo, dest, reporter)?;
                None
            }
        };

        let mut message = format!("cloned {}", repo);
        if let Some(hash) = &hash {
            message.push_str(&format!(" ({})", short_hash(hash)));
        }
        if dest != Path::new(".") {
            message.push_str(&format!(" to {}", dest.display()));
        }
        reporter.success(EventCode::Success, message);

        DirectivePipeline::new(self, repo, dest, sink, options.verbose).run()?;

        Ok(CloneResult {
            descriptor: repo.clone(),
            destination: dest.to_path_buf(),
            hash,
        })
    }

    fn clone_archive(
        &self,
        repo: &RepoDescriptor,
        dest: &Path,
        cache_only: bool,
        reporter: Reporter<'_>,
    ) -> Result<String> {
        let mut record = self.cache.load_record(repo);
        let hash = RefResolver::new(self.git_ops.as_ref(), reporter).resolve(
            repo,
            &record,
            cache_only,
        )?;

        if let Err(err) = self.fetch_and_extract(repo, &hash, dest, &mut record, reporter) {
            reporter.warn(
                EventCode::Downgrade,
                format!("could not use archive for {} ({}), trying git clone", repo, err),
            );
            self.clone_http(repo, dest, reporter)?;
        }

        Ok(hash)
    }

    fn fetch_and_extract(
        &self,
        repo: &RepoDescriptor,
        hash: &str,
        dest: &Path,
        record: &mut CacheRecord,
        reporter: Reporter<'_>,
    ) -> Result<()> {
        let archive = self.cache.archive_path(repo, hash);

        if archive.exists() {
            reporter.info(
                EventCode::FileExists,
                format!("{} already exists locally", archive.display()),
            );
        } else {
            let url = archive_url(repo, hash);
            let proxy = self.config.proxy.as_deref();
            if let Some(proxy) = proxy {
                reporter.info(EventCode::Proxy, format!("using proxy {}", proxy));
            }
            reporter.info(
                EventCode::Downloading,
                format!("downloading {} to {}", url, archive.display()),
            );
            self.archive_ops.download(&url, &archive, proxy)?;
        }

        self.cache.update_hash(repo, &repo.r#ref, hash, record)?;
        self.cache.record_access(repo, &repo.r#ref, record)?;

        reporter.info(
            EventCode::Extracting,
            format!("extracting {} to {}", archive.display(), dest.display()),
        );
        self.archive_ops
            .extract(&archive, dest, repo.subdir.as_deref())
    }

    fn clone_vcs(&self, repo: &RepoDescriptor, dest: &Path, reporter: Reporter<'_>) -> Result<()> {
        reporter.info(EventCode::Cloning, format!("cloning {}", repo.ssh_url));
        match self.git_ops.clone_detached(
            &repo.ssh_url,
            checkout_ref(repo),
            repo.subdir.as_deref(),
            dest,
        ) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!("SSH clone of {} failed: {}", repo.ssh_url, err);
                reporter.warn(
                    EventCode::Downgrade,
                    format!("could not clone {} over SSH, trying HTTP", repo),
                );
                self.clone_http(repo, dest, reporter)
            }
        }
    }

    fn clone_http(&self, repo: &RepoDescriptor, dest: &Path, reporter: Reporter<'_>) -> Result<()> {
        let url = repo.clone_url();
        reporter.info(EventCode::Cloning, format!("cloning {}", url));
        self.git_ops
            .clone_detached(&url, checkout_ref(repo), repo.subdir.as_deref(), dest)
    }
}

/// Ref to check out after a direct clone; `HEAD` needs no checkout.
fn checkout_ref(repo: &RepoDescriptor) -> Option<&str> {
    if repo.is_head() {
        None
    } else {
        Some(&repo.r#ref)
    }
}

fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}

fn check_destination(dest: &Path, force: bool, reporter: Reporter<'_>) -> Result<()> {
    if is_empty_dir(dest)? {
        reporter.info(EventCode::DestIsEmpty, "destination directory is empty");
        return Ok(());
    }

    if force {
        reporter.info(
            EventCode::DestNotEmpty,
            "destination directory is not empty. Using --force, continuing",
        );
        Ok(())
    } else {
        Err(Error::DestinationNotEmpty {
            path: dest.to_path_buf(),
        })
    }
}
