//! # Ref Resolution
//!
//! Maps a human ref (`HEAD`, a branch, a tag, or a partial commit hash) to a
//! full commit hash.
//!
//! The remote listing is the source of truth. Against it, a selector matches:
//!
//! 1. `HEAD` → the hash of the listing's `HEAD` row;
//! 2. otherwise the first row whose name equals the selector exactly;
//! 3. otherwise, for selectors of at least [`MIN_PREFIX_LEN`] characters, the
//!    first row whose hash starts with the selector.
//!
//! When the listing cannot be fetched, the hash recorded by a previous clone
//! of the same ref is used instead. In cache-only mode the listing is skipped
//! and only that recorded hash is considered.

use crate::cache::CacheRecord;
use crate::descriptor::{RepoDescriptor, HEAD};
use crate::error::{Error, Result};
use crate::events::{EventCode, Reporter};
use crate::git::{RefEntry, RefKind};
use crate::repository::GitOperations;

/// Shortest selector that may match a commit hash by prefix.
pub const MIN_PREFIX_LEN: usize = 8;

/// Pick the hash a selector refers to within a listing.
pub fn select_ref<'a>(refs: &'a [RefEntry], selector: &str) -> Option<&'a str> {
    if selector == HEAD {
        return refs
            .iter()
            .find(|entry| entry.kind == RefKind::Head)
            .map(|entry| entry.hash.as_str());
    }

    if let Some(entry) = refs
        .iter()
        .find(|entry| entry.name.as_deref() == Some(selector))
    {
        return Some(&entry.hash);
    }

    if selector.len() < MIN_PREFIX_LEN {
        return None;
    }

    refs.iter()
        .find(|entry| entry.hash.starts_with(selector))
        .map(|entry| entry.hash.as_str())
}

/// Resolves refs for one repository against a git transport.
pub struct RefResolver<'a> {
    git: &'a dyn GitOperations,
    reporter: Reporter<'a>,
}

impl<'a> RefResolver<'a> {
    pub fn new(git: &'a dyn GitOperations, reporter: Reporter<'a>) -> Self {
        Self { git, reporter }
    }

    /// Resolve `repo.ref` to a commit hash.
    ///
    /// Fails with `MissingRef` when neither the listing nor the cache yields a
    /// hash.
    pub fn resolve(
        &self,
        repo: &RepoDescriptor,
        record: &CacheRecord,
        cache_only: bool,
    ) -> Result<String> {
        let hash = if cache_only {
            self.from_cache(repo, record)
        } else {
            self.from_remote(repo, record)
        };

        hash.ok_or_else(|| Error::MissingRef {
            r#ref: repo.r#ref.clone(),
        })
    }

    fn from_remote(&self, repo: &RepoDescriptor, record: &CacheRecord) -> Option<String> {
        match self.git.list_refs(&repo.url) {
            Ok(refs) => {
                let hash = select_ref(&refs, &repo.r#ref)?;
                self.reporter.info(
                    EventCode::FoundMatch,
                    format!("found matching commit hash: {}", hash),
                );
                Some(hash.to_string())
            }
            Err(cause) => {
                let err = Error::could_not_fetch(&repo.url, cause);
                let detail = match &err {
                    Error::CouldNotFetch { source, .. } => format!("{}: {}", err, source),
                    _ => err.to_string(),
                };
                self.reporter.warn(EventCode::CouldNotFetch, detail);
                self.from_cache(repo, record)
            }
        }
    }

    fn from_cache(&self, repo: &RepoDescriptor, record: &CacheRecord) -> Option<String> {
        let hash = record.hash_for(&repo.r#ref)?;
        self.reporter.info(
            EventCode::UsingCache,
            format!("using cached commit hash {}", hash),
        );
        Some(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::parse;
    use crate::events::{Level, RecordingSink};
    use crate::repository::mock::MockGitOperations;

    const MAIN: &str = "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d";
    const V2: &str = "abc123de45f6a7b8c9d0e1f2a3b4c5d6e7f8a9b0";
    const DEV: &str = "deadbeefcafe0000111122223333444455556666";

    fn listing() -> Vec<RefEntry> {
        vec![
            RefEntry::head(MAIN),
            RefEntry::branch("main", MAIN),
            RefEntry::branch("dev", DEV),
            RefEntry::tag("v2", V2),
        ]
    }

    #[test]
    fn test_select_head() {
        assert_eq!(select_ref(&listing(), "HEAD"), Some(MAIN));
        assert_eq!(select_ref(&[RefEntry::branch("main", MAIN)], "HEAD"), None);
    }

    #[test]
    fn test_select_exact_name() {
        assert_eq!(select_ref(&listing(), "v2"), Some(V2));
        assert_eq!(select_ref(&listing(), "dev"), Some(DEV));
    }

    #[test]
    fn test_select_exact_name_first_match_wins() {
        let refs = vec![RefEntry::branch("v2", DEV), RefEntry::tag("v2", V2)];
        assert_eq!(select_ref(&refs, "v2"), Some(DEV));
    }

    #[test]
    fn test_exact_name_beats_hash_prefix() {
        // a branch literally named like a prefix of another ref's hash
        let refs = vec![
            RefEntry::branch("main", "deadbeef99999999999999999999999999999999"),
            RefEntry::branch("deadbeef", MAIN),
        ];
        assert_eq!(select_ref(&refs, "deadbeef"), Some(MAIN));
    }

    #[test]
    fn test_select_hash_prefix() {
        assert_eq!(select_ref(&listing(), "abc123de"), Some(V2));
        assert_eq!(select_ref(&listing(), "deadbeefcafe"), Some(DEV));
    }

    #[test]
    fn test_short_selector_never_matches_prefix() {
        assert_eq!(select_ref(&listing(), "abc123d"), None);
        assert_eq!(select_ref(&listing(), "dead"), None);
    }

    #[test]
    fn test_unknown_selector() {
        assert_eq!(select_ref(&listing(), "v9"), None);
    }

    #[test]
    fn test_resolve_from_remote() {
        let repo = parse("github.com/acme/widget#v2").unwrap();
        let git = MockGitOperations::new().with_refs(&repo.url, listing());
        let sink = RecordingSink::new();

        let resolver = RefResolver::new(&git, Reporter::new(&sink, true));
        let hash = resolver.resolve(&repo, &CacheRecord::default(), false).unwrap();

        assert_eq!(hash, V2);
        assert_eq!(sink.codes(), vec![EventCode::FoundMatch]);
    }

    #[test]
    fn test_resolve_missing_ref_does_not_consult_cache() {
        let repo = parse("github.com/acme/widget#v9").unwrap();
        let git = MockGitOperations::new().with_refs(&repo.url, listing());
        let mut record = CacheRecord::default();
        record.refs.insert("v9".to_string(), DEV.to_string());

        let resolver = RefResolver::new(&git, Reporter::new(&crate::events::NullSink, false));
        let err = resolver.resolve(&repo, &record, false).unwrap_err();

        assert!(matches!(err, Error::MissingRef { ref r#ref } if r#ref == "v9"));
    }

    #[test]
    fn test_resolve_falls_back_to_cache_when_offline() {
        let repo = parse("github.com/acme/widget#v2").unwrap();
        let git = MockGitOperations::new();
        let mut record = CacheRecord::default();
        record.refs.insert("v2".to_string(), V2.to_string());
        let sink = RecordingSink::new();

        let resolver = RefResolver::new(&git, Reporter::new(&sink, false));
        let hash = resolver.resolve(&repo, &record, false).unwrap();

        assert_eq!(hash, V2);
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, EventCode::CouldNotFetch);
        assert_eq!(events[0].level, Level::Warn);
        assert!(events[0].message.contains("Could not resolve host"));
        assert_eq!(events[1].code, EventCode::UsingCache);
        assert_eq!(events[1].level, Level::Info);
    }

    #[test]
    fn test_resolve_offline_without_cache_is_missing_ref() {
        let repo = parse("github.com/acme/widget#v2").unwrap();
        let git = MockGitOperations::new();

        let resolver = RefResolver::new(&git, Reporter::new(&crate::events::NullSink, false));
        let err = resolver.resolve(&repo, &CacheRecord::default(), false).unwrap_err();

        assert_eq!(err.code(), "MISSING_REF");
    }

    #[test]
    fn test_cache_only_skips_listing() {
        let repo = parse("github.com/acme/widget#main").unwrap();
        let git = MockGitOperations::new().with_refs(&repo.url, listing());
        let mut record = CacheRecord::default();
        record.refs.insert("main".to_string(), DEV.to_string());

        let resolver = RefResolver::new(&git, Reporter::new(&crate::events::NullSink, false));
        let hash = resolver.resolve(&repo, &record, true).unwrap();

        assert_eq!(hash, DEV);
        assert_eq!(git.list_count(), 0);
    }
}
