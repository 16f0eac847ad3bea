//! Shared test utilities for CLI end-to-end tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_cached_ref("github.com/acme/widget", "main", HASH);
//!     fixture.command().args(["cache", "list"]).assert().success();
//! }
//! ```

use assert_fs::prelude::*;
use std::env;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::should_skip_network_tests;
    pub use super::TestFixture;
}

/// Check if network tests should be skipped.
///
/// Returns `true` if the `SKIP_NETWORK_TESTS` environment variable is set.
#[allow(dead_code)]
pub fn should_skip_network_tests() -> bool {
    env::var("SKIP_NETWORK_TESTS").is_ok()
}

/// A temporary working directory with its own cache root.
///
/// Commands created by [`TestFixture::command`] run inside the directory and
/// point `STENCIL_CACHE` at `<tmp>/cache`, so tests never touch the user's
/// real cache.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a file with the given path and content.
    #[allow(dead_code)]
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Record `ref -> hash` for `repo` (`site/user/name`) in the cache, as a
    /// previous clone would have, with an empty archive next to it.
    #[allow(dead_code)]
    pub fn with_cached_ref(self, repo: &str, r#ref: &str, hash: &str) -> Self {
        let dir = self.temp_dir.child("cache").child(repo);
        dir.child("map.json")
            .write_str(&format!("{{\"{}\": \"{}\"}}", r#ref, hash))
            .expect("Failed to write map.json");
        dir.child("access.json")
            .write_str(&format!("{{\"{}\": \"2024-03-01T12:00:00Z\"}}", r#ref))
            .expect("Failed to write access.json");
        dir.child(format!("{}.tar.gz", hash))
            .write_binary(b"")
            .expect("Failed to write archive");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Cache root used by [`TestFixture::command`].
    pub fn cache_root(&self) -> PathBuf {
        self.temp_dir.path().join("cache")
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stencil");
        cmd.current_dir(self.path())
            .env("STENCIL_CACHE", self.cache_root())
            .env_remove("STENCIL_DEFAULT_HOST")
            .env_remove("https_proxy")
            .env_remove("HTTPS_PROXY")
            .env("NO_COLOR", "1");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_creates_temp_dir() {
        let fixture = TestFixture::new();
        assert!(fixture.path().exists());
    }

    #[test]
    fn test_fixture_with_cached_ref() {
        let fixture = TestFixture::new().with_cached_ref("github.com/acme/widget", "main", "abc");
        let dir = fixture.cache_root().join("github.com/acme/widget");
        assert!(dir.join("map.json").exists());
        assert!(dir.join("abc.tar.gz").exists());
    }
}
