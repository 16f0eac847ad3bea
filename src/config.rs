//! # Runtime Configuration
//!
//! Settings that are ambient in a shell session (where the cache lives, which
//! host a bare `user/name` refers to, which proxy to download through) are
//! collected into a [`Config`] value and passed explicitly to the components
//! that need them. Nothing reads these settings from globals after start-up,
//! so several configurations (for instance several cache roots in tests) can
//! coexist in one process.
//!
//! ## Environment
//!
//! | Variable               | Setting        |
//! |------------------------|----------------|
//! | `STENCIL_CACHE`        | `cache_root`   |
//! | `STENCIL_DEFAULT_HOST` | `default_host` |
//! | `https_proxy` / `HTTPS_PROXY` | `proxy` |

use std::env;
use std::path::PathBuf;

use crate::cache::CacheStore;
use crate::defaults::default_cache_root;
use crate::descriptor::{SpecifierParser, DEFAULT_HOST};

pub const CACHE_ENV: &str = "STENCIL_CACHE";
pub const DEFAULT_HOST_ENV: &str = "STENCIL_DEFAULT_HOST";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Root of the on-disk archive cache.
    pub cache_root: PathBuf,
    /// Host assumed for specifiers without one.
    pub default_host: String,
    /// Proxy forwarded to archive downloads.
    pub proxy: Option<String>,
}

impl Config {
    /// Build a configuration rooted at `cache_root` with built-in defaults
    /// for everything else.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            default_host: DEFAULT_HOST.to_string(),
            proxy: None,
        }
    }

    /// Resolve the configuration from the process environment.
    pub fn from_env() -> Self {
        let cache_root = non_empty_var(CACHE_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_root);
        let default_host = non_empty_var(DEFAULT_HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let proxy = non_empty_var("https_proxy").or_else(|| non_empty_var("HTTPS_PROXY"));

        Self {
            cache_root,
            default_host,
            proxy,
        }
    }

    pub fn with_default_host(mut self, host: impl Into<String>) -> Self {
        self.default_host = host.into();
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn parser(&self) -> SpecifierParser {
        SpecifierParser::with_default_host(self.default_host.clone())
    }

    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(self.cache_root.clone())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
