//! Default values for stencil configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Name of the directive manifest looked up at the root of a destination.
pub const MANIFEST_FILE_NAME: &str = ".stencil.json";

/// Returns the default cache root directory.
///
/// Uses the platform-appropriate cache directory:
/// - Linux: `~/.cache/stencil` (XDG Base Directory)
/// - macOS: `~/Library/Caches/stencil`
/// - Windows: `{FOLDERID_LocalAppData}\stencil`
///
/// Falls back to `.stencil-cache` in the current directory if the
/// platform cache directory cannot be determined.
///
/// This can be overridden by the `--cache-root` CLI flag or the
/// `STENCIL_CACHE` environment variable.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".stencil-cache"))
        .join("stencil")
}
