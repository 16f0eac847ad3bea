//! # Error Handling
//!
//! This module defines the centralized error type for `stencil`. It uses the
//! `thiserror` library to build an `Error` enum covering every failure mode of
//! the clone pipeline, from specifier parsing to directive execution.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries the context needed to
//!   render a useful message (the offending specifier, URL, ref or path) and,
//!   where the failure wraps another one, the original cause as its `source`.
//!
//! - **`Error::code`**: A stable, machine-readable code for every variant
//!   (`BAD_SRC`, `UNSUPPORTED_HOST`, `MISSING_REF`, ...). Codes are shared with
//!   the event taxonomy in [`crate::events`], so a caller can treat a fatal
//!   error and a reported event uniformly.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Recoverability
//!
//! Only some variants are fatal at the top level. `CouldNotFetch` raised while
//! listing refs is recovered by the cache fallback, and any failure on the
//! archive path is recovered by a direct clone. The remaining variants abort
//! the operation that raised them.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for stencil operations
#[derive(Error, Debug)]
pub enum Error {
    /// The repository specifier does not match the specifier grammar.
    #[error("could not parse {src}")]
    BadSpecifier { src: String },

    /// The specifier names a host outside the supported set.
    #[error("stencil supports GitHub, GitLab, Sourcehut and BitBucket, received {host}")]
    UnsupportedHost { host: String },

    /// The destination already contains files and `force` was not requested.
    #[error("destination directory {} is not empty, aborting. Use --force to override", path.display())]
    DestinationNotEmpty { path: PathBuf },

    /// Listing or downloading from a remote failed.
    ///
    /// The underlying transport or protocol failure is kept as the source.
    #[error("could not fetch remote {url}")]
    CouldNotFetch {
        url: String,
        #[source]
        source: Box<Error>,
    },

    /// A row of the remote ref listing could not be understood.
    #[error("could not parse {line}")]
    BadRef { line: String },

    /// No commit hash could be found for the requested ref.
    #[error("could not find commit hash for {r#ref}")]
    MissingRef { r#ref: String },

    /// An error occurred while executing a Git command.
    #[error("git command failed for {url}: {command} - {stderr}")]
    GitCommand {
        command: String,
        url: String,
        stderr: String,
    },

    /// An HTTP download failed.
    #[error("network operation error: {url} - {message}")]
    Network { url: String, message: String },

    /// An archive could not be read or extracted.
    #[error("archive error for {}: {message}", path.display())]
    Archive { path: PathBuf, message: String },

    /// The directive manifest could not be parsed.
    #[error("invalid directive manifest {}: {message}", path.display())]
    Manifest { path: PathBuf, message: String },

    /// The requested subdirectory does not exist in the fetched tree.
    #[error("subdirectory {subdir} does not exist in {url}")]
    MissingSubdir { url: String, subdir: String },

    /// A clone mode other than `archive` or `vcs` was requested.
    #[error("valid modes are archive, vcs; received {mode}")]
    InvalidMode { mode: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An invalid regular expression, wrapped from `regex::Error`.
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable code identifying the kind of failure.
    pub fn code(&self) -> &'static str {
        match self {
            Error::BadSpecifier { .. } => "BAD_SRC",
            Error::UnsupportedHost { .. } => "UNSUPPORTED_HOST",
            Error::DestinationNotEmpty { .. } => "DEST_NOT_EMPTY",
            Error::CouldNotFetch { .. } => "COULD_NOT_FETCH",
            Error::BadRef { .. } => "BAD_REF",
            Error::MissingRef { .. } => "MISSING_REF",
            Error::GitCommand { .. } => "GIT_COMMAND",
            Error::Network { .. } => "NETWORK",
            Error::Archive { .. } => "ARCHIVE",
            Error::Manifest { .. } => "BAD_MANIFEST",
            Error::MissingSubdir { .. } => "MISSING_SUBDIR",
            Error::InvalidMode { .. } => "BAD_MODE",
            Error::Io(_) => "IO",
            Error::Regex(_) => "REGEX",
            Error::Json(_) => "JSON",
        }
    }

    /// Wrap a transport failure as `CouldNotFetch` for `url`.
    pub fn could_not_fetch(url: impl Into<String>, source: Error) -> Self {
        Error::CouldNotFetch {
            url: url.into(),
            source: Box::new(source),
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_error_display_bad_specifier() {
        let error = Error::BadSpecifier {
            src: "not a repo".to_string(),
        };
        assert_eq!(error.to_string(), "could not parse not a repo");
        assert_eq!(error.code(), "BAD_SRC");
    }

    #[test]
    fn test_error_display_unsupported_host() {
        let error = Error::UnsupportedHost {
            host: "example.org".to_string(),
        };
        assert!(error.to_string().contains("example.org"));
        assert_eq!(error.code(), "UNSUPPORTED_HOST");
    }

    #[test]
    fn test_error_display_destination_not_empty() {
        let error = Error::DestinationNotEmpty {
            path: PathBuf::from("out"),
        };
        let display = error.to_string();
        assert!(display.contains("out"));
        assert!(display.contains("--force"));
        assert_eq!(error.code(), "DEST_NOT_EMPTY");
    }

    #[test]
    fn test_could_not_fetch_keeps_source() {
        let error = Error::could_not_fetch(
            "https://github.com/acme/widget",
            Error::GitCommand {
                command: "ls-remote".to_string(),
                url: "https://github.com/acme/widget".to_string(),
                stderr: "Connection refused".to_string(),
            },
        );
        assert_eq!(error.code(), "COULD_NOT_FETCH");
        assert!(error.to_string().contains("https://github.com/acme/widget"));

        let source = error.source().expect("wrapped cause");
        assert!(source.to_string().contains("Connection refused"));
    }

    #[test]
    fn test_error_display_missing_ref() {
        let error = Error::MissingRef {
            r#ref: "v9".to_string(),
        };
        assert_eq!(error.to_string(), "could not find commit hash for v9");
        assert_eq!(error.code(), "MISSING_REF");
    }

    #[test]
    fn test_error_from_io_error() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "File not found");
        let error: Error = io_error.into();
        assert!(error.to_string().contains("I/O error"));
        assert!(error.to_string().contains("File not found"));
        assert_eq!(error.code(), "IO");
    }

    #[test]
    fn test_error_from_json_error() {
        let json_error = serde_json::from_str::<serde_json::Value>("[unclosed").unwrap_err();
        let error: Error = json_error.into();
        assert!(error.to_string().contains("JSON error"));
    }
}
