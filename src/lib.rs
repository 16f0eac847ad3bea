//! # Stencil Library
//!
//! This library provides the core functionality for scaffolding a directory
//! from a snapshot of a remote git repository. It is designed to be used by
//! the `stencil` command-line tool but can also be embedded in other
//! applications that need to fetch repository trees without their history.
//!
//! ## Quick Example
//!
//! ```
//! use stencil::descriptor::{parse, Mode, Protocol};
//!
//! let repo = parse("https://github.com/acme/widget/templates/basic#v2").unwrap();
//!
//! assert_eq!(repo.protocol, Protocol::Https);
//! assert_eq!(repo.site, "github.com");
//! assert_eq!(repo.subdir.as_deref(), Some("templates/basic"));
//! assert_eq!(repo.r#ref, "v2");
//! assert_eq!(repo.mode, Mode::Archive);
//! assert_eq!(repo.url, "https://github.com/acme/widget");
//! ```
//!
//! ## Core Concepts
//!
//! - **Descriptors (`descriptor`)**: A repository specifier such as
//!   `github.com/acme/widget/src#v2` is parsed into a `RepoDescriptor`.
//! - **Ref Resolution (`resolve`)**: Branches, tags, `HEAD` and partial hashes
//!   are resolved to a full commit hash from the remote listing, falling back
//!   to the last known hash when the remote is unreachable.
//! - **Archive Cache (`cache`)**: Downloaded archives are kept per commit hash
//!   together with the ref map and access log of each repository.
//! - **Cloning (`clone`)**: The `Cloner` extracts the cached or downloaded
//!   archive into the destination, downgrading to a direct `git clone` when the
//!   archive route fails.
//! - **Directives (`directives`)**: A manifest shipped in the cloned tree can
//!   remove files and pull in further repositories, with the destination's
//!   previous content preserved across nested clones.
//!
//! ## Execution Flow
//!
//! A call to [`clone::Cloner::clone_src`] runs these steps, one at a time:
//!
//! 1.  **Parse** the specifier.
//! 2.  **Check** that the destination is empty (or that overwriting is forced).
//! 3.  **Resolve** the ref to a commit hash.
//! 4.  **Fetch** the archive into the cache unless it is already there.
//! 5.  **Extract** it into the destination.
//! 6.  **Run** the directive manifest, if the tree contains one.

pub mod archive;
pub mod cache;
pub mod clone;
pub mod config;
pub mod defaults;
pub mod descriptor;
pub mod directives;
pub mod error;
pub mod events;
pub mod filesystem;
pub mod git;
pub mod output;
pub mod repository;
pub mod resolve;
pub mod suggestions;

#[cfg(test)]
mod descriptor_proptest;
