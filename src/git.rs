use std::fs;
use std::path::Path;
use std::process::Command;

use log::debug;
use regex::Regex;

use crate::error::{Error, Result};
use crate::filesystem::{move_contents, remove_if_exists};

/// Kind of a row in a remote ref listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefKind {
    Head,
    Branch,
    Tag,
    Ref,
    /// Any other namespace under `refs/`, such as `pull`.
    Other(String),
}

/// One row of `git ls-remote` output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub kind: RefKind,
    /// Short name (`main`, `v1.0.0`); `None` for `HEAD`.
    pub name: Option<String>,
    pub hash: String,
}

impl RefEntry {
    pub fn head(hash: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Head,
            name: None,
            hash: hash.into(),
        }
    }

    pub fn branch(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Branch,
            name: Some(name.into()),
            hash: hash.into(),
        }
    }

    pub fn tag(name: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            kind: RefKind::Tag,
            name: Some(name.into()),
            hash: hash.into(),
        }
    }
}

const REF_PATTERN: &str = r"^refs/(\w+)/(.+)$";

/// Parse `git ls-remote` output into ref entries, in listing order.
///
/// Git ls-remote output format: `<hash>\t<ref>`. A row whose ref is neither
/// `HEAD` nor under `refs/` fails the whole listing with `BadRef`.
pub fn parse_ls_remote(stdout: &str) -> Result<Vec<RefEntry>> {
    let pattern = Regex::new(REF_PATTERN)?;
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let bad = || Error::BadRef {
                line: line.to_string(),
            };
            let (hash, ref_name) = line.split_once('\t').ok_or_else(bad)?;
            if ref_name == "HEAD" {
                return Ok(RefEntry::head(hash));
            }

            let captures = pattern.captures(ref_name).ok_or_else(bad)?;
            let kind = match &captures[1] {
                "heads" => RefKind::Branch,
                "tags" => RefKind::Tag,
                "refs" => RefKind::Ref,
                other => RefKind::Other(other.to_string()),
            };
            Ok(RefEntry {
                kind,
                name: Some(captures[2].to_string()),
                hash: hash.to_string(),
            })
        })
        .collect()
}

/// List all refs of a remote repository.
pub fn list_refs(url: &str) -> Result<Vec<RefEntry>> {
    debug!("git ls-remote {}", url);
    let output = Command::new("git")
        .args(["ls-remote", url])
        .output()
        .map_err(|e| Error::GitCommand {
            command: "ls-remote".to_string(),
            url: url.to_string(),
            stderr: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::GitCommand {
            command: "ls-remote".to_string(),
            url: url.to_string(),
            stderr: stderr.to_string(),
        });
    }

    parse_ls_remote(&String::from_utf8_lossy(&output.stdout))
}

/// Clone a repository into `target` without its version-control metadata.
///
/// The clone happens in a scratch directory so that `target` may already hold
/// files. When `ref_name` is given it is checked out after cloning, which
/// accepts branches, tags and (partial) commit hashes alike. When `subdir` is
/// given only that subtree ends up in `target`.
///
/// This uses the system git command, which automatically handles:
/// - SSH keys from ~/.ssh/
/// - Git credential helpers
/// - Personal access tokens
/// - Any authentication configured in ~/.gitconfig
pub fn clone_detached(
    url: &str,
    ref_name: Option<&str>,
    subdir: Option<&str>,
    target: &Path,
) -> Result<()> {
    let scratch = tempfile::Builder::new().prefix("stencil-clone").tempdir()?;
    let checkout = scratch.path().join("repo");

    run_git(url, ref_name, &["clone", "--quiet", url], Some(&checkout))?;
    if let Some(ref_name) = ref_name {
        let mut args = vec!["-C".to_string()];
        args.push(checkout.to_string_lossy().into_owned());
        args.extend(["checkout", "--quiet", ref_name].map(String::from));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        run_git(url, Some(ref_name), &args, None)?;
    }

    remove_if_exists(&checkout.join(".git"))?;

    let source = match subdir {
        Some(subdir) => {
            let source = checkout.join(subdir);
            if !source.is_dir() {
                return Err(Error::MissingSubdir {
                    url: url.to_string(),
                    subdir: subdir.to_string(),
                });
            }
            source
        }
        None => checkout,
    };

    fs::create_dir_all(target)?;
    move_contents(&source, target)
}

fn run_git(url: &str, ref_name: Option<&str>, args: &[&str], dir: Option<&Path>) -> Result<()> {
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = dir {
        command.arg(dir);
    }
    debug!("git {}", args.join(" "));

    let output = command.output().map_err(|e| Error::GitCommand {
        command: args.join(" "),
        url: url.to_string(),
        stderr: e.to_string(),
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Provide helpful error message for common auth failures
        let stderr = if stderr.contains("Authentication failed")
            || stderr.contains("Permission denied")
            || stderr.contains("Could not read from remote repository")
        {
            format!(
                "Authentication failed. Make sure you have access to the repository.\n\
                For private repos, ensure you have:\n\
                - SSH key added to ssh-agent\n\
                - Git credentials configured\n\
                - Personal access token set up\n\
                Error: {}",
                stderr
            )
        } else {
            stderr.to_string()
        };

        return Err(Error::GitCommand {
            command: match ref_name {
                Some(ref_name) => format!("{} ({})", args.join(" "), ref_name),
                None => args.join(" "),
            },
            url: url.to_string(),
            stderr,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = "\
7fd1a60b01f91b314f59955a4e4d4e80d8edf11d\tHEAD
7fd1a60b01f91b314f59955a4e4d4e80d8edf11d\trefs/heads/main
b0b2a3a4a5a6a7a8a9aaabacadaeafb0b1b2b3b4\trefs/heads/feature/login
c1c2c3c4c5c6c7c8c9cacbcccdcecfd0d1d2d3d4\trefs/tags/v1.0.0
d1d2d3d4d5d6d7d8d9dadbdcdddedfe0e1e2e3e4\trefs/tags/v1.0.0^{}
e1e2e3e4e5e6e7e8e9eaebecedeeeff0f1f2f3f4\trefs/pull/12/head
";

    #[test]
    fn test_parse_ls_remote_kinds() {
        let refs = parse_ls_remote(LISTING).unwrap();
        assert_eq!(refs.len(), 6);

        assert_eq!(refs[0], RefEntry::head("7fd1a60b01f91b314f59955a4e4d4e80d8edf11d"));
        assert_eq!(
            refs[1],
            RefEntry::branch("main", "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d")
        );
        assert_eq!(refs[2].name.as_deref(), Some("feature/login"));
        assert_eq!(refs[3].kind, RefKind::Tag);
        assert_eq!(refs[3].name.as_deref(), Some("v1.0.0"));
        assert_eq!(refs[4].name.as_deref(), Some("v1.0.0^{}"));
        assert_eq!(refs[5].kind, RefKind::Other("pull".to_string()));
        assert_eq!(refs[5].name.as_deref(), Some("12/head"));
    }

    #[test]
    fn test_parse_ls_remote_ignores_blank_lines() {
        let refs = parse_ls_remote("\nabc\tHEAD\n\n").unwrap();
        assert_eq!(refs, vec![RefEntry::head("abc")]);
    }

    #[test]
    fn test_parse_ls_remote_rejects_unknown_rows() {
        let err = parse_ls_remote("abc\tHEAD\ndef\tsomething-else\n").unwrap_err();
        assert_eq!(err.code(), "BAD_REF");
        assert!(err.to_string().contains("something-else"));

        let err = parse_ls_remote("no-tab-here").unwrap_err();
        assert_eq!(err.code(), "BAD_REF");
    }

    #[test]
    fn test_list_refs_reports_git_failures() {
        let err = list_refs("/nonexistent/stencil/repository").unwrap_err();
        assert_eq!(err.code(), "GIT_COMMAND");
    }

    // Note: Integration tests for clone_detached require network access and
    // live in tests/ behind the integration-tests feature.
}
