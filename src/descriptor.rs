//! # Repository Specifiers
//!
//! Turns a specifier string such as `github.com/acme/widget/src#v2` into a
//! typed [`RepoDescriptor`].
//!
//! ## Grammar
//!
//! ```text
//! specifier := [prefix] user "/" name { "/" segment } ["/"] ["#" ref]
//! prefix    := [("http" | "https") "://"] host "/"
//!            | "git@" host (":" | "/")
//!            | host ":"
//! ```
//!
//! A bare `host/` prefix (without a protocol) is only recognised when the host
//! contains a dot and is followed by at least `user/name`; otherwise the first
//! segment is the user. A trailing `.git` on `name` is dropped, the ref defaults
//! to `HEAD`, and an absent host falls back to the parser's default host.
//!
//! The parser works in two passes: [`tokenize`] splits the input into its
//! syntactic parts without judging them, and [`SpecifierParser::parse`]
//! validates those parts and builds the descriptor.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Hosts that `stencil` knows how to fetch archives from.
pub const SUPPORTED_HOSTS: &[&str] = &[
    "github.com",
    "gitlab.com",
    "bitbucket.org",
    "git.sr.ht",
    DEFAULT_HOST,
];

/// Host assumed when a specifier carries none.
pub const DEFAULT_HOST: &str = "git.srv.ourwill.cn";

/// Symbolic ref used when a specifier carries none.
pub const HEAD: &str = "HEAD";

/// Transport used to build the repository's web URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a repository is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Download a compressed snapshot and extract it.
    Archive,
    /// Clone with git, then strip the `.git` directory.
    Vcs,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Archive => "archive",
            Mode::Vcs => "vcs",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "archive" | "tar" => Ok(Mode::Archive),
            "vcs" | "git" => Ok(Mode::Vcs),
            other => Err(Error::InvalidMode {
                mode: other.to_string(),
            }),
        }
    }
}

/// A parsed repository specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoDescriptor {
    pub protocol: Protocol,
    pub site: String,
    pub user: String,
    pub name: String,
    pub r#ref: String,
    /// Path inside the repository, without leading or trailing slashes.
    pub subdir: Option<String>,
    pub url: String,
    pub ssh_url: String,
    pub mode: Mode,
}

impl RepoDescriptor {
    /// Whether the ref is the symbolic `HEAD`.
    pub fn is_head(&self) -> bool {
        self.r#ref == HEAD
    }

    /// URL used for a direct clone over HTTP(S).
    pub fn clone_url(&self) -> String {
        format!("{}.git", self.url)
    }
}

impl fmt::Display for RepoDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.name)?;
        if let Some(subdir) = &self.subdir {
            write!(f, "/{}", subdir)?;
        }
        write!(f, "#{}", self.r#ref)
    }
}

/// Syntactic parts of a specifier, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tokens<'a> {
    pub protocol: Option<&'a str>,
    pub host: Option<&'a str>,
    pub segments: Vec<&'a str>,
    pub r#ref: Option<&'a str>,
}

/// Split a specifier into protocol, host, path segments and ref.
///
/// Returns `None` when the input cannot be split at all (whitespace, a missing
/// host after a protocol, an empty ref).
pub fn tokenize(input: &str) -> Option<Tokens<'_>> {
    let (body, r#ref) = match input.split_once('#') {
        Some((_, "")) => return None,
        Some((body, r#ref)) => (body, Some(r#ref)),
        None => (input, None),
    };

    if body.is_empty() || body.chars().any(char::is_whitespace) {
        return None;
    }

    let mut tokens = Tokens {
        r#ref,
        ..Tokens::default()
    };

    let rest = if let Some((protocol, rest)) = split_protocol(body) {
        let (host, rest) = rest.split_once('/')?;
        if host.is_empty() || host.contains(':') {
            return None;
        }
        tokens.protocol = Some(protocol);
        tokens.host = Some(host);
        rest
    } else if let Some(rest) = body.strip_prefix("git@") {
        let idx = rest.find([':', '/'])?;
        let host = &rest[..idx];
        if host.is_empty() {
            return None;
        }
        tokens.host = Some(host);
        &rest[idx + 1..]
    } else {
        let first = body.split('/').next().unwrap_or_default();
        if let Some((host, _)) = first.split_once(':') {
            if host.is_empty() {
                return None;
            }
            tokens.host = Some(host);
            &body[host.len() + 1..]
        } else if first.contains('.') && body.split('/').filter(|s| !s.is_empty()).count() >= 3 {
            tokens.host = Some(first);
            &body[first.len() + 1..]
        } else {
            body
        }
    };

    let mut segments: Vec<&str> = rest.split('/').collect();
    if segments.len() > 2 && segments.last() == Some(&"") {
        segments.pop();
    }
    tokens.segments = segments;

    Some(tokens)
}

fn split_protocol(body: &str) -> Option<(&str, &str)> {
    ["https", "http"].into_iter().find_map(|protocol| {
        body.strip_prefix(protocol)
            .and_then(|rest| rest.strip_prefix("://"))
            .map(|rest| (protocol, rest))
    })
}

/// Parses specifiers against a configurable default host.
#[derive(Debug, Clone)]
pub struct SpecifierParser {
    default_host: String,
}

impl Default for SpecifierParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SpecifierParser {
    pub fn new() -> Self {
        Self::with_default_host(DEFAULT_HOST)
    }

    pub fn with_default_host(host: impl Into<String>) -> Self {
        Self {
            default_host: host.into(),
        }
    }

    pub fn default_host(&self) -> &str {
        &self.default_host
    }

    pub fn parse(&self, input: &str) -> Result<RepoDescriptor> {
        let bad = || Error::BadSpecifier {
            src: input.to_string(),
        };

        let tokens = tokenize(input).ok_or_else(bad)?;

        let (user, name, rest) = match tokens.segments.as_slice() {
            [user, name, rest @ ..] => (*user, *name, rest),
            _ => return Err(bad()),
        };
        if user.is_empty() || rest.iter().any(|segment| segment.is_empty()) {
            return Err(bad());
        }
        let name = name.strip_suffix(".git").unwrap_or(name);
        if name.is_empty() {
            return Err(bad());
        }

        let site = tokens.host.unwrap_or(self.default_host.as_str());
        if !SUPPORTED_HOSTS.contains(&site) {
            return Err(Error::UnsupportedHost {
                host: site.to_string(),
            });
        }

        let protocol = match tokens.protocol {
            Some("https") => Protocol::Https,
            _ => Protocol::Http,
        };
        let subdir = (!rest.is_empty()).then(|| rest.join("/"));

        Ok(RepoDescriptor {
            protocol,
            url: format!("{}://{}/{}/{}", protocol, site, user, name),
            ssh_url: format!("git@{}:{}/{}", site, user, name),
            site: site.to_string(),
            user: user.to_string(),
            name: name.to_string(),
            r#ref: tokens.r#ref.unwrap_or(HEAD).to_string(),
            subdir,
            mode: Mode::Archive,
        })
    }
}

/// Parse a specifier using the built-in default host.
pub fn parse(input: &str) -> Result<RepoDescriptor> {
    SpecifierParser::new().parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_user_name_uses_defaults() {
        let repo = parse("acme/widget").unwrap();
        assert_eq!(repo.site, DEFAULT_HOST);
        assert_eq!(repo.user, "acme");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.r#ref, "HEAD");
        assert!(repo.is_head());
        assert_eq!(repo.subdir, None);
        assert_eq!(repo.protocol, Protocol::Http);
        assert_eq!(repo.mode, Mode::Archive);
        assert_eq!(repo.url, format!("http://{}/acme/widget", DEFAULT_HOST));
        assert_eq!(repo.ssh_url, format!("git@{}:acme/widget", DEFAULT_HOST));
    }

    #[test]
    fn test_parse_host_subdir_and_ref() {
        let repo = parse("github.com/acme/widget/src#v2").unwrap();
        assert_eq!(repo.site, "github.com");
        assert_eq!(repo.user, "acme");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.subdir.as_deref(), Some("src"));
        assert_eq!(repo.r#ref, "v2");
        assert_eq!(repo.url, "http://github.com/acme/widget");
    }

    #[test]
    fn test_parse_https_url_with_git_suffix() {
        let repo = parse("https://gitlab.com/acme/widget.git").unwrap();
        assert_eq!(repo.protocol, Protocol::Https);
        assert_eq!(repo.site, "gitlab.com");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.url, "https://gitlab.com/acme/widget");
        assert_eq!(repo.clone_url(), "https://gitlab.com/acme/widget.git");
    }

    #[test]
    fn test_parse_ssh_form() {
        let repo = parse("git@bitbucket.org:acme/widget.git#dev").unwrap();
        assert_eq!(repo.site, "bitbucket.org");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.r#ref, "dev");
        assert_eq!(repo.ssh_url, "git@bitbucket.org:acme/widget");
    }

    #[test]
    fn test_parse_host_colon_form() {
        let repo = parse("git.sr.ht:~acme/widget").unwrap();
        assert_eq!(repo.site, "git.sr.ht");
        assert_eq!(repo.user, "~acme");

        let repo = parse("gitlab.com:acme/widget#main").unwrap();
        assert_eq!(repo.site, "gitlab.com");
        assert_eq!(repo.r#ref, "main");
    }

    #[test]
    fn test_parse_short_host_names_are_unsupported() {
        for input in ["github:acme/widget", "gitlab:acme/widget#v1", "bitbucket:acme/widget"] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.code(), "UNSUPPORTED_HOST", "{input}");
        }

        let err = parse("github:acme/widget").unwrap_err();
        assert!(matches!(err, Error::UnsupportedHost { ref host } if host == "github"));
    }

    #[test]
    fn test_parse_nested_subdir_and_trailing_slash() {
        let repo = parse("github.com/acme/widget/packages/core/").unwrap();
        assert_eq!(repo.subdir.as_deref(), Some("packages/core"));

        let repo = parse("acme/widget/").unwrap();
        assert_eq!(repo.subdir, None);
    }

    #[test]
    fn test_parse_ref_may_contain_slashes() {
        let repo = parse("github.com/acme/widget#feature/login").unwrap();
        assert_eq!(repo.r#ref, "feature/login");
        assert_eq!(repo.subdir, None);
    }

    #[test]
    fn test_dotted_first_segment_is_user_without_more_segments() {
        let repo = parse("acme.io/widget").unwrap();
        assert_eq!(repo.user, "acme.io");
        assert_eq!(repo.name, "widget");
        assert_eq!(repo.site, DEFAULT_HOST);
    }

    #[test]
    fn test_parse_unsupported_host() {
        let err = parse("https://example.org/acme/widget").unwrap_err();
        assert!(matches!(err, Error::UnsupportedHost { ref host } if host == "example.org"));

        let err = parse("git@example.org:acme/widget").unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_HOST");
    }

    #[test]
    fn test_parse_bad_specifiers() {
        for input in [
            "",
            "widget",
            "acme/",
            "/widget",
            "acme/widget#",
            "acme /widget",
            "https://github.com",
            "acme//widget",
            "acme/.git",
        ] {
            let err = parse(input).unwrap_err();
            assert_eq!(err.code(), "BAD_SRC", "input {:?} gave {}", input, err);
        }
    }

    #[test]
    fn test_configured_default_host() {
        let parser = SpecifierParser::with_default_host("gitlab.com");
        let repo = parser.parse("acme/widget").unwrap();
        assert_eq!(repo.site, "gitlab.com");

        let parser = SpecifierParser::with_default_host("example.org");
        assert_eq!(parser.parse("acme/widget").unwrap_err().code(), "UNSUPPORTED_HOST");
    }

    #[test]
    fn test_tokenize_keeps_raw_parts() {
        let tokens = tokenize("https://github.com/acme/widget/a/b#v1").unwrap();
        assert_eq!(tokens.protocol, Some("https"));
        assert_eq!(tokens.host, Some("github.com"));
        assert_eq!(tokens.segments, vec!["acme", "widget", "a", "b"]);
        assert_eq!(tokens.r#ref, Some("v1"));
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!("archive".parse::<Mode>().unwrap(), Mode::Archive);
        assert_eq!("tar".parse::<Mode>().unwrap(), Mode::Archive);
        assert_eq!("vcs".parse::<Mode>().unwrap(), Mode::Vcs);
        assert_eq!("git".parse::<Mode>().unwrap(), Mode::Vcs);
        assert_eq!("zip".parse::<Mode>().unwrap_err().code(), "BAD_MODE");
    }

    #[test]
    fn test_descriptor_display() {
        let repo = parse("github.com/acme/widget/src#v2").unwrap();
        assert_eq!(repo.to_string(), "acme/widget/src#v2");
    }
}
