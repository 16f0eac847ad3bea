//! # Error Suggestions
//!
//! Helpers that turn a failure into a message saying what went wrong AND how
//! to fix it. The CLI passes every fatal library error through
//! [`for_error`] before printing it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let result = cloner.clone_src(&args.src, &dest, &options, &sink);
//! result.map_err(|e| suggestions::for_error(&e))?;
//! ```

use crate::descriptor::{DEFAULT_HOST, SUPPORTED_HOSTS};
use crate::error::Error;

/// Attach hints to a library error.
pub fn for_error(error: &Error) -> anyhow::Error {
    match error {
        Error::BadSpecifier { src } => bad_specifier(src),
        Error::UnsupportedHost { host } => unsupported_host(host),
        Error::DestinationNotEmpty { .. } => anyhow::anyhow!(
            "{error}\n\n\
             hint: Pass -f/--force to write into it anyway\n\
             hint: Choose another destination directory"
        ),
        Error::MissingRef { r#ref } => anyhow::anyhow!(
            "{error}\n\n\
             hint: Check that '{selector}' is a branch, a tag or a commit hash of the repository\n\
             hint: Abbreviated commit hashes need at least 8 characters\n\
             hint: Without network access only refs cloned before can be used",
            selector = r#ref
        ),
        Error::InvalidMode { mode } => invalid_mode(mode),
        Error::Manifest { .. } => anyhow::anyhow!(
            "{error}\n\n\
             hint: Each entry needs an \"action\" of either \"clone\" or \"remove\""
        ),
        Error::GitCommand { .. } | Error::Network { .. } | Error::CouldNotFetch { .. } => {
            anyhow::anyhow!(
                "{error}\n\n\
                 hint: Check your network connection and proxy settings (--proxy, https_proxy)\n\
                 hint: Use -c/--cache to clone a ref that was cloned before"
            )
        }
        other => anyhow::anyhow!("{other}"),
    }
}

/// Generate an error for a specifier that does not parse.
pub fn bad_specifier(src: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Could not parse repository specifier: {src}\n\n\
         hint: Use user/name, host/user/name or https://host/user/name\n\
         hint: Append /path/inside/repo to copy a subdirectory\n\
         hint: Append #ref to pick a branch, tag or commit"
    )
}

/// Generate an error for a host outside the supported set.
///
/// Suggests the closest supported host when the input looks like a typo.
pub fn unsupported_host(host: &str) -> anyhow::Error {
    let did_you_mean = find_similar(host, SUPPORTED_HOSTS)
        .or_else(|| {
            SUPPORTED_HOSTS
                .iter()
                .copied()
                .find(|site| site.strip_prefix(host).is_some_and(|rest| rest.starts_with('.')))
        })
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unsupported host: {host}{did_you_mean}\n\n\
         Supported hosts are: {hosts}\n\
         hint: Specifiers without a host use {default_host}",
        hosts = SUPPORTED_HOSTS.join(", "),
        default_host = DEFAULT_HOST
    )
}

/// Generate an error for an unknown clone mode.
pub fn invalid_mode(mode: &str) -> anyhow::Error {
    let valid_modes = ["archive", "vcs"];
    let did_you_mean = find_similar(mode, &valid_modes)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    anyhow::anyhow!(
        "Unknown clone mode: {mode}{did_you_mean}\n\n\
         Valid modes are: {modes}",
        modes = valid_modes.join(", ")
    )
}

/// Generate an error for when cache clean is called without filters.
pub fn cache_clean_no_filter() -> anyhow::Error {
    anyhow::anyhow!(
        "At least one filter must be specified for cache clean\n\n\
         hint: Use --all to remove all cached repositories\n\
         hint: Use --older-than <DURATION> to remove repositories not cloned recently (e.g., '30d', '1w')"
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Levenshtein distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, a_char) in a.iter().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, b_char) in b.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        previous = current;
    }

    previous[b.len()]
}
