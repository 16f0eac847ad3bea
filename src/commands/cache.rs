//! # Cache Command Implementation
//!
//! This module implements the `cache` subcommand, which manages the local
//! archive cache.
//!
//! ## Subcommands
//!
//! - **`list`**: Display every cached ref with its commit hash, most recently
//!   cloned first
//! - **`clean`**: Remove cached repositories (--all, --older-than)

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use stencil::cache::{CacheStore, CachedRepo};
use stencil::config::{Config, CACHE_ENV};
use stencil::output::{emoji, OutputConfig};

/// Manage the archive cache
#[derive(Args, Debug)]
pub struct CacheArgs {
    /// The root directory for the archive cache.
    ///
    /// If not provided, it defaults to the system's cache directory
    /// (e.g., `~/.cache/stencil` on Linux).
    #[arg(long, value_name = "DIR", env = CACHE_ENV)]
    pub cache_root: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum CacheSubcommand {
    /// List all cached refs
    List(ListArgs),
    /// Clean cached repositories
    Clean(CleanArgs),
}

/// Arguments for the cache list command
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the cache clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Show what would be deleted without actually deleting anything
    #[arg(long)]
    pub dry_run: bool,

    /// Delete all cached repositories
    #[arg(long)]
    pub all: bool,

    /// Delete repositories not cloned within the specified duration
    ///
    /// Duration format: number followed by unit (s, m, h, d, w)
    /// Examples: "30d", "7d", "1h", "30m", "2w"
    #[arg(long, value_name = "DURATION")]
    pub older_than: Option<String>,
}

/// One cached ref, as listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct RefRow {
    repo: String,
    #[serde(rename = "ref")]
    ref_name: String,
    hash: String,
    last_access: Option<DateTime<Utc>>,
    archived: bool,
}

/// Execute the `cache` command.
pub fn execute(args: CacheArgs, output: &OutputConfig) -> Result<()> {
    let cache_root = args
        .cache_root
        .unwrap_or_else(|| Config::from_env().cache_root);
    let store = CacheStore::new(cache_root);

    match args.command {
        CacheSubcommand::List(list_args) => execute_list(&store, list_args),
        CacheSubcommand::Clean(clean_args) => execute_clean(&store, clean_args, output),
    }
}

/// Execute the `cache list` command.
fn execute_list(store: &CacheStore, args: ListArgs) -> Result<()> {
    let repos = store.list().context("Failed to scan cache directory")?;
    let rows = collect_rows(&repos);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        println!("No cached repositories found in: {}", store.root().display());
        return Ok(());
    }

    println!("{:<48} {:<12} {:<20}", "REPOSITORY", "HASH", "LAST CLONED");
    println!("{}", "-".repeat(80));
    for row in &rows {
        let label = format!("{}#{}", row.repo, row.ref_name);
        let last = row
            .last_access
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "(unknown)".to_string());
        let missing = if row.archived { "" } else { " (no archive)" };
        println!(
            "{:<48} {:<12} {:<20}{}",
            label,
            abbreviate(&row.hash),
            last,
            missing
        );
    }
    println!("\nTotal: {} cached refs", rows.len());

    Ok(())
}

/// First 12 characters of a hash. Hand-edited maps may hold arbitrary text.
fn abbreviate(hash: &str) -> &str {
    hash.char_indices()
        .nth(12)
        .map_or(hash, |(end, _)| &hash[..end])
}

/// Flatten repositories into one row per ref, most recently cloned first.
fn collect_rows(repos: &[CachedRepo]) -> Vec<RefRow> {
    let mut rows: Vec<RefRow> = repos
        .iter()
        .flat_map(|repo| {
            let label = format!("{}/{}/{}", repo.site, repo.user, repo.name);
            repo.record.refs.iter().map(move |(ref_name, hash)| RefRow {
                repo: label.clone(),
                ref_name: ref_name.clone(),
                hash: hash.clone(),
                last_access: repo.record.access.get(ref_name).copied(),
                archived: repo.dir.join(format!("{}.tar.gz", hash)).is_file(),
            })
        })
        .collect();

    rows.sort_by(|a, b| {
        b.last_access
            .cmp(&a.last_access)
            .then_with(|| a.repo.cmp(&b.repo))
            .then_with(|| a.ref_name.cmp(&b.ref_name))
    });
    rows
}

/// Execute the `cache clean` command.
fn execute_clean(store: &CacheStore, args: CleanArgs, output: &OutputConfig) -> Result<()> {
    if !args.all && args.older_than.is_none() {
        return Err(stencil::suggestions::cache_clean_no_filter());
    }

    let older_than = match &args.older_than {
        Some(duration_str) => Some(parse_duration(duration_str).with_context(|| {
            format!("Invalid duration format: '{}'. Expected format: number followed by unit (s, m, h, d, w)", duration_str)
        })?),
        None => None,
    };

    let repos = store.list().context("Failed to scan cache directory")?;
    if repos.is_empty() {
        println!("No cached repositories found in: {}", store.root().display());
        return Ok(());
    }

    let to_delete = filter_repos_for_cleanup(&repos, args.all, older_than, Utc::now());
    if to_delete.is_empty() {
        println!("No cached repositories match the specified criteria.");
        return Ok(());
    }

    println!("Cached repositories to be deleted:\n");
    let mut total_size = 0;
    for repo in &to_delete {
        let size = directory_size(&repo.dir);
        total_size += size;
        println!(
            "  {}/{}/{} ({})",
            repo.site,
            repo.user,
            repo.name,
            format_size(size)
        );
    }
    println!(
        "\nTotal: {} repositories ({})",
        to_delete.len(),
        format_size(total_size)
    );

    if args.dry_run {
        println!("\n{} Dry run mode - no changes were made.", emoji(output, "🔎", "[DRY RUN]"));
        return Ok(());
    }

    let mut deleted_count = 0;
    let mut failed_count = 0;
    for repo in &to_delete {
        match fs::remove_dir_all(&repo.dir) {
            Ok(()) => deleted_count += 1,
            Err(e) => {
                failed_count += 1;
                eprintln!(
                    "  {} Failed to delete {}: {}",
                    emoji(output, "❌", "[FAIL]"),
                    repo.dir.display(),
                    e
                );
            }
        }
    }

    if deleted_count > 0 {
        println!(
            "\n{} Deleted {} cached repositories.",
            emoji(output, "✅", "[OK]"),
            deleted_count
        );
    }
    if failed_count > 0 {
        anyhow::bail!("Failed to delete {} cached repositories", failed_count);
    }

    Ok(())
}

/// Select repositories to delete.
///
/// With `older_than`, a repository is selected when its most recent clone of
/// any ref is at least that old, or when it has no access record at all.
fn filter_repos_for_cleanup<'a>(
    repos: &'a [CachedRepo],
    all: bool,
    older_than: Option<Duration>,
    now: DateTime<Utc>,
) -> Vec<&'a CachedRepo> {
    repos
        .iter()
        .filter(|repo| {
            if all {
                return true;
            }
            let Some(threshold) = older_than else {
                return false;
            };
            match repo.record.last_access() {
                Some(last) => (now - last)
                    .to_std()
                    .map(|age| age >= threshold)
                    // accessed in the future: clock skew, keep it
                    .unwrap_or(false),
                None => true,
            }
        })
        .collect()
}

/// Parse a duration string into a Duration
///
/// Format: number followed by unit (s, m, h, d, w)
/// Examples: "30d", "7d", "1h", "30m", "2w"
fn parse_duration(duration_str: &str) -> Result<Duration> {
    let duration_str = duration_str.trim().to_lowercase();

    if duration_str.is_empty() {
        return Err(anyhow::anyhow!("Duration string cannot be empty"));
    }

    let split_idx = duration_str
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(duration_str.len());

    if split_idx == 0 {
        return Err(anyhow::anyhow!("Duration must start with a number"));
    }

    let number_str = &duration_str[..split_idx];
    let unit_str = &duration_str[split_idx..];

    let number: f64 = number_str
        .parse()
        .with_context(|| format!("Invalid number in duration: '{}'", number_str))?;

    let seconds = match unit_str {
        "s" | "sec" | "second" | "seconds" => number,
        "m" | "min" | "minute" | "minutes" => number * 60.0,
        "h" | "hr" | "hour" | "hours" => number * 3600.0,
        "d" | "day" | "days" => number * 86400.0,
        "w" | "week" | "weeks" => number * 604800.0,
        _ => {
            return Err(anyhow::anyhow!(
                "Invalid duration unit: '{}'. Valid units: s, m, h, d, w",
                unit_str
            ));
        }
    };

    Ok(Duration::from_secs(seconds as u64))
}

fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.metadata().ok())
        .filter(|meta| meta.is_file())
        .map(|meta| meta.len())
        .sum()
}

/// Format size in human-readable format
fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[unit_idx])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}
