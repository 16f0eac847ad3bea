//! # Clone Command Implementation
//!
//! This module implements the `clone` subcommand, the main entry point of the
//! tool. It copies a snapshot of a repository (or one of its subdirectories)
//! into a destination directory, without git history.
//!
//! ## Example
//!
//! ```bash
//! # Latest commit of the default branch into the current directory
//! stencil clone acme/widget
//!
//! # A subdirectory at a tag, into a new directory
//! stencil clone github.com/acme/widget/templates/basic#v2 my-app
//!
//! # Offline, reusing what an earlier clone cached
//! stencil clone -c github.com/acme/widget#v2 my-app
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use stencil::clone::{CloneOptions, Cloner};
use stencil::config::{Config, CACHE_ENV, DEFAULT_HOST_ENV};
use stencil::descriptor::Mode;
use stencil::events::Event;
use stencil::output::{render_event, OutputConfig};
use stencil::suggestions;

/// Copy a repository snapshot into a directory
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Repository specifier: [host/]user/name[/subdir][#ref]
    #[arg(value_name = "SRC")]
    pub src: String,

    /// Destination directory
    #[arg(value_name = "DEST", default_value = ".")]
    pub dest: PathBuf,

    /// Write into the destination even if it is not empty
    #[arg(short, long)]
    pub force: bool,

    /// Resolve refs from the local cache only, without contacting the remote
    #[arg(short, long)]
    pub cache: bool,

    /// Show every step
    #[arg(short, long)]
    pub verbose: bool,

    /// Clone mode (archive, vcs)
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// The root directory for the archive cache.
    ///
    /// If not provided, it defaults to the system's cache directory
    /// (e.g., `~/.cache/stencil` on Linux).
    #[arg(long, value_name = "DIR", env = CACHE_ENV)]
    pub cache_root: Option<PathBuf>,

    /// Host used for specifiers without one
    #[arg(long, value_name = "HOST", env = DEFAULT_HOST_ENV)]
    pub default_host: Option<String>,

    /// HTTPS proxy for archive downloads (defaults to `https_proxy`)
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,
}

/// Execute the `clone` command.
pub fn execute(args: CloneArgs, output: &OutputConfig) -> Result<()> {
    let mode = args
        .mode
        .as_deref()
        .map(str::parse::<Mode>)
        .transpose()
        .map_err(|e| suggestions::for_error(&e))?;

    let cloner = Cloner::new(build_config(&args));
    let options = CloneOptions {
        force: args.force,
        verbose: args.verbose,
        cache_only: args.cache,
        mode,
    };

    let sink = |event: &Event| eprintln!("{}", render_event(output, event));
    cloner
        .clone_src(&args.src, &args.dest, &options, &sink)
        .map_err(|e| suggestions::for_error(&e))?;

    Ok(())
}

fn build_config(args: &CloneArgs) -> Config {
    let mut config = Config::from_env();
    if let Some(root) = &args.cache_root {
        config.cache_root = root.clone();
    }
    if let Some(host) = &args.default_host {
        config = config.with_default_host(host.clone());
    }
    if args.proxy.is_some() {
        config = config.with_proxy(args.proxy.clone());
    }
    config
}
