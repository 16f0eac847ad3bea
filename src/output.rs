//! # Output Configuration
//!
//! This module controls how the CLI renders progress events: whether colors
//! and emojis are used, and how each event level is styled.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust
//! use stencil::events::{Event, EventCode};
//! use stencil::output::{render_event, OutputConfig};
//!
//! let config = OutputConfig::from_env_and_flag("never");
//! let line = render_event(&config, &Event::warn(EventCode::FileDoesNotExist, "missing"));
//! assert_eq!(line, "! missing");
//! ```

use std::env;

use console::style;

use crate::events::{Event, Level};

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stderr is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        // events are written to stderr
        console::Term::stderr().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, the plain text otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// Render one event as a single line.
///
/// Info lines start with `>`, warnings with `!`, errors with `✖` (or `x`),
/// and successes with `✔` (or `+`).
pub fn render_event(config: &OutputConfig, event: &Event) -> String {
    let (marker, message) = match event.level {
        Level::Info => (">", event.message.as_str()),
        Level::Warn => ("!", event.message.as_str()),
        Level::Error => (emoji(config, "✖", "x"), event.message.as_str()),
        Level::Success => (emoji(config, "✔", "+"), event.message.as_str()),
    };
    let line = format!("{} {}", marker, message);

    if !config.use_color {
        return line;
    }

    let styled = style(line).force_styling(true);
    match event.level {
        Level::Info => styled.cyan(),
        Level::Warn => styled.magenta(),
        Level::Error => styled.red(),
        Level::Success => styled.green(),
    }
    .to_string()
}
