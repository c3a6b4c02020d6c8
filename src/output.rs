//! # Terminal Output
//!
//! Controls how the `blade-provider` CLI decorates its output: emoji or
//! bracketed plain-text status markers, and spinners while the provisioning
//! backend runs.
//!
//! Decoration follows the usual conventions:
//! - `--color=never|always|auto`
//! - `NO_COLOR` set (any value) disables decoration
//! - `CLICOLOR=0` disables it, `CLICOLOR_FORCE=1` forces it
//! - `TERM=dumb` disables it
//!
//! ```rust,ignore
//! use blade_provider::output::{emoji, OutputConfig};
//!
//! let out = OutputConfig::from_env_and_flag("auto");
//! println!("{} Deploying...", emoji(&out, "🚀", "[DEPLOY]"));
//! ```

use std::env;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Output decoration settings.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors, emoji and spinners are used.
    pub use_color: bool,
}

impl OutputConfig {
    /// Build from the `--color` flag value (`always`, `never` or `auto`).
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };
        Self { use_color }
    }

    fn detect_color_support() -> bool {
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
        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when decoration is on, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// A spinner shown while a long-running collaborator works.
///
/// Hidden when decoration is off, so piped output stays clean.
pub fn spinner(config: &OutputConfig, message: impl Into<String>) -> ProgressBar {
    if !config.use_color {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
        bar.set_style(style);
    }
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_flag() {
        assert!(OutputConfig::from_env_and_flag("always").use_color);
        assert!(!OutputConfig::from_env_and_flag("never").use_color);
        assert!(OutputConfig::from_env_and_flag("ALWAYS").use_color);
    }

    #[test]
    #[serial_test::serial]
    fn test_no_color_env_in_auto_mode() {
        env::set_var("NO_COLOR", "1");
        let config = OutputConfig::from_env_and_flag("auto");
        env::remove_var("NO_COLOR");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper() {
        assert_eq!(emoji(&OutputConfig::with_color(), "🚀", "[DEPLOY]"), "🚀");
        assert_eq!(emoji(&OutputConfig::without_color(), "🚀", "[DEPLOY]"), "[DEPLOY]");
    }

    #[test]
    fn test_spinner_hidden_without_color() {
        let bar = spinner(&OutputConfig::without_color(), "applying");
        assert!(bar.is_hidden());
        bar.finish_and_clear();
    }
}
