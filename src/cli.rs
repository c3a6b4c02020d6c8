//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::debug;
use serde_yaml::Value as YamlValue;

use blade_provider::config::{load_document, DEFAULT_CONFIG_FILE};
use blade_provider::output::OutputConfig;
use blade_provider::provider::Provider;

use crate::commands;

/// Blade Provider - Resolve and deploy virtual blade cluster configurations
#[derive(Parser, Debug)]
#[command(name = "blade-provider")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Base configuration document.
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "BLADE_PROVIDER_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    /// Overlay documents merged onto the base configuration, in order.
    #[arg(long = "overlay", global = true, value_name = "FILE")]
    pub overlays: Vec<PathBuf>,

    /// Build directory for rendered backend input, logs and SSH keys.
    ///
    /// Defaults to `<cache dir>/blade-provider/build`.
    #[arg(long, global = true, value_name = "DIR", env = "BLADE_PROVIDER_BUILD_DIR")]
    pub build_dir: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}

impl GlobalArgs {
    pub fn output(&self) -> OutputConfig {
        OutputConfig::from_env_and_flag(&self.color)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.build_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".blade-provider-cache"))
                .join("blade-provider")
                .join("build")
        })
    }

    /// The base document with all overlays applied.
    pub fn document(&self) -> Result<YamlValue> {
        load_document(&self.config, &self.overlays)
            .with_context(|| format!("Failed to load configuration {}", self.config.display()))
    }

    /// A provider over the loaded document, running the configured commands.
    pub fn provider(&self) -> Result<Provider> {
        let build_dir = self.build_dir();
        debug!("Using build directory {}", build_dir.display());
        Ok(Provider::with_defaults(self.document()?, build_dir)?)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve the configuration and report what it declares
    Validate(commands::validate::ValidateArgs),

    /// Show the resolved topology
    Show(commands::show::ShowArgs),

    /// Display the class inheritance hierarchy
    Tree(commands::tree::TreeArgs),

    /// Create or update all resources
    Deploy(commands::deploy::DeployArgs),

    /// Destroy all resources and delete declared secrets
    Remove(commands::remove::RemoveArgs),

    /// Destroy the virtual blades, keeping the interconnects
    Dismantle(commands::lifecycle::DismantleArgs),

    /// Re-create the virtual blades after a dismantle
    Restore(commands::lifecycle::RestoreArgs),

    /// Read or store declared secrets
    Secret(commands::secret::SecretArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.global.log_level);

        let global = &self.global;
        match self.command {
            Commands::Validate(args) => commands::validate::execute(args, global),
            Commands::Show(args) => commands::show::execute(args, global),
            Commands::Tree(args) => commands::tree::execute(args, global),
            Commands::Deploy(args) => commands::deploy::execute(args, global),
            Commands::Remove(args) => commands::remove::execute(args, global),
            Commands::Dismantle(args) => commands::lifecycle::dismantle(args, global),
            Commands::Restore(args) => commands::lifecycle::restore(args, global),
            Commands::Secret(args) => commands::secret::execute(args, global),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level` when set.
fn init_logging(level: &str) {
    let env = env_logger::Env::default().default_filter_or(level);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .try_init();
}
