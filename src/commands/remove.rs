//! # Remove Command Implementation
//!
//! Deletes the declared secrets and destroys every backend resource. Classes
//! flagged `deletion_protection: true` block the removal unless `--force` is
//! given; that check runs before the operator is asked to confirm, which
//! `--yes` skips.

use anyhow::{Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use blade_provider::error::Error;
use blade_provider::output::{emoji, spinner};
use blade_provider::provider::RemoveOptions;

use crate::cli::GlobalArgs;

/// Destroy all resources and delete declared secrets
#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Remove resources even if they are deletion-protected.
    #[arg(long)]
    pub force: bool,

    /// Skip the confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `remove` command.
pub fn execute(args: RemoveArgs, global: &GlobalArgs) -> Result<()> {
    let out = global.output();
    let mut provider = global.provider()?;
    let config = provider.config()?;
    let project = config.project_name();

    let protected = config.protected_resources();
    if !args.force && !protected.is_empty() {
        return Err(Error::DeletionProtected {
            resources: protected.to_vec(),
        })
        .context("Remove failed");
    }

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Destroy every resource of {}?", project))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Remove cancelled.");
            return Ok(());
        }
    }

    println!("{} Removing {}", emoji(&out, "🗑️", "[REMOVE]"), project);
    let bar = spinner(&out, "Destroying resources...");
    let result = provider.remove(RemoveOptions { force: args.force });
    bar.finish_and_clear();
    result.context("Remove failed")?;

    println!("{} Remove complete", emoji(&out, "✅", "[OK]"));
    Ok(())
}
