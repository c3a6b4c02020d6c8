//! # Deploy Command Implementation
//!
//! Renders the backend tree from the resolved configuration, applies it,
//! creates the declared secrets and prints the resulting blade addresses.
//! A backend failure ends the command with the backend's output; nothing is
//! retried.

use anyhow::{Context, Result};
use clap::Args;

use blade_provider::output::{emoji, spinner};

use crate::cli::GlobalArgs;

/// Create or update all resources
#[derive(Args, Debug)]
pub struct DeployArgs {}

/// Execute the `deploy` command.
pub fn execute(_args: DeployArgs, global: &GlobalArgs) -> Result<()> {
    let out = global.output();
    let mut provider = global.provider()?;

    let project = provider.config()?.project_name();
    println!("{} Deploying {}", emoji(&out, "🚀", "[DEPLOY]"), project);

    let bar = spinner(&out, "Applying configuration...");
    let result = provider.deploy();
    bar.finish_and_clear();
    result.context("Deploy failed")?;

    for blade in provider.topology()?.blades {
        println!(
            "   {} {}",
            blade.name,
            blade.external_address.or(blade.address).unwrap_or("-")
        );
    }
    println!("{} Deploy complete", emoji(&out, "✅", "[OK]"));
    Ok(())
}
