//! # Dismantle and Restore Command Implementations
//!
//! `dismantle` destroys only the virtual blades and leaves interconnects and
//! secrets in place; `restore` applies the virtual blades again.

use anyhow::{Context, Result};
use clap::Args;

use blade_provider::output::{emoji, spinner};

use crate::cli::GlobalArgs;

/// Destroy the virtual blades, keeping the interconnects
#[derive(Args, Debug)]
pub struct DismantleArgs {}

/// Re-create the virtual blades after a dismantle
#[derive(Args, Debug)]
pub struct RestoreArgs {}

/// Execute the `dismantle` command.
pub fn dismantle(_args: DismantleArgs, global: &GlobalArgs) -> Result<()> {
    let out = global.output();
    let mut provider = global.provider()?;
    let bar = spinner(&out, "Destroying virtual blades...");
    let result = provider.dismantle();
    bar.finish_and_clear();
    result.context("Dismantle failed")?;
    println!("{} Virtual blades dismantled", emoji(&out, "✅", "[OK]"));
    Ok(())
}

/// Execute the `restore` command.
pub fn restore(_args: RestoreArgs, global: &GlobalArgs) -> Result<()> {
    let out = global.output();
    let mut provider = global.provider()?;
    let bar = spinner(&out, "Restoring virtual blades...");
    let result = provider.restore();
    bar.finish_and_clear();
    result.context("Restore failed")?;
    println!("{} Virtual blades restored", emoji(&out, "✅", "[OK]"));
    Ok(())
}
