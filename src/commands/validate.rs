//! # Validate Command Implementation
//!
//! Resolves the configuration (base document plus overlays) and reports what
//! it declares: classes of each kind, blade instances with their addresses,
//! interconnects and secrets. Any resolution error fails the command.
//!
//! With `--plan` the backend tree is rendered and the provisioning backend's
//! `plan` runs against it. Without it the command is read-only and never
//! starts an external program.

use anyhow::{Context, Result};
use clap::Args;
use serde_yaml::Value as YamlValue;

use blade_provider::classes::ResourceKind;
use blade_provider::config::ProviderConfig;
use blade_provider::error::Result as ProviderResult;
use blade_provider::output::{emoji, spinner, OutputConfig};
use blade_provider::provider::Provider;

use crate::cli::GlobalArgs;

/// Resolve the configuration and report what it declares
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also render the backend tree and run the backend's plan.
    #[arg(long)]
    pub plan: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, global: &GlobalArgs) -> Result<()> {
    let out = global.output();
    println!(
        "{} Validating configuration: {}",
        emoji(&out, "🔍", "[SCAN]"),
        global.config.display()
    );

    let document = global.document()?;
    let provider = match resolved_provider(document, global) {
        Ok(provider) => provider,
        Err(e) => {
            println!("{} Configuration is invalid", emoji(&out, "❌", "[ERR]"));
            return Err(e).context("Configuration resolution failed");
        }
    };
    print_summary(provider.config()?, &out);

    if args.plan {
        let bar = spinner(&out, "Running backend plan...");
        let result = provider.validate();
        bar.finish_and_clear();
        let invocation = result.context("Backend plan failed")?;
        print!("{}", invocation.stdout);
        println!("{} Backend plan succeeded", emoji(&out, "✅", "[OK]"));
    }

    println!("{} Configuration is valid", emoji(&out, "✅", "[OK]"));
    Ok(())
}

/// A provider whose configuration has already been resolved.
fn resolved_provider(document: YamlValue, global: &GlobalArgs) -> ProviderResult<Provider> {
    let provider = Provider::with_defaults(document, global.build_dir())?;
    provider.config()?;
    Ok(provider)
}

fn print_summary(config: &ProviderConfig, out: &OutputConfig) {
    println!("\n{} Configuration Summary:", emoji(out, "📊", "[INFO]"));
    println!("   Project: {}", config.project_name());
    for kind in [ResourceKind::BladeInterconnect, ResourceKind::VirtualBlade] {
        let classes = config.classes(kind);
        let pure = classes.values().filter(|c| c.pure_base_class).count();
        println!(
            "   {} classes: {} ({} pure base)",
            kind.section(),
            classes.len(),
            pure
        );
    }

    println!("   Interconnects:");
    for interconnect in config.interconnects() {
        println!(
            "     {} {} ({})",
            interconnect.network_name, interconnect.ipv4_cidr, interconnect.class
        );
    }

    println!("   Blades:");
    for blade in config.blades() {
        println!(
            "     {} [{}] {}",
            blade.name,
            blade.class,
            blade.address.as_deref().unwrap_or("-")
        );
    }

    let secrets: Vec<&str> = config.secrets().names().collect();
    if !secrets.is_empty() {
        println!("   Secrets: {}", secrets.join(", "));
    }
}
