//! # Show Command Implementation
//!
//! Prints the resolved topology: blade instances with their configured and
//! backend-assigned addresses, interconnects and declared secrets. By default
//! the backend's `output` is queried first; `--resolved-only` skips it and
//! prints what the configuration alone determines.
//!
//! `--path` prints one sub-tree of the resolved document instead, e.g.
//! `virtual_blades.compute.blade_interconnect`.

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;

use blade_provider::output::spinner;

use crate::cli::GlobalArgs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Yaml,
    Json,
}

/// Show the resolved topology
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Dotted path into the resolved configuration to print instead.
    #[arg(long, value_name = "PATH")]
    pub path: Option<String>,

    /// Output format.
    #[arg(long, value_enum, default_value = "yaml")]
    pub format: Format,

    /// Do not query the backend for assigned addresses.
    #[arg(long)]
    pub resolved_only: bool,
}

fn render<T: Serialize>(value: &T, format: Format) -> Result<String> {
    Ok(match format {
        Format::Yaml => serde_yaml::to_string(value)?,
        Format::Json => serde_json::to_string_pretty(value)? + "\n",
    })
}

/// Execute the `show` command.
pub fn execute(args: ShowArgs, global: &GlobalArgs) -> Result<()> {
    let mut provider = global.provider()?;

    if let Some(path) = &args.path {
        let config = provider.config()?;
        let value = config
            .lookup(path)
            .ok_or_else(|| anyhow!("Nothing is configured at '{}'", path))?;
        print!("{}", render(value, args.format)?);
        return Ok(());
    }

    let topology = if args.resolved_only {
        provider.topology()?
    } else {
        let bar = spinner(&global.output(), "Querying backend outputs...");
        let result = provider.show();
        bar.finish_and_clear();
        result?
    };
    print!("{}", render(&topology, args.format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_formats() {
        let value: serde_yaml::Value = serde_yaml::from_str("count: 3").unwrap();
        assert_eq!(render(&value, Format::Yaml).unwrap(), "count: 3\n");
        assert_eq!(render(&value, Format::Json).unwrap(), "{\n  \"count\": 3\n}\n");
    }
}
