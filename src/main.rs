//! # Blade Provider CLI
//!
//! Binary entry point for the `blade-provider` command-line tool. It parses
//! arguments with `clap` and dispatches to the subcommands in `commands`;
//! resolution, rendering and collaborator calls all live in the library.
//! Any error ends the process with status 1 and the error chain on stderr.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
