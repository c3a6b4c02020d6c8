//! # Completions Command Implementation
//!
//! Writes a shell completion script for `blade-provider` to stdout.
//!
//! ```bash
//! blade-provider completions bash > ~/.local/share/bash-completion/completions/blade-provider
//! blade-provider completions zsh > ~/.zfunc/_blade-provider
//! ```

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};
use std::io;

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    generate(args.shell, &mut cmd, "blade-provider", &mut io::stdout());
    Ok(())
}
