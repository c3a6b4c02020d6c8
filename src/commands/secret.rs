//! # Secret Command Implementation
//!
//! Reads or stores values of secrets declared in the configuration. Values
//! always come from the secret store; nothing is cached locally.

use std::io::Read;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::cli::GlobalArgs;

/// Read or store declared secrets
#[derive(Args, Debug)]
pub struct SecretArgs {
    #[command(subcommand)]
    pub command: SecretCommand,
}

#[derive(Subcommand, Debug)]
pub enum SecretCommand {
    /// Print the latest value of a secret
    Read {
        /// Secret name as declared in configuration.
        name: String,
    },
    /// Store a new value for a secret
    Store {
        /// Secret name as declared in configuration.
        name: String,

        /// The value to store; read from stdin when omitted.
        #[arg(long)]
        value: Option<String>,
    },
}

/// Execute the `secret` command.
pub fn execute(args: SecretArgs, global: &GlobalArgs) -> Result<()> {
    let provider = global.provider()?;
    match args.command {
        SecretCommand::Read { name } => {
            let value = provider
                .read_secret(&name)
                .with_context(|| format!("Failed to read secret '{}'", name))?;
            println!("{}", value);
        }
        SecretCommand::Store { name, value } => {
            let data = match value {
                Some(value) => value.into_bytes(),
                None => {
                    let mut data = Vec::new();
                    std::io::stdin().read_to_end(&mut data)?;
                    data
                }
            };
            provider
                .store_secret(&name, &data)
                .with_context(|| format!("Failed to store secret '{}'", name))?;
        }
    }
    Ok(())
}
