//! # CLI Command Implementations
//!
//! One module per `blade-provider` subcommand. Each module defines an `Args`
//! struct derived with `clap` and an `execute` function that loads the
//! configuration through the shared [`crate::cli::GlobalArgs`] and calls into
//! the `blade_provider` library.

pub mod completions;
pub mod deploy;
pub mod lifecycle;
pub mod remove;
pub mod secret;
pub mod show;
pub mod tree;
pub mod validate;
