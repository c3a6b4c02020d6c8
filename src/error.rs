//! # Error Handling
//!
//! This module defines the centralized error type for `blade-provider`. It
//! uses `thiserror` to derive one `Error` enum covering every failure mode of
//! configuration resolution, instantiation, backend invocation and secret
//! handling, with the offending class, field or secret named in the message.
//!
//! ## Taxonomy
//!
//! Every variant falls into one of the [`ErrorKind`] buckets:
//!
//! - **Configuration**: malformed input, unknown parent, cyclic inheritance,
//!   missing required fields, naming collisions. Always fatal; no partial
//!   resolution is exposed.
//! - **ResourcePool**: a declared count exceeds a finite pool such as an
//!   address list. Reported before any backend invocation.
//! - **BackendInvocation**: a subprocess collaborator exited non-zero. The
//!   captured output is carried verbatim.
//! - **Secret**: unknown secret or secret store failure.
//! - **Io**: local filesystem and serialization failures.

use thiserror::Error;

/// Main error type for blade-provider operations
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration document is malformed.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A class names a `parent_class` that does not exist.
    #[error("Class '{class}' names unknown parent class '{parent}'")]
    UnknownParent { class: String, parent: String },

    /// Following `parent_class` links revisited a class.
    #[error("Cyclic inheritance at class '{class}': {cycle}")]
    CyclicInheritance { class: String, cycle: String },

    /// A mandatory field is absent, null or empty after resolution.
    #[error("Class '{class}' is missing required field '{field}'")]
    MissingRequiredField { class: String, field: String },

    /// A field is present but holds an unusable value.
    #[error("Class '{class}' has invalid field '{field}': {message}")]
    InvalidField {
        class: String,
        field: String,
        message: String,
    },

    /// The address pool of a class is smaller than its declared count.
    #[error("Class '{class}' declares {count} instances but its address pool has only {available} entries")]
    InsufficientAddressPool {
        class: String,
        count: usize,
        available: usize,
    },

    /// Two resources resolved to the same name.
    #[error("Name '{name}' is produced by both '{first}' and '{second}'")]
    NameCollision {
        name: String,
        first: String,
        second: String,
    },

    /// A class lookup named a class that does not exist or is a pure base class.
    #[error("Unknown {kind} '{class}'")]
    UnknownClass { kind: String, class: String },

    /// An instance number outside `0..count`.
    #[error("Instance {instance} out of range for class '{class}' which has a count of {count}")]
    InstanceOutOfRange {
        class: String,
        instance: usize,
        count: usize,
    },

    /// The provisioning backend exited non-zero. `output` is the captured
    /// stderr and stdout, unmodified.
    #[error("Provisioning backend '{verb}' failed ({status}):\n{output}")]
    BackendInvocation {
        verb: String,
        status: String,
        output: String,
    },

    /// A collaborator executable could not be started at all.
    #[error("Failed to execute '{command}': {message}")]
    CommandNotFound { command: String, message: String },

    /// The cloud command-line client exited non-zero.
    #[error("Cloud command failed ({status}): {command}\n{stderr}")]
    CloudCommand {
        command: String,
        status: String,
        stderr: String,
    },

    /// A removal would delete resources flagged with `deletion_protection`.
    #[error("Refusing to remove deletion-protected resources: {}", resources.join(", "))]
    DeletionProtected { resources: Vec<String> },

    /// A secret name that was never declared in configuration.
    #[error("Unknown secret '{name}'")]
    UnknownSecret { name: String },

    /// The secret store rejected or failed an operation.
    #[error("Secret store error for '{name}': {message}")]
    SecretStore { name: String, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    ResourcePool,
    BackendInvocation,
    Secret,
    Io,
}

impl Error {
    /// Classify this error into its taxonomy bucket.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ConfigParse { .. }
            | Error::UnknownParent { .. }
            | Error::CyclicInheritance { .. }
            | Error::MissingRequiredField { .. }
            | Error::InvalidField { .. }
            | Error::NameCollision { .. }
            | Error::UnknownClass { .. }
            | Error::InstanceOutOfRange { .. }
            | Error::DeletionProtected { .. } => ErrorKind::Configuration,
            Error::InsufficientAddressPool { .. } => ErrorKind::ResourcePool,
            Error::BackendInvocation { .. }
            | Error::CommandNotFound { .. }
            | Error::CloudCommand { .. } => ErrorKind::BackendInvocation,
            Error::UnknownSecret { .. } | Error::SecretStore { .. } => ErrorKind::Secret,
            Error::Io(_) | Error::Yaml(_) | Error::Json(_) => ErrorKind::Io,
        }
    }

    /// Shorthand for a configuration error without a hint.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            hint: None,
        }
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
