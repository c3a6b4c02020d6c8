//! Provisioning backend
//!
//! The backend is a declarative infrastructure tool run as a subprocess in a
//! rendered working directory. The [`Backend`] trait is the seam between the
//! provider and that tool, so the facade can be driven by a recording mock in
//! tests. [`TerragruntBackend`] is the production implementation.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::{Error, Result};
use crate::process::{run_captured, Invocation, OutputLog};

/// What the backend is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Plan,
    Apply,
    Destroy,
    Output,
}

impl Verb {
    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Plan => "plan",
            Verb::Apply => "apply",
            Verb::Destroy => "destroy",
            Verb::Output => "output",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioning backend.
///
/// Implementations run one verb to completion and report what happened. A
/// non-zero exit is returned as an [`Invocation`], not an error; use
/// [`Backend::run`] to turn it into [`Error::BackendInvocation`].
pub trait Backend: Send + Sync {
    /// Run `verb` in `workdir` and capture the result.
    fn invoke(&self, verb: Verb, workdir: &Path) -> Result<Invocation>;

    /// Run `verb` and fail with the captured output verbatim on a non-zero exit.
    fn run(&self, verb: Verb, workdir: &Path) -> Result<Invocation> {
        let invocation = self.invoke(verb, workdir)?;
        if invocation.success() {
            Ok(invocation)
        } else {
            Err(Error::BackendInvocation {
                verb: verb.to_string(),
                status: invocation.status_text(),
                output: invocation.combined_output(),
            })
        }
    }
}

/// Terragrunt, run across every module of the working directory.
#[derive(Debug, Clone)]
pub struct TerragruntBackend {
    command: String,
    log: Option<OutputLog>,
}

impl TerragruntBackend {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            log: None,
        }
    }

    /// Keep the output of every run under `log`.
    pub fn with_output_log(mut self, log: OutputLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Arguments passed for `verb`.
    pub fn arguments(verb: Verb) -> Vec<&'static str> {
        let mut args = vec!["run-all", verb.as_str()];
        if verb == Verb::Output {
            args.push("-json");
        }
        args.push("--terragrunt-non-interactive");
        args
    }
}

impl Backend for TerragruntBackend {
    fn invoke(&self, verb: Verb, workdir: &Path) -> Result<Invocation> {
        debug!("Backend '{}' in {}", verb, workdir.display());
        let invocation = run_captured(
            &self.command,
            &Self::arguments(verb),
            Some(workdir),
            None,
        )?;
        if let Some(log) = &self.log {
            log.record(&format!("backend_{}", verb), &invocation);
        }
        Ok(invocation)
    }
}

/// Values the backend reports after applying, keyed by resource name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BackendOutputs {
    values: BTreeMap<String, JsonValue>,
}

impl BackendOutputs {
    /// Parse the output of `output -json` runs.
    ///
    /// The text is a stream of JSON objects, one per module. Each entry's
    /// `value` is taken; object values contribute each of their members under
    /// the member's name, anything else is kept under the entry's own name.
    /// When two entries report the same name the later one wins and the
    /// collision is logged.
    pub fn parse(text: &str) -> Result<Self> {
        let mut values = BTreeMap::new();
        for document in serde_json::Deserializer::from_str(text).into_iter::<JsonValue>() {
            let JsonValue::Object(entries) = document? else {
                continue;
            };
            for (name, entry) in entries {
                let value = match entry {
                    JsonValue::Object(mut fields) if fields.contains_key("value") => {
                        fields.remove("value").unwrap_or(JsonValue::Null)
                    }
                    other => other,
                };
                let flattened: Vec<(String, JsonValue)> = match value {
                    JsonValue::Object(members) => members.into_iter().collect(),
                    other => vec![(name.clone(), other)],
                };
                for (key, value) in flattened {
                    if values.insert(key.clone(), value).is_some() {
                        warn!(
                            "Backend output '{}' redefines '{}'; keeping the later value",
                            name, key
                        );
                    }
                }
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
        self.values.iter()
    }

    /// The externally reachable address reported for a resource.
    ///
    /// Accepts a plain string value or an object with an `external_address`
    /// member.
    pub fn external_address(&self, name: &str) -> Option<&str> {
        match self.values.get(name)? {
            JsonValue::String(address) => Some(address.as_str()),
            JsonValue::Object(fields) => fields.get("external_address")?.as_str(),
            _ => None,
        }
    }
}
