//! Cloud command-line client
//!
//! Imperative operations the backend does not model (secret access, project
//! lookup) go through the cloud CLI. [`CloudCli`] is the seam; [`GcloudCli`]
//! runs the real client.

use log::debug;

use crate::error::{Error, Result};
use crate::process::{command_line, run_captured, Invocation, OutputLog};

/// A cloud command-line client.
pub trait CloudCli: Send + Sync {
    /// Run the client with `args`, feeding `input` on stdin when given.
    fn invoke(&self, args: &[String], input: Option<&[u8]>) -> Result<Invocation>;

    /// Run the client and fail on a non-zero exit.
    fn run(&self, args: &[String], input: Option<&[u8]>) -> Result<Invocation> {
        let invocation = self.invoke(args, input)?;
        if invocation.success() {
            Ok(invocation)
        } else {
            Err(Error::CloudCommand {
                command: invocation.command.clone(),
                status: invocation.status_text(),
                stderr: invocation.stderr,
            })
        }
    }
}

/// The `gcloud` client.
#[derive(Debug, Clone)]
pub struct GcloudCli {
    command: String,
    log: Option<OutputLog>,
}

impl GcloudCli {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            log: None,
        }
    }

    pub fn with_output_log(mut self, log: OutputLog) -> Self {
        self.log = Some(log);
        self
    }
}

impl CloudCli for GcloudCli {
    fn invoke(&self, args: &[String], input: Option<&[u8]>) -> Result<Invocation> {
        let invocation = run_captured(&self.command, args, None, input)?;
        if let Some(log) = &self.log {
            let tag = args
                .iter()
                .take_while(|arg| !arg.starts_with('-'))
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join("-");
            log.record(&format!("cloud_{}", tag), &invocation);
        }
        Ok(invocation)
    }
}

/// Look up the id of the project named `project_name`.
pub fn lookup_project_id(cli: &dyn CloudCli, project_name: &str) -> Result<String> {
    let args = vec![
        "projects".to_string(),
        "list".to_string(),
        format!("--filter=name={}", project_name),
        "--format=value(PROJECT_ID)".to_string(),
    ];
    let invocation = cli.run(&args, None)?;
    let id = invocation.stdout.trim();
    if id.is_empty() {
        return Err(Error::CloudCommand {
            command: command_line("projects", &args[1..]),
            status: invocation.status_text(),
            stderr: format!("no project named '{}' was found", project_name),
        });
    }
    debug!("Project '{}' has id '{}'", project_name, id);
    Ok(id.to_string())
}
