//! Captured subprocess invocation
//!
//! The provisioning backend and the cloud CLI are both external programs run
//! in the foreground. Each run is one request/response: the caller waits for
//! exit and gets an [`Invocation`] carrying the exit status and both output
//! streams. Nothing is retried and nothing runs concurrently.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use log::{debug, info, warn};

use crate::error::{Error, Result};

/// The captured result of one subprocess run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The command line, for diagnostics.
    pub command: String,
    /// Exit code, or `None` when the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Invocation {
    /// Whether the process exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Human-readable exit status.
    pub fn status_text(&self) -> String {
        match self.status {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }

    /// Stderr followed by stdout, as the operator would have seen them.
    pub fn combined_output(&self) -> String {
        match (self.stderr.is_empty(), self.stdout.is_empty()) {
            (true, _) => self.stdout.clone(),
            (false, true) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stderr, self.stdout),
        }
    }

    /// A successful invocation with the given stdout. Useful for collaborators
    /// that do not spawn anything.
    pub fn succeeded(command: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Render a program and its arguments as one line.
pub fn command_line<S: AsRef<str>>(program: &str, args: &[S]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(AsRef::as_ref))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run `program` with `args`, feeding `input` on stdin when given.
///
/// A program that cannot be started is reported as
/// [`Error::CommandNotFound`]; a non-zero exit is not an error here, callers
/// decide how to surface it.
pub fn run_captured<S: AsRef<str>>(
    program: &str,
    args: &[S],
    cwd: Option<&Path>,
    input: Option<&[u8]>,
) -> Result<Invocation> {
    let line = command_line(program, args);
    debug!("Running: {}", line);

    let mut cmd = Command::new(program);
    cmd.args(args.iter().map(AsRef::as_ref))
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let not_found = |e: std::io::Error| Error::CommandNotFound {
        command: program.to_string(),
        message: e.to_string(),
    };
    let mut child = cmd.spawn().map_err(not_found)?;
    // Stdin is written on its own thread while the output pipes drain.
    let stdin = input.zip(child.stdin.take());
    let output = thread::scope(|scope| {
        let writer = stdin.map(|(bytes, mut pipe)| {
            scope.spawn(move || match pipe.write_all(bytes) {
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            })
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            writer
                .join()
                .map_err(|_| io::Error::other("stdin writer panicked"))??;
        }
        Ok::<_, io::Error>(output)
    })?;

    let invocation = Invocation {
        command: line,
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    info!("'{}' finished with {}", invocation.command, invocation.status_text());
    Ok(invocation)
}

/// Where captured output of collaborator runs is kept.
#[derive(Debug, Clone)]
pub struct OutputLog {
    dir: PathBuf,
}

impl OutputLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write `<tag>.out` and `<tag>.err`.
    ///
    /// Failing to write a log never fails the operation that produced it.
    pub fn record(&self, tag: &str, invocation: &Invocation) {
        let result = fs::create_dir_all(&self.dir).and_then(|_| {
            fs::write(self.dir.join(format!("{}.out", tag)), &invocation.stdout)?;
            fs::write(self.dir.join(format!("{}.err", tag)), &invocation.stderr)
        });
        if let Err(e) = result {
            warn!("Could not write output log '{}' in {}: {}", tag, self.dir.display(), e);
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
