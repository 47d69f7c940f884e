//! Invocation of the external programs that drive the device.
//!
//! Every device effect klaxon produces (volume changes, vibration, sound,
//! speech) is an external program run to completion. [`Action`] describes one
//! such invocation and offers the three ways klaxon runs them:
//!
//! - [`Action::output`]: checked, stdout captured (queries)
//! - [`Action::run`]: checked, stdout inherited (alarm pulses)
//! - [`Action::status`]: unchecked, only spawn failures are errors (volume sets)
//!
//! Children never inherit stdin, so the operator's answer to the acknowledgment
//! prompt cannot be swallowed by a running action. Children are killed when the
//! future driving them is dropped.

use std::ffi::OsStr;
use std::fmt;
use std::process::{ExitStatus, Stdio};

use tracing::debug;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Apply the Windows `CREATE_NO_WINDOW` flag to child processes.
///
/// On non-Windows targets this is a no-op.
pub trait NoWindowExt {
    fn no_window(&mut self);
}

impl NoWindowExt for tokio::process::Command {
    fn no_window(&mut self) {
        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            self.as_std_mut().creation_flags(CREATE_NO_WINDOW);
        }
    }
}

/// Create a `tokio::process::Command` that is killed on drop, reads no stdin
/// and opens no console window on Windows.
pub fn tokio_command(program: impl AsRef<OsStr>) -> tokio::process::Command {
    let mut cmd = tokio::process::Command::new(program);
    cmd.no_window();
    cmd.stdin(Stdio::null());
    cmd.kill_on_drop(true);
    cmd
}

/// Failure of an external action.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}{}", stderr_suffix(.stderr))]
    ExitStatus {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("`{command}` wrote non UTF-8 output")]
    InvalidOutput { command: String },
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}

impl ActionError {
    /// Whether the program could not be started at all (missing binary, permissions).
    pub fn is_spawn_failure(&self) -> bool {
        matches!(self, Self::Spawn { .. })
    }
}

/// One invocation of an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    program: String,
    args: Vec<String>,
}

impl Action {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    fn command(&self) -> tokio::process::Command {
        let mut cmd = tokio_command(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> ActionError {
        ActionError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    /// Run to completion and return stdout. A non-zero exit is an error.
    pub async fn output(&self) -> Result<String, ActionError> {
        debug!(command = %self, "running");
        let output = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(ActionError::ExitStatus {
                command: self.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| ActionError::InvalidOutput {
            command: self.to_string(),
        })
    }

    /// Run to completion with stdout inherited. A non-zero exit is an error.
    pub async fn run(&self) -> Result<(), ActionError> {
        debug!(command = %self, "running");
        let output = self
            .command()
            .stdout(Stdio::inherit())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(ActionError::ExitStatus {
                command: self.to_string(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }

    /// Run to completion and report the exit status without judging it.
    pub async fn status(&self) -> Result<ExitStatus, ActionError> {
        debug!(command = %self, "running");
        self.command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| self.spawn_error(e))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
