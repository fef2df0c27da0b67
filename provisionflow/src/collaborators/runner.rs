//! Subprocess port used by the CLI-backed collaborators.
//!
//! `TokioCommandRunner` is the production implementation. A spawned child is
//! killed when the run's cancellation token fires, and on drop.

use crate::cancellation::CancellationToken;
use crate::errors::CollaboratorError;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Creates an invocation of `program` with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Appends `flag value` when `value` is present.
    #[must_use]
    pub fn opt(self, flag: &str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.arg(flag).arg(value),
            None => self,
        }
    }

    /// Appends `flag` when `enabled`.
    #[must_use]
    pub fn flag(self, flag: &str, enabled: bool) -> Self {
        if enabled {
            self.arg(flag)
        } else {
            self
        }
    }

    /// Sets the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Returns true if `arg` appears in the argument list.
    #[must_use]
    pub fn has_arg(&self, arg: &str) -> bool {
        self.args.iter().any(|a| a == arg)
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` if the program was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Creates a successful output with the given stdout.
    #[must_use]
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Creates an output with the given exit code and stderr.
    #[must_use]
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Converts a non-zero exit into a collaborator error.
    pub fn check(self, program: &str) -> Result<Self, CollaboratorError> {
        if self.success() {
            Ok(self)
        } else {
            Err(self.into_error(program))
        }
    }

    /// Builds the exit error for this output.
    #[must_use]
    pub fn into_error(self, program: &str) -> CollaboratorError {
        CollaboratorError::Exit {
            program: program.to_string(),
            code: self.code,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// Runs external programs on behalf of collaborators.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `invocation` to completion, or until `cancel` fires.
    ///
    /// A non-zero exit is reported in [`CommandOutput::code`], not as an
    /// error; callers decide which exit codes are meaningful.
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, CollaboratorError>;
}

/// Production `CommandRunner` backed by `tokio::process`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioCommandRunner;

impl TokioCommandRunner {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, CollaboratorError> {
        if cancel.is_cancelled() {
            return Err(CollaboratorError::Cancelled(cancel.reason_or_default()));
        }

        debug!(command = %invocation, "Spawning collaborator");

        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| CollaboratorError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        tokio::select! {
            result = async {
                let (status, stdout, stderr) = tokio::join!(
                    child.wait(),
                    drain(stdout_handle.as_mut(), &invocation.program, "stdout"),
                    drain(stderr_handle.as_mut(), &invocation.program, "stderr"),
                );
                let status = status.map_err(|source| CollaboratorError::Spawn {
                    program: invocation.program.clone(),
                    source,
                })?;
                Ok::<_, CollaboratorError>(CommandOutput {
                    code: status.code(),
                    stdout: String::from_utf8_lossy(&stdout?).into_owned(),
                    stderr: String::from_utf8_lossy(&stderr?).into_owned(),
                })
            } => result,
            () = cancel.cancelled() => {
                if let Err(err) = child.kill().await {
                    warn!(command = %invocation, error = %err, "Failed to kill collaborator");
                }
                debug!(command = %invocation, "Collaborator killed on cancellation");
                Err(CollaboratorError::Cancelled(cancel.reason_or_default()))
            }
        }
    }
}

/// Reads a child's output stream to the end.
async fn drain<R>(handle: Option<&mut R>, program: &str, stream: &str) -> Result<Vec<u8>, CollaboratorError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    if let Some(handle) = handle {
        handle.read_to_end(&mut buf).await.map_err(|err| {
            warn!(program, stream, error = %err, "Failed to read collaborator output");
            CollaboratorError::Output {
                program: program.to_string(),
                message: format!("failed to read {stream}: {err}"),
            }
        })?;
    }
    Ok(buf)
}
