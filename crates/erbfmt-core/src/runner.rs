//! Running the formatter process
//!
//! One child per call: input goes to stdin, stdout and stderr are drained
//! into separate buffers, and all three pipes are serviced concurrently so
//! a child that fills its output pipe before reading all input cannot
//! deadlock us. The exit status is only collected after both output streams
//! reached EOF.
//!
//! The child is spawned with `kill_on_drop`, so dropping the future returned
//! by [`run`] (cancellation, timeout) terminates the process.

use std::io;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};

use crate::error::FormatError;
use crate::invocation::Invocation;
use crate::platform::Platform;

/// `cmd.exe` exit code for "is not recognized as an internal or external command"
const CMD_NOT_FOUND: i32 = 9009;

/// Raw result of one formatter process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Stderr as text, for diagnostics
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim_end().to_string()
    }

    /// The formatted text, or the failure the exit status describes
    ///
    /// Stdout of a failed process is discarded, never returned.
    pub fn into_stdout(self) -> Result<String, FormatError> {
        match self.exit_code {
            Some(0) => String::from_utf8(self.stdout).map_err(FormatError::InvalidOutput),
            Some(code) => Err(FormatError::NonZeroExit {
                code,
                stderr: self.stderr_text(),
            }),
            None => Err(FormatError::SignalTerminated {
                stderr: self.stderr_text(),
            }),
        }
    }
}

/// Program and arguments actually handed to the OS
///
/// Native Windows cannot spawn an extensionless script wrapper directly,
/// so such executables go through `cmd /C`.
pub fn program_and_args(invocation: &Invocation, platform: Platform) -> (String, Vec<String>) {
    if needs_shell(&invocation.executable, platform) {
        let mut args = Vec::with_capacity(invocation.args.len() + 2);
        args.push("/C".to_string());
        args.push(invocation.executable.clone());
        args.extend(invocation.args.iter().cloned());
        ("cmd".to_string(), args)
    } else {
        (invocation.executable.clone(), invocation.args.clone())
    }
}

fn needs_shell(executable: &str, platform: Platform) -> bool {
    platform.is_native_windows() && Path::new(executable).extension().is_none()
}

/// Spawn the formatter, feed it `input` and collect its output
pub async fn run(
    invocation: &Invocation,
    input: &[u8],
    platform: Platform,
) -> Result<RunResult, FormatError> {
    let (program, args) = program_and_args(invocation, platform);
    let through_shell = program != invocation.executable;

    let mut command = Command::new(&program);
    command
        .args(&args)
        .envs(&invocation.env)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(cwd) = &invocation.cwd {
        command.current_dir(cwd);
    }

    let mut child = command
        .spawn()
        .map_err(|source| spawn_error(&invocation.executable, source))?;

    let stdin = child
        .stdin
        .take()
        .ok_or(FormatError::ProcessIoUnavailable("stdin"))?;
    let stdout = child
        .stdout
        .take()
        .ok_or(FormatError::ProcessIoUnavailable("stdout"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or(FormatError::ProcessIoUnavailable("stderr"))?;

    let (_, stdout, stderr) = tokio::try_join!(
        write_input(stdin, input),
        drain(stdout, "stdout"),
        drain(stderr, "stderr"),
    )?;

    let status = child.wait().await.map_err(|source| FormatError::StreamIo {
        stream: "exit status",
        source,
    })?;

    let result = RunResult {
        stdout,
        stderr,
        exit_code: status.code(),
    };

    if through_shell && result.exit_code == Some(CMD_NOT_FOUND) {
        return Err(FormatError::SpawnNotFound {
            executable: invocation.executable.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, result.stderr_text()),
        });
    }

    Ok(result)
}

fn spawn_error(executable: &str, source: io::Error) -> FormatError {
    let executable = executable.to_string();
    if source.kind() == io::ErrorKind::NotFound {
        FormatError::SpawnNotFound { executable, source }
    } else {
        FormatError::SpawnFailed { executable, source }
    }
}

/// Write all input, then close stdin so the child sees EOF
async fn write_input(mut stdin: ChildStdin, input: &[u8]) -> Result<(), FormatError> {
    match stdin.write_all(input).await {
        Ok(()) => {}
        // The child stopped reading; its exit status tells what happened
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(source) => {
            return Err(FormatError::StreamIo {
                stream: "stdin",
                source,
            })
        }
    }
    drop(stdin);
    Ok(())
}

async fn drain<R>(mut reader: R, stream: &'static str) -> Result<Vec<u8>, FormatError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .await
        .map_err(|source| FormatError::StreamIo { stream, source })?;
    Ok(buf)
}
