use std::{future::Future, io::Error as IoError, pin::Pin, process::Stdio, time::Duration};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command as TokioCommand;
use tracing::warn;

use crate::output::OutputMode;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Command execution error: {0}")]
    Io(#[from] IoError),
    #[error("Command timed out")]
    Timeout,
}

/// What a finished command left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    pub fn ok() -> Self {
        Self {
            success: true,
            code: Some(0),
            ..Self::default()
        }
    }

    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }
}

pub type CommandFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CommandOutput, CommandError>> + Send + 'a>>;

/// Runs shell command lines on behalf of the scheduler.
pub trait CommandRunner: Send + Sync {
    fn run<'a>(&'a self, command: &'a str, timeout: Option<Duration>) -> CommandFuture<'a>;
}

/// Runs commands through `sh -c` (`cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct ShellRunner {
    output_mode: OutputMode,
}

impl ShellRunner {
    pub fn new(output_mode: OutputMode) -> Self {
        Self { output_mode }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(OutputMode::Group)
    }
}

impl CommandRunner for ShellRunner {
    fn run<'a>(&'a self, command: &'a str, timeout: Option<Duration>) -> CommandFuture<'a> {
        Box::pin(async move {
            let stream_output = self.output_mode == OutputMode::Stream;
            let output = run_command_with_timeout(command, timeout, stream_output).await?;

            if !stream_output {
                print_grouped(command, &output).await;
            }

            Ok(output)
        })
    }
}

async fn print_grouped(command: &str, output: &CommandOutput) {
    if output.stdout.is_empty() && output.stderr.is_empty() {
        return;
    }

    let mut out = tokio::io::stdout();
    let header = format!("--- {} ---\n", command);
    let result = async {
        out.write_all(header.as_bytes()).await?;
        out.write_all(&output.stdout).await?;
        out.flush().await?;
        let mut err = tokio::io::stderr();
        err.write_all(&output.stderr).await?;
        err.flush().await
    }
    .await;

    if let Err(e) = result {
        warn!("failed to print output of `{}`: {}", command, e);
    }
}

pub async fn run_command_with_timeout(
    command: &str,
    timeout: Option<Duration>,
    stream_output: bool,
) -> Result<CommandOutput, CommandError> {
    let mut cmd = if cfg!(target_os = "windows") {
        let mut c = TokioCommand::new("cmd");
        c.args(["/C", command]);
        c
    } else {
        let mut c = TokioCommand::new("sh");
        c.args(["-c", command]);
        c
    };

    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let mut child = cmd.spawn()?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();

    let stdout_handle = tokio::spawn(collect_pipe(
        stdout_pipe,
        stream_output.then(tokio::io::stdout),
    ));
    let stderr_handle = tokio::spawn(collect_pipe(
        stderr_pipe,
        stream_output.then(tokio::io::stderr),
    ));

    let status = match timeout {
        Some(duration) => {
            tokio::select! {
                result = child.wait() => result?,
                _ = tokio::time::sleep(duration) => {
                    if let Err(kill_err) = child.kill().await {
                        warn!("Failed to kill timed-out process: {}", kill_err);
                    }
                    let _ = child.wait().await;
                    // Grandchildren may still hold the pipes open.
                    stdout_handle.abort();
                    stderr_handle.abort();
                    return Err(CommandError::Timeout);
                }
            }
        }
        None => child.wait().await?,
    };

    let stdout = join_pipe(stdout_handle).await?;
    let stderr = join_pipe(stderr_handle).await?;

    Ok(CommandOutput {
        success: status.success(),
        code: status.code(),
        stdout,
        stderr,
    })
}

async fn collect_pipe<R, W>(pipe: Option<R>, mut mirror: Option<W>) -> Result<Vec<u8>, CommandError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut collected: Vec<u8> = Vec::new();
    let Some(mut pipe) = pipe else {
        return Ok(collected);
    };

    let mut buf = [0u8; 8192];
    loop {
        let n = pipe.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        collected.extend_from_slice(&buf[..n]);
        if let Some(out) = mirror.as_mut() {
            out.write_all(&buf[..n]).await?;
        }
    }

    if let Some(out) = mirror.as_mut() {
        out.flush().await?;
    }

    Ok(collected)
}

async fn join_pipe(
    handle: tokio::task::JoinHandle<Result<Vec<u8>, CommandError>>,
) -> Result<Vec<u8>, CommandError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(CommandError::Io(IoError::other(e))),
    }
}
