// Shared subprocess plumbing for the extraction backends

use std::io;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::timeout;

use super::errors::EngineError;

/// Run a command to completion with a hard deadline. The child is killed
/// on timeout. Used for probes; downloads run without a whole-job deadline.
pub async fn run_with_deadline(
    program: &str,
    args: &[String],
    deadline: Duration,
) -> Result<std::process::Output, EngineError> {
    let mut child = spawn_piped(program, args)?;

    let mut stdout_pipe = child
        .stdout
        .take()
        .ok_or_else(|| pipe_error("stdout"))?;
    let mut stderr_pipe = child
        .stderr
        .take()
        .ok_or_else(|| pipe_error("stderr"))?;

    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stdout_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr_pipe.read_to_end(&mut buf).await.map(|_| buf)
    });

    match timeout(deadline, child.wait()).await {
        Ok(status) => {
            let status = status?;
            let stdout = stdout_task.await.map_err(join_error)??;
            let stderr = stderr_task.await.map_err(join_error)??;
            Ok(std::process::Output {
                status,
                stdout,
                stderr,
            })
        }
        Err(_) => {
            let _ = child.kill().await;
            stdout_task.abort();
            stderr_task.abort();
            Err(EngineError::Timeout {
                tool: program.to_string(),
                seconds: deadline.as_secs(),
            })
        }
    }
}

/// Run a command to completion with no deadline. Stalls are bounded by the
/// engine's own socket timeout, not by us.
pub async fn run_to_completion(
    program: &str,
    args: &[String],
) -> Result<std::process::Output, EngineError> {
    let child = spawn_piped(program, args)?;
    Ok(child.wait_with_output().await?)
}

fn spawn_piped(program: &str, args: &[String]) -> Result<tokio::process::Child, EngineError> {
    Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EngineError::Spawn {
            tool: program.to_string(),
            source: e,
        })
}

fn pipe_error(which: &str) -> EngineError {
    EngineError::Io(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("could not capture child {}", which),
    ))
}

fn join_error(e: tokio::task::JoinError) -> EngineError {
    EngineError::Io(io::Error::new(io::ErrorKind::Other, e))
}
