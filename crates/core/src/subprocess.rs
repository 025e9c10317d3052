//! Shared subprocess execution for the local media executors.
//!
//! [`run_command`] is the single place that spawns external tools (ffmpeg,
//! the headless browser, yt-dlp). Callers build a [`tokio::process::Command`]
//! and hand it over together with a timeout.

use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// Maximum stdout or stderr size captured per stream (10 MiB).
const MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Number of trailing stderr characters kept in error messages.
const STDERR_TAIL_CHARS: usize = 2_000;

#[derive(Debug, thiserror::Error)]
pub enum SubprocessError {
    #[error("{program} not found: {source}")]
    NotFound {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {elapsed_ms}ms")]
    Timeout { program: String, elapsed_ms: u64 },

    #[error("I/O error running {program}: {source}")]
    Io {
        program: String,
        source: std::io::Error,
    },
}

/// Captured result of a finished process.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub duration_ms: u64,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Tail of stderr, suitable for an error message.
    pub fn stderr_tail(&self) -> String {
        tail(&self.stderr, STDERR_TAIL_CHARS)
    }
}

/// Spawn `cmd`, capture its output, and enforce `timeout`.
///
/// A non-zero exit is not an error at this level; callers inspect
/// [`CommandOutput::exit_code`] and wrap it in their own error type.
pub async fn run_command(
    cmd: &mut Command,
    timeout: Duration,
) -> Result<CommandOutput, SubprocessError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();

    // The child is killed if dropped, which is what happens on timeout.
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let start = Instant::now();

    let mut child = cmd.spawn().map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SubprocessError::NotFound {
                program: program.clone(),
                source,
            }
        } else {
            SubprocessError::Io {
                program: program.clone(),
                source,
            }
        }
    })?;

    // Read both pipes in their own tasks so `child.wait()` can borrow the
    // child mutably and a chatty process never blocks on a full pipe.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_task = tokio::spawn(async move { read_stream(stdout_handle).await });
    let stderr_task = tokio::spawn(async move { read_stream(stderr_handle).await });

    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => {
            let duration_ms = start.elapsed().as_millis() as u64;
            let stdout_bytes = stdout_task.await.unwrap_or_default();
            let stderr_bytes = stderr_task.await.unwrap_or_default();
            let output = CommandOutput {
                stdout: String::from_utf8_lossy(&stdout_bytes).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_bytes).into_owned(),
                exit_code: status.code().unwrap_or(-1),
                duration_ms,
            };
            tracing::debug!(
                program = %program,
                exit_code = output.exit_code,
                duration_ms,
                "Subprocess finished",
            );
            Ok(output)
        }
        Ok(Err(source)) => Err(SubprocessError::Io { program, source }),
        Err(_elapsed) => {
            let elapsed_ms = start.elapsed().as_millis() as u64;
            tracing::warn!(program = %program, elapsed_ms, "Subprocess timed out, killing");
            Err(SubprocessError::Timeout {
                program,
                elapsed_ms,
            })
        }
    }
}

/// Whether `program` can be started and exits cleanly with `args`.
///
/// Used as a cheap presence probe (`ffmpeg -version` and the like).
pub async fn probe(program: &str, args: &[&str], timeout: Duration) -> bool {
    let mut cmd = Command::new(program);
    cmd.args(args);
    match run_command(&mut cmd, timeout).await {
        Ok(output) => output.success(),
        Err(e) => {
            tracing::debug!(program, error = %e, "Tool probe failed");
            false
        }
    }
}

/// Read an entire output stream into a byte buffer, capped at [`MAX_OUTPUT_BYTES`].
async fn read_stream<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = (&mut h)
            .take(MAX_OUTPUT_BYTES as u64)
            .read_to_end(&mut buf)
            .await;
    }
    buf
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.trim().to_string();
    }
    text.chars().skip(count - max_chars).collect::<String>().trim().to_string()
}
