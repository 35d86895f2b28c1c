use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Upper bound on captured bytes per stream
const OUTPUT_LIMIT: u64 = 64 * 1024 * 1024;

/// How long to keep draining pipes after the process itself has exited
const OUTPUT_GRACE: Duration = Duration::from_millis(500);

/// Result of one bounded process execution
#[derive(Debug)]
pub(crate) enum ProcessOutcome {
    Exited {
        status: ExitStatus,
        stdout: String,
        stderr: String,
        elapsed: Duration,
    },
    TimedOut {
        elapsed: Duration,
    },
}

/// Sends SIGKILL to a whole process group, at the latest when dropped
struct ProcessGroupGuard {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroupGuard {
    fn kill(&mut self) {
        if let Some(pgid) = self.pgid.take() {
            // SAFETY: kill(2) has no memory-safety preconditions
            let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
            if rc == 0 {
                log::debug!("Killed process group {pgid}");
            }
        }
    }
}

impl Drop for ProcessGroupGuard {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Runs `command` in `cwd` with `input` on stdin, bounded by `limit`
///
/// The child is placed in a fresh process group. Once the child exits or the
/// limit elapses, every process left in that group is killed, so neither the
/// child nor anything it forked outlives this call.
pub(crate) async fn run_process(
    command: &[String],
    cwd: &Path,
    input: Option<&str>,
    limit: Duration,
) -> Result<ProcessOutcome> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| anyhow!("Empty command"))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .process_group(0);

    let start_time = Instant::now();
    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn `{program}`"))?;
    let mut group = ProcessGroupGuard {
        pgid: child.id().map(|id| id as libc::pid_t),
    };

    let stdin_task = match (child.stdin.take(), input) {
        (Some(mut stdin), Some(input)) => {
            let input = input.to_owned();
            Some(tokio::spawn(async move {
                // The program may exit without reading its input
                if let Err(e) = stdin.write_all(input.as_bytes()).await {
                    log::debug!("Writing stdin stopped early: {e}");
                }
                let _ = stdin.shutdown().await;
            }))
        }
        _ => None,
    };
    let stdout_task = child.stdout.take().map(|s| tokio::spawn(read_capped(s)));
    let stderr_task = child.stderr.take().map(|s| tokio::spawn(read_capped(s)));

    let waited = timeout(limit, child.wait()).await;
    let elapsed = start_time.elapsed();
    group.kill();

    let outcome = match waited {
        Ok(status) => {
            let status = status.context("Failed to wait for child process")?;
            ProcessOutcome::Exited {
                status,
                stdout: collect_output(stdout_task).await,
                stderr: collect_output(stderr_task).await,
                elapsed,
            }
        }
        Err(_) => {
            // The group is already signalled, reap the direct child
            if let Err(e) = child.kill().await {
                log::warn!("Failed to reap timed out process: {e}");
            }
            for task in [stdout_task, stderr_task].into_iter().flatten() {
                task.abort();
            }
            ProcessOutcome::TimedOut { elapsed }
        }
    };

    if let Some(task) = stdin_task {
        task.abort();
    }

    Ok(outcome)
}

async fn read_capped<R: AsyncRead + Unpin>(reader: R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader.take(OUTPUT_LIMIT).read_to_end(&mut buf).await?;
    Ok(buf)
}

async fn collect_output(task: Option<JoinHandle<std::io::Result<Vec<u8>>>>) -> String {
    let Some(mut task) = task else {
        return String::new();
    };

    match timeout(OUTPUT_GRACE, &mut task).await {
        Ok(Ok(Ok(bytes))) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Ok(Err(e))) => {
            log::warn!("Failed to read process output: {e}");
            String::new()
        }
        Ok(Err(e)) => {
            log::warn!("Output reader task failed: {e}");
            String::new()
        }
        Err(_) => {
            task.abort();
            log::warn!("Output pipe still open after the process exited");
            String::new()
        }
    }
}
