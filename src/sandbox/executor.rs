use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use anyhow::Result;

use super::process::{ProcessOutcome, run_process};
use super::{Workspace, render_command};
use crate::registry::LanguageProfile;

/// Outcome of running the submission once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program exited with status 0
    Completed { stdout: String, stderr: String },
    /// The program did not finish in time and was killed
    TimedOut,
    /// The program exited with a non-zero status or was killed by a signal
    Crashed {
        exit_code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
    },
}

/// Runs the prepared submission once with `input` on stdin
pub async fn run(
    workspace: &Workspace,
    profile: &LanguageProfile,
    input: &str,
    time_limit: Duration,
) -> Result<RunOutcome> {
    let command = render_command(&profile.run, workspace, profile);

    let outcome = run_process(&command, workspace.path(), Some(input), time_limit).await?;
    let run_outcome = match outcome {
        ProcessOutcome::Exited {
            status,
            stdout,
            stderr,
            elapsed,
        } => {
            log::debug!("Program exited with {status} after {elapsed:?}");
            if status.success() {
                RunOutcome::Completed { stdout, stderr }
            } else {
                RunOutcome::Crashed {
                    exit_code: status.code(),
                    signal: status.signal(),
                    stdout,
                    stderr,
                }
            }
        }
        ProcessOutcome::TimedOut { elapsed } => {
            log::debug!("Program killed after {elapsed:?}");
            RunOutcome::TimedOut
        }
    };

    Ok(run_outcome)
}
