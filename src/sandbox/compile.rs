use std::time::Duration;

use anyhow::Result;

use super::process::{ProcessOutcome, run_process};
use super::{Workspace, render_command};
use crate::registry::LanguageProfile;

/// Marker every compile failure diagnostic starts with
pub const COMPILATION_FAILED: &str = "Compilation failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Success,
    /// Human readable diagnostic, starting with [`COMPILATION_FAILED`]
    Failure(String),
}

/// Compiles the workspace source with the profile's compile command
///
/// Languages without a compile step succeed trivially.
pub async fn compile(
    workspace: &Workspace,
    profile: &LanguageProfile,
    time_limit: Duration,
) -> Result<CompileOutcome> {
    let Some(template) = &profile.compile else {
        return Ok(CompileOutcome::Success);
    };

    let command = render_command(template, workspace, profile);
    log::debug!("Compiling {} submission: {:?}", profile.name, command);

    let outcome = run_process(&command, workspace.path(), None, time_limit).await?;
    let compile_outcome = match outcome {
        ProcessOutcome::Exited {
            status,
            stdout,
            stderr,
            elapsed,
        } => {
            log::debug!("Compiler exited with {status} after {elapsed:?}");
            let diagnostic = join_diagnostic(&stderr, &stdout);

            if !status.success() {
                let reason = match status.code() {
                    Some(code) => format!("compiler exited with code {code}"),
                    None => "compiler was terminated by a signal".to_string(),
                };
                CompileOutcome::Failure(format!("{COMPILATION_FAILED} ({reason}):\n{diagnostic}"))
            } else if !workspace.artifact_path(profile).exists() {
                CompileOutcome::Failure(format!(
                    "{COMPILATION_FAILED} (compiler produced no `{}`):\n{diagnostic}",
                    profile.executable
                ))
            } else {
                CompileOutcome::Success
            }
        }
        ProcessOutcome::TimedOut { elapsed } => CompileOutcome::Failure(format!(
            "{COMPILATION_FAILED} (compiler exceeded the {} ms limit after {} ms)",
            time_limit.as_millis(),
            elapsed.as_millis()
        )),
    };

    Ok(compile_outcome)
}

fn join_diagnostic(stderr: &str, stdout: &str) -> String {
    match (stderr.trim_end().is_empty(), stdout.trim_end().is_empty()) {
        (false, false) => format!("{}\n{}", stderr.trim_end(), stdout.trim_end()),
        (false, true) => stderr.trim_end().to_string(),
        (true, false) => stdout.trim_end().to_string(),
        (true, true) => String::new(),
    }
}
