mod compile;
mod executor;
mod process;
mod workspace;

pub use compile::{COMPILATION_FAILED, CompileOutcome, compile};
pub use executor::{RunOutcome, run};
pub use workspace::Workspace;

use std::collections::HashMap;

use crate::registry::LanguageProfile;

/// Generates a concrete command by applying template substitutions
///
/// `%INPUT%` becomes the source path, `%OUTPUT%` the artifact path and
/// `%DIR%` the workspace directory.
pub fn render_command(
    template: &[String],
    workspace: &Workspace,
    profile: &LanguageProfile,
) -> Vec<String> {
    let source_path = workspace.source_path(profile);
    let artifact_path = workspace.artifact_path(profile);
    let source_path = source_path.to_string_lossy();
    let artifact_path = artifact_path.to_string_lossy();
    let dir = workspace.path().to_string_lossy();

    let mut mapping = HashMap::<&str, &str>::new();
    mapping.insert("%INPUT%", &source_path);
    mapping.insert("%OUTPUT%", &artifact_path);
    mapping.insert("%DIR%", &dir);

    apply_template(template, &mapping)
}

fn apply_template(template: &[String], mapping: &HashMap<&str, &str>) -> Vec<String> {
    template
        .iter()
        .map(|s| {
            let mut t = s.clone();
            for (k, v) in mapping.iter() {
                t = t.replace(k, v);
            }
            t
        })
        .collect()
}
