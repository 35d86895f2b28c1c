use std::fs;
use std::io::ErrorKind;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, bail};
use chrono::Local;

use crate::registry::LanguageProfile;

const MAX_ACQUIRE_ATTEMPTS: u32 = 16;

// Workspaces need to be removable even if a submission locked them down
const WORKSPACE_DIR_PERMISSIONS: u32 = 0o700;

static WORKSPACE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A private directory owned by a single evaluation
///
/// The directory is removed exactly once: by [`Workspace::release`], or when
/// the guard is dropped on any other exit path.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    /// Creates a fresh, uniquely named directory below `root`
    pub fn acquire(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("Failed to create workspace root {}", root.display()))?;

        for _ in 0..MAX_ACQUIRE_ATTEMPTS {
            let name = format!(
                "{}-{}-{}",
                Local::now().format("%y%m%d-%H%M%S"),
                std::process::id(),
                WORKSPACE_COUNTER.fetch_add(1, Ordering::Relaxed)
            );
            let dir = root.join(name);

            match fs::create_dir(&dir) {
                Ok(()) => {
                    // Guard first so a failure below still removes the directory
                    let workspace = Self {
                        dir,
                        released: false,
                    };
                    fs::set_permissions(
                        &workspace.dir,
                        fs::Permissions::from_mode(WORKSPACE_DIR_PERMISSIONS),
                    )?;
                    log::debug!("Workspace {} acquired", workspace.dir.display());
                    return Ok(workspace);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to create workspace {}", dir.display()));
                }
            }
        }

        bail!(
            "Could not find a free workspace name in {} after {MAX_ACQUIRE_ATTEMPTS} attempts",
            root.display()
        )
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn source_path(&self, profile: &LanguageProfile) -> PathBuf {
        self.dir.join(&profile.file_name)
    }

    pub fn artifact_path(&self, profile: &LanguageProfile) -> PathBuf {
        self.dir.join(&profile.executable)
    }

    /// Writes the submission verbatim to the profile's source file
    pub fn write_source(&self, profile: &LanguageProfile, source_code: &str) -> Result<PathBuf> {
        let source_path = self.source_path(profile);
        fs::write(&source_path, source_code)
            .with_context(|| format!("Failed to write source to {}", source_path.display()))?;
        Ok(source_path)
    }

    /// Deletes the workspace and everything in it
    pub fn release(mut self) {
        self.remove();
    }

    fn remove(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        match remove_tree(&self.dir) {
            Ok(()) => log::debug!("Workspace {} released", self.dir.display()),
            Err(e) => log::error!("Failed to remove workspace {}: {e}", self.dir.display()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.remove();
    }
}

/// Removes a directory tree, tolerating a missing tree and read-only entries
fn remove_tree(dir: &Path) -> std::io::Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => {
            log::warn!("Retrying removal of {} after: {e}", dir.display());
            make_writable(dir);
            match fs::remove_dir_all(dir) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            }
        }
    }
}

fn make_writable(dir: &Path) {
    let _ = fs::set_permissions(dir, fs::Permissions::from_mode(WORKSPACE_DIR_PERMISSIONS));
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let is_dir = entry
            .file_type()
            .map(|t| t.is_dir())
            .unwrap_or(false);
        if is_dir {
            make_writable(&entry.path());
        }
    }
}
