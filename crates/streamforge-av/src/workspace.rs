//! Per-run workspace with manifest-last publishing.

use crate::{Error, Result};
use std::path::{Path, PathBuf};
use streamforge_common::MANIFEST_FILE;
use tempfile::TempDir;

/// Prefix of workspace directories inside a target directory.
pub const WORKSPACE_PREFIX: &str = ".work-";

/// Name of the packager output directory inside the workspace.
const STAGING_DIR: &str = "dash";

/// Scratch space for one pipeline run.
///
/// The temp directory is created *inside* the target directory so that
/// publishing is a set of same-filesystem renames. Everything left in the
/// workspace (fragmented intermediates, unpublished staging output) is
/// deleted when the workspace is dropped.
///
/// # Example
///
/// ```no_run
/// use streamforge_av::Workspace;
///
/// let workspace = Workspace::new_in("/videos/7/42")?;
/// // packager writes into workspace.staging_dir()
/// workspace.publish_staging()?;
/// # Ok::<(), streamforge_av::Error>(())
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    target: PathBuf,
}

impl Workspace {
    /// Create a new workspace inside `target`, which must already exist.
    pub fn new_in<P: AsRef<Path>>(target: P) -> Result<Self> {
        let target = target.as_ref().to_path_buf();
        let temp_dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir_in(&target)
            .map_err(|e| {
                Error::Workspace(format!("Failed to create workspace in {:?}: {}", target, e))
            })?;

        Ok(Self { temp_dir, target })
    }

    /// Get the temp directory path.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// The directory results are published into.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Create a temp file path with the given name.
    pub fn temp_file(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    /// Directory the packager writes its output into.
    pub fn staging_dir(&self) -> PathBuf {
        self.temp_dir.path().join(STAGING_DIR)
    }

    /// Move the packager output into the target directory, manifest last.
    ///
    /// Every top-level entry of the staging directory except the manifest
    /// replaces the same-named entry in the target. Only after all of them are
    /// in place is `stream.mpd` renamed over, so a reader that can see the
    /// manifest can see every file it references.
    pub fn publish_staging(&self) -> Result<PathBuf> {
        let staging = self.staging_dir();
        let staged_manifest = staging.join(MANIFEST_FILE);
        if !staged_manifest.is_file() {
            return Err(Error::missing(MANIFEST_FILE));
        }

        for entry in std::fs::read_dir(&staging)? {
            let entry = entry?;
            if entry.file_name() == MANIFEST_FILE {
                continue;
            }
            let dest = self.target.join(entry.file_name());
            replace_entry(&entry.path(), &dest)?;
        }

        let manifest = self.target.join(MANIFEST_FILE);
        std::fs::rename(&staged_manifest, &manifest).map_err(|e| {
            Error::Workspace(format!("Failed to publish manifest: {}", e))
        })?;

        Ok(manifest)
    }

    /// Move a single workspace file into the target under `name`.
    pub fn publish_file(&self, file: &Path, name: &str) -> Result<PathBuf> {
        if !file.is_file() {
            return Err(Error::missing(file.display().to_string()));
        }
        let dest = self.target.join(name);
        replace_entry(file, &dest)?;
        Ok(dest)
    }

    /// Clean up without publishing anything further.
    pub fn cleanup(self) {
        // TempDir removes itself on drop.
        drop(self.temp_dir);
    }
}

fn replace_entry(src: &Path, dest: &Path) -> Result<()> {
    match std::fs::symlink_metadata(dest) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(dest)?,
        Ok(_) => std::fs::remove_file(dest)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::fs::rename(src, dest).map_err(|e| {
        Error::Workspace(format!("Failed to move {:?} to {:?}: {}", src, dest, e))
    })
}

/// Remove workspaces left behind by runs that never finished (crash, kill -9).
pub fn sweep_stale(target: &Path) -> Result<usize> {
    let mut removed = 0;
    let entries = match std::fs::read_dir(target) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let is_workspace = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.starts_with(WORKSPACE_PREFIX));
        if is_workspace && entry.file_type()?.is_dir() {
            std::fs::remove_dir_all(entry.path())?;
            removed += 1;
        }
    }
    Ok(removed)
}
