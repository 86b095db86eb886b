//! External tool discovery.
//!
//! Tools are configured by path. A bare name (`ffmpeg`) is looked up on
//! `PATH` with [`which::which`]; anything containing a separator is used as
//! given.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result, ToolCommand};

/// Deadline for `--version` checks.
const VERSION_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Availability information for a tool, returned by [`check_tool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    /// Tool name as configured.
    pub name: String,
    /// Whether the tool was found.
    pub available: bool,
    /// Version string (first non-empty output line), if available.
    pub version: Option<String>,
    /// Resolved path to the executable.
    pub path: Option<PathBuf>,
}

/// Resolve a configured program to the path that will be executed.
///
/// Bare names that cannot be found on `PATH` are returned unchanged; the
/// spawn will then fail with a clear error.
pub fn resolve_program(program: &Path) -> PathBuf {
    if program.components().count() == 1 {
        if let Ok(found) = which::which(program) {
            return found;
        }
    }
    program.to_path_buf()
}

/// Locate a tool, returning [`Error::ToolNotFound`] when it is missing.
pub fn require_tool(program: &Path) -> Result<PathBuf> {
    let resolved = resolve_program(program);
    if resolved.is_file() {
        Ok(resolved)
    } else {
        Err(Error::tool_not_found(program.display().to_string()))
    }
}

/// Check whether a tool is installed and report its version.
///
/// `version_args` is passed to the tool as-is (`["-version"]` for ffmpeg,
/// `["--version"]` for most others). A tool that is present but exits
/// non-zero for the version check is still reported as available without a version.
pub async fn check_tool(program: &Path, version_args: &[&str]) -> ToolInfo {
    let name = program.display().to_string();
    let path = match require_tool(program) {
        Ok(path) => path,
        Err(_) => {
            return ToolInfo {
                name,
                available: false,
                version: None,
                path: None,
            }
        }
    };

    let version = ToolCommand::new(&path)
        .args(version_args.iter().copied())
        .timeout(VERSION_CHECK_TIMEOUT)
        .execute()
        .await
        .ok()
        .and_then(|out| {
            out.stdout
                .lines()
                .chain(out.stderr.lines())
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        });

    ToolInfo {
        name,
        available: true,
        version,
        path: Some(path),
    }
}
