//! Package stage: fragmented inputs to a DASH manifest and segment trees.

use std::path::{Path, PathBuf};
use std::time::Duration;

use streamforge_common::MANIFEST_FILE;

use crate::manifest::{verify_manifest, ManifestCheck};
use crate::tools::resolve_program;
use crate::{Error, Result, TemplateContext, ToolCommand, Workspace};

use super::PackagerTool;

pub(crate) fn build_command(
    tool: &PackagerTool,
    inputs: &[PathBuf],
    workspace: &Workspace,
) -> ToolCommand {
    let ctx = TemplateContext::new()
        .with_output_dir(&workspace.staging_dir())
        .with_workdir(workspace.path())
        .with_inputs(inputs);

    let mut cmd = ToolCommand::new(resolve_program(&tool.path));
    cmd.current_dir(workspace.path());
    cmd.args(ctx.expand(&tool.args));
    cmd
}

/// Run the packager into the workspace staging directory and verify its output.
///
/// Nothing is published here. On success the staging directory holds
/// `stream.mpd` and every file it references; anything less is
/// [`Error::PartialOutput`] even when the packager exited 0.
pub async fn package(
    tool: &PackagerTool,
    inputs: &[PathBuf],
    workspace: &Workspace,
    timeout: Duration,
) -> Result<ManifestCheck> {
    if inputs.is_empty() {
        return Err(Error::InvalidInput("no fragmented inputs to package".into()));
    }

    let mut cmd = build_command(tool, inputs, workspace);
    cmd.timeout(timeout);
    let output = cmd.execute().await?;
    tracing::debug!(
        elapsed_ms = output.elapsed.as_millis() as u64,
        "Packager output: {}",
        output.stdout.trim()
    );

    verify_staging(&workspace.staging_dir())
}

fn verify_staging(staging: &Path) -> Result<ManifestCheck> {
    let manifest = staging.join(MANIFEST_FILE);
    if !manifest.is_file() {
        return Err(Error::missing(MANIFEST_FILE));
    }

    let check = verify_manifest(&manifest)?;
    if !check.is_complete() {
        return Err(Error::PartialOutput {
            missing: check.missing,
        });
    }
    Ok(check)
}
