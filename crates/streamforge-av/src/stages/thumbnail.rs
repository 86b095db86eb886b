//! Thumbnail stage: one frame of the original source.

use std::path::{Path, PathBuf};
use std::time::Duration;

use streamforge_common::THUMBNAIL_FILE;

use crate::tools::resolve_program;
use crate::{Error, Result, TemplateContext, ToolCommand, Workspace};

use super::ThumbnailerTool;

/// Extract a single frame of `source` into the workspace.
///
/// Returns the path of the written image; publishing it as `thumbnail.jpg`
/// is up to the caller.
pub async fn extract_thumbnail(
    tool: &ThumbnailerTool,
    source: &Path,
    workspace: &Workspace,
    timeout: Duration,
) -> Result<PathBuf> {
    let output = workspace.temp_file(THUMBNAIL_FILE);
    let ctx = TemplateContext::new()
        .with_input(source)
        .with_output(&output)
        .with_workdir(workspace.path())
        .with_var("offset", &tool.offset);

    let mut cmd = ToolCommand::new(resolve_program(&tool.path));
    cmd.current_dir(workspace.path())
        .args(ctx.expand(&tool.args))
        .timeout(timeout);
    cmd.execute().await?;

    if !output.is_file() {
        return Err(Error::missing(THUMBNAIL_FILE));
    }
    Ok(output)
}
