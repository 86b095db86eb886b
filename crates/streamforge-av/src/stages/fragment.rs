//! Fragment stage: source container to fragmented MP4 inputs for the packager.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::tools::resolve_program;
use crate::{BitrateLadder, Error, Result, TemplateContext, ToolCommand, Workspace};

use super::FragmenterTool;

/// Files written by the fragment stage, all inside the workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentOutputs {
    /// One fragmented file per ladder rung, in ladder order.
    pub renditions: Vec<PathBuf>,
    /// Audio-only fragmented file, when audio output is configured.
    pub audio: Option<PathBuf>,
}

impl FragmentOutputs {
    /// All outputs in the order they are handed to the packager.
    pub fn all(&self) -> Vec<PathBuf> {
        let mut all = self.renditions.clone();
        all.extend(self.audio.iter().cloned());
        all
    }
}

fn rendition_file(name: &str) -> String {
    format!("frag-{name}.mp4")
}

const AUDIO_FILE: &str = "frag-audio.mp4";

/// Build the single fragmenter invocation for `source`.
///
/// The source is decoded once; every rendition and the audio track are
/// separate outputs of the same process.
pub(crate) fn build_command(
    tool: &FragmenterTool,
    ladder: &BitrateLadder,
    source: &Path,
    workspace: &Workspace,
) -> (ToolCommand, FragmentOutputs) {
    let base = TemplateContext::new()
        .with_input(source)
        .with_workdir(workspace.path());

    let mut cmd = ToolCommand::new(resolve_program(&tool.path));
    cmd.current_dir(workspace.path());
    cmd.args(base.expand(&tool.input_args));

    let mut outputs = FragmentOutputs::default();
    for rendition in ladder.iter() {
        let output = workspace.temp_file(&rendition_file(&rendition.name));
        let ctx = base.clone().with_rendition(rendition).with_output(&output);
        cmd.args(ctx.expand(&tool.rendition_args));
        outputs.renditions.push(output);
    }

    if !tool.audio_args.is_empty() {
        let output = workspace.temp_file(AUDIO_FILE);
        let ctx = base.with_output(&output);
        cmd.args(ctx.expand(&tool.audio_args));
        outputs.audio = Some(output);
    }

    (cmd, outputs)
}

/// Run the fragmenter and confirm that every expected output was written.
pub async fn fragment(
    tool: &FragmenterTool,
    ladder: &BitrateLadder,
    source: &Path,
    workspace: &Workspace,
    timeout: Duration,
) -> Result<FragmentOutputs> {
    if !source.is_file() {
        return Err(Error::InvalidInput(format!(
            "source not found: {}",
            source.display()
        )));
    }

    let (mut cmd, outputs) = build_command(tool, ladder, source, workspace);
    cmd.timeout(timeout);
    let output = cmd.execute().await?;
    tracing::debug!(
        elapsed_ms = output.elapsed.as_millis() as u64,
        "Fragmenter stderr: {}",
        output.stderr.trim()
    );

    let missing: Vec<String> = outputs
        .all()
        .iter()
        .filter(|p| !p.is_file())
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    if !missing.is_empty() {
        return Err(Error::PartialOutput { missing });
    }

    Ok(outputs)
}
