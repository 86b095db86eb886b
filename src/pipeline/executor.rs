use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use streamforge_av::stages::{extract_thumbnail, fragment, package};
use streamforge_av::workspace::sweep_stale;
use streamforge_av::{BitrateLadder, FragmenterTool, PackagerTool, ThumbnailerTool, Workspace};
use streamforge_common::{MANIFEST_FILE, THUMBNAIL_FILE};

use super::{FailureCause, PipelineError, PipelineReport, RunState, Stage, ThumbnailStatus};
use crate::config::{Config, TimeoutsConfig};

/// State callback type
pub type StateCallback = Arc<dyn Fn(RunState) + Send + Sync>;

/// Runs the Fragment, Package and Thumbnail stages for one source.
///
/// Tool paths, argument templates, the ladder and the deadlines are fixed at
/// construction; a run only takes the source file and the target directory.
#[derive(Clone)]
pub struct SegmentationPipeline {
    fragmenter: FragmenterTool,
    packager: PackagerTool,
    thumbnailer: ThumbnailerTool,
    ladder: BitrateLadder,
    timeouts: TimeoutsConfig,
    state_callback: Option<StateCallback>,
}

impl SegmentationPipeline {
    pub fn new(config: &Config) -> Self {
        Self {
            fragmenter: config.tools.fragmenter.clone(),
            packager: config.tools.packager.clone(),
            thumbnailer: config.tools.thumbnailer.clone(),
            ladder: config.ladder.clone(),
            timeouts: config.timeouts.clone(),
            state_callback: None,
        }
    }

    pub fn with_state_callback(mut self, callback: StateCallback) -> Self {
        self.state_callback = Some(callback);
        self
    }

    pub fn ladder(&self) -> &BitrateLadder {
        &self.ladder
    }

    fn report_state(&self, state: RunState) {
        if let Some(ref cb) = self.state_callback {
            cb(state);
        }
        tracing::debug!(?state, "Pipeline state");
    }

    fn fail(&self, stage: Stage, cause: impl Into<FailureCause>) -> PipelineError {
        let err = PipelineError::new(stage, cause);
        tracing::error!(stage = %stage, "Pipeline failed: {}", err.cause);
        self.report_state(RunState::Failed);
        err
    }

    /// Run all stages for `source`, publishing into `target`.
    ///
    /// `target` must exist. Any `stream.mpd` already in it is removed before
    /// the first stage starts and a new one appears only after every file it
    /// references is in place, so a failed run never leaves a servable
    /// manifest behind.
    pub async fn run(&self, source: &Path, target: &Path) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        self.report_state(RunState::Pending);

        let workspace = self
            .prepare(target)
            .map_err(|cause| self.fail(Stage::Fragment, cause))?;

        // Fragment
        self.report_state(RunState::Fragmenting);
        let stage_started = Instant::now();
        tracing::info!(source = ?source, renditions = self.ladder.len(), "Fragmenting");
        let fragments = fragment(
            &self.fragmenter,
            &self.ladder,
            source,
            &workspace,
            self.timeouts.fragment(),
        )
        .await
        .map_err(|e| self.fail(Stage::Fragment, e))?;
        tracing::info!(elapsed = ?stage_started.elapsed(), "Fragment stage finished");

        // Package
        self.report_state(RunState::Packaging);
        let stage_started = Instant::now();
        tracing::info!(inputs = fragments.all().len(), "Packaging");
        let check = package(
            &self.packager,
            &fragments.all(),
            &workspace,
            self.timeouts.package(),
        )
        .await
        .map_err(|e| self.fail(Stage::Package, e))?;
        let manifest = workspace
            .publish_staging()
            .map_err(|e| self.fail(Stage::Package, e))?;
        tracing::info!(
            elapsed = ?stage_started.elapsed(),
            references = check.checked.len(),
            "Package stage finished, manifest published"
        );

        // Thumbnail
        self.report_state(RunState::ThumbnailExtraction);
        let thumbnail = self.thumbnail(source, &workspace).await;

        workspace.cleanup();
        self.report_state(RunState::Complete);

        let elapsed = started.elapsed();
        tracing::info!(elapsed = ?elapsed, "Pipeline complete");

        Ok(PipelineReport {
            manifest,
            verified_references: check.checked.len(),
            thumbnail,
            elapsed,
        })
    }

    fn prepare(&self, target: &Path) -> Result<Workspace, FailureCause> {
        if !target.is_dir() {
            return Err(FailureCause::Io(format!(
                "target directory does not exist: {}",
                target.display()
            )));
        }

        match std::fs::remove_file(target.join(MANIFEST_FILE)) {
            Ok(()) => tracing::debug!("Removed previous manifest"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match sweep_stale(target) {
            Ok(0) => {}
            Ok(n) => tracing::debug!("Removed {} stale workspace(s)", n),
            Err(e) => tracing::warn!("Failed to sweep stale workspaces: {}", e),
        }

        Ok(Workspace::new_in(target)?)
    }

    async fn thumbnail(&self, source: &Path, workspace: &Workspace) -> ThumbnailStatus {
        let stage_started = Instant::now();
        let result = match extract_thumbnail(
            &self.thumbnailer,
            source,
            workspace,
            self.timeouts.thumbnail(),
        )
        .await
        {
            Ok(frame) => workspace.publish_file(&frame, THUMBNAIL_FILE),
            Err(e) => Err(e),
        };

        match result {
            Ok(path) => {
                tracing::info!(elapsed = ?stage_started.elapsed(), "Thumbnail stage finished");
                ThumbnailStatus::Extracted(path)
            }
            Err(e) => {
                let cause = FailureCause::from(e);
                tracing::warn!(
                    stage = %Stage::Thumbnail,
                    "Thumbnail failed, continuing: {}",
                    cause
                );
                remove_stale_thumbnail(workspace.target());
                ThumbnailStatus::SoftFailure(cause.to_string())
            }
        }
    }
}

impl std::fmt::Debug for SegmentationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentationPipeline")
            .field("fragmenter", &self.fragmenter.path)
            .field("packager", &self.packager.path)
            .field("thumbnailer", &self.thumbnailer.path)
            .field("ladder_version", &self.ladder.version)
            .finish()
    }
}

/// An older thumbnail no longer matches the new rendition set.
fn remove_stale_thumbnail(target: &Path) {
    let path = target.join(THUMBNAIL_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => tracing::debug!("Removed previous thumbnail"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?path, "Failed to remove previous thumbnail: {}", e),
    }
}
