//! Run coordination: one run per video at a time, a bounded number of runs
//! overall, and rollback of failed runs.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::Instrument;

use streamforge_common::{Error, OwnerId, StorageLayout, VideoDir, VideoId};

use super::{FailureCause, PipelineError, PipelineReport, SegmentationPipeline, Stage};
use crate::config::Config;
use crate::store::{VideoStatus, VideoStore};

type RunKey = (OwnerId, VideoId);

/// Exclusive claim on one video directory.
///
/// Held from the moment an upload is accepted until its pipeline run
/// finishes; dropping it releases the claim.
#[derive(Debug)]
pub struct RunGuard {
    key: RunKey,
    in_flight: Arc<DashMap<RunKey, ()>>,
}

impl RunGuard {
    pub fn owner(&self) -> OwnerId {
        self.key.0
    }

    pub fn video(&self) -> VideoId {
        self.key.1
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight.remove(&self.key);
    }
}

/// Starts pipeline runs and applies the failure policy.
#[derive(Clone)]
pub struct PipelineRunner {
    pipeline: Arc<SegmentationPipeline>,
    layout: StorageLayout,
    store: Arc<dyn VideoStore>,
    in_flight: Arc<DashMap<RunKey, ()>>,
    permits: Arc<Semaphore>,
    cleanup_on_failure: bool,
}

impl PipelineRunner {
    pub fn new(config: &Config, layout: StorageLayout, store: Arc<dyn VideoStore>) -> Self {
        Self::with_pipeline(SegmentationPipeline::new(config), config, layout, store)
    }

    pub fn with_pipeline(
        pipeline: SegmentationPipeline,
        config: &Config,
        layout: StorageLayout,
        store: Arc<dyn VideoStore>,
    ) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            layout,
            store,
            in_flight: Arc::new(DashMap::new()),
            permits: Arc::new(Semaphore::new(config.pipeline.max_concurrent_runs)),
            cleanup_on_failure: config.pipeline.cleanup_on_failure,
        }
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    /// Claim `(owner, video)` for a new run.
    ///
    /// Fails with [`Error::Conflict`] while another run holds the claim.
    pub fn claim(&self, owner: OwnerId, video: VideoId) -> Result<RunGuard, Error> {
        let key = (owner, video);
        match self.in_flight.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(Error::conflict(format!(
                "a pipeline run for {owner}/{video} is already in progress"
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(());
                Ok(RunGuard {
                    key,
                    in_flight: Arc::clone(&self.in_flight),
                })
            }
        }
    }

    pub fn is_running(&self, owner: OwnerId, video: VideoId) -> bool {
        self.in_flight.contains_key(&(owner, video))
    }

    /// Run the pipeline for a claimed video and wait for the outcome.
    pub async fn run(
        &self,
        guard: RunGuard,
        source: PathBuf,
    ) -> Result<PipelineReport, PipelineError> {
        let dir = self.layout.resolve(guard.owner(), guard.video());
        let span = tracing::info_span!(
            "pipeline",
            owner = %guard.owner(),
            video = %guard.video()
        );
        self.run_claimed(guard, source, dir).instrument(span).await
    }

    /// Run the pipeline on a background task.
    pub fn spawn(
        &self,
        guard: RunGuard,
        source: PathBuf,
    ) -> JoinHandle<Result<PipelineReport, PipelineError>> {
        let runner = self.clone();
        tokio::spawn(async move { runner.run(guard, source).await })
    }

    async fn run_claimed(
        &self,
        guard: RunGuard,
        source: PathBuf,
        dir: VideoDir,
    ) -> Result<PipelineReport, PipelineError> {
        let video = guard.video();
        self.update_status(video, VideoStatus::Processing).await;

        let _permit = Arc::clone(&self.permits).acquire_owned().await.map_err(|_| {
            PipelineError::new(Stage::Fragment, FailureCause::Io("worker pool closed".into()))
        })?;

        let result = self.pipeline.run(&source, dir.path()).await;

        match &result {
            Ok(report) => {
                if report.thumbnail.is_soft_failure() {
                    tracing::warn!("Completed without a thumbnail");
                }
                self.update_status(video, VideoStatus::Ready).await;
            }
            Err(err) => {
                self.rollback(&dir, err);
                self.update_status(video, VideoStatus::Failed).await;
            }
        }

        drop(guard);
        result
    }

    fn rollback(&self, dir: &VideoDir, err: &PipelineError) {
        if !self.cleanup_on_failure || err.stage == Stage::Thumbnail {
            return;
        }
        match self.layout.remove(dir) {
            Ok(_) => tracing::info!(path = ?dir.path(), "Removed video directory after failed run"),
            Err(e) => tracing::error!(path = ?dir.path(), "Rollback failed: {}", e),
        }
    }

    async fn update_status(&self, video: VideoId, status: VideoStatus) {
        if let Err(e) = self.store.set_status(video, status).await {
            tracing::warn!(video = %video, ?status, "Failed to record status: {}", e);
        }
    }
}
