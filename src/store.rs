//! Video record store.
//!
//! The pipeline and the segment server only need a handful of facts about a
//! video: who owns it, its processing status and its view count. They reach
//! those through the [`VideoStore`] trait so the record database stays
//! outside this crate; [`MemoryVideoStore`] is the in-process implementation
//! used by the server binary and the tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use streamforge_common::{Error, OwnerId, Result, VideoId};

/// Processing status of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Processing,
    Ready,
    Failed,
}

/// Form fields that accompany an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoDetails {
    pub title: Option<String>,
    pub description: Option<String>,
}

/// A stored video record.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub owner: OwnerId,
    pub video: VideoId,
    pub details: VideoDetails,
    pub status: VideoStatus,
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Owner of `video`, if the video is known.
    async fn owner_of(&self, video: VideoId) -> Result<Option<OwnerId>>;

    /// Create or update the record for `(owner, video)`.
    ///
    /// Fails with [`Error::Conflict`] if the video id belongs to another owner.
    async fn register(&self, owner: OwnerId, video: VideoId, details: VideoDetails) -> Result<()>;

    /// Increment the view counter and return the new count.
    async fn record_view(&self, video: VideoId) -> Result<u64>;

    async fn set_status(&self, video: VideoId, status: VideoStatus) -> Result<()>;

    /// Drop the record. Returns `false` if there was none.
    async fn forget(&self, video: VideoId) -> Result<bool>;

    async fn get(&self, video: VideoId) -> Result<Option<VideoRecord>>;
}

/// In-memory [`VideoStore`].
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    records: RwLock<HashMap<VideoId, VideoRecord>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn owner_of(&self, video: VideoId) -> Result<Option<OwnerId>> {
        Ok(self.records.read().get(&video).map(|r| r.owner))
    }

    async fn register(&self, owner: OwnerId, video: VideoId, details: VideoDetails) -> Result<()> {
        let now = Utc::now();
        let mut records = self.records.write();
        match records.get_mut(&video) {
            Some(record) if record.owner != owner => Err(Error::conflict(format!(
                "video {video} belongs to another owner"
            ))),
            Some(record) => {
                if details.title.is_some() {
                    record.details.title = details.title;
                }
                if details.description.is_some() {
                    record.details.description = details.description;
                }
                record.status = VideoStatus::Processing;
                record.updated_at = now;
                Ok(())
            }
            None => {
                records.insert(
                    video,
                    VideoRecord {
                        owner,
                        video,
                        details,
                        status: VideoStatus::Processing,
                        views: 0,
                        created_at: now,
                        updated_at: now,
                    },
                );
                Ok(())
            }
        }
    }

    async fn record_view(&self, video: VideoId) -> Result<u64> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&video)
            .ok_or_else(|| Error::not_found(format!("video {video}")))?;
        record.views += 1;
        Ok(record.views)
    }

    async fn set_status(&self, video: VideoId, status: VideoStatus) -> Result<()> {
        let mut records = self.records.write();
        let record = records
            .get_mut(&video)
            .ok_or_else(|| Error::not_found(format!("video {video}")))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn forget(&self, video: VideoId) -> Result<bool> {
        Ok(self.records.write().remove(&video).is_some())
    }

    async fn get(&self, video: VideoId) -> Result<Option<VideoRecord>> {
        Ok(self.records.read().get(&video).cloned())
    }
}
