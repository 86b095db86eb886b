//! Upload assembly: multipart body in, stored source file out.
//!
//! This step only receives bytes. It writes `video.<ext>` into the video
//! directory and hands the form fields back; starting the pipeline is the
//! caller's decision.

use std::path::{Path, PathBuf};

use axum::extract::multipart::{Field, Multipart};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::io::{AsyncWriteExt, BufWriter};

use streamforge_common::layout::SOURCE_STEM;
use streamforge_common::paths::permitted_extension;
use streamforge_common::{Error, Result, VideoDir};

use crate::config::Config;
use crate::store::VideoDetails;

/// A source file that has been stored in its video directory.
#[derive(Debug, Clone)]
pub struct UploadedSource {
    pub path: PathBuf,
    pub extension: String,
    pub bytes: u64,
    pub details: VideoDetails,
}

/// Reads upload requests and stores their file part.
#[derive(Debug, Clone)]
pub struct UploadAssembler {
    permitted_extensions: Vec<String>,
    max_bytes: u64,
}

impl UploadAssembler {
    pub fn new(permitted_extensions: Vec<String>, max_bytes: u64) -> Self {
        Self {
            permitted_extensions,
            max_bytes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.storage.permitted_extensions.clone(),
            config.server.max_upload_bytes,
        )
    }

    /// Consume a multipart body, storing its single file part in `dir`.
    ///
    /// `dir` must exist. An existing source is only replaced once the new
    /// file has been received completely.
    pub async fn assemble(
        &self,
        mut multipart: Multipart,
        dir: &VideoDir,
    ) -> Result<UploadedSource> {
        let mut details = VideoDetails::default();
        let mut stored: Option<(PathBuf, String, u64)> = None;

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            if field.file_name().is_some() {
                if stored.is_some() {
                    return Err(Error::invalid_input("only one video upload per request"));
                }
                stored = Some(self.store_field(field, dir).await?);
                continue;
            }

            let name = field.name().map(str::to_string);
            match name.as_deref() {
                Some("title") => details.title = Some(field.text().await.map_err(malformed)?),
                Some("description") => {
                    details.description = Some(field.text().await.map_err(malformed)?)
                }
                other => tracing::debug!(field = ?other, "Ignoring unknown form field"),
            }
        }

        let (path, extension, bytes) =
            stored.ok_or_else(|| Error::invalid_input("no video file in request"))?;
        tracing::info!(path = ?path, bytes, "Stored upload");

        Ok(UploadedSource {
            path,
            extension,
            bytes,
            details,
        })
    }

    async fn store_field(
        &self,
        field: Field<'_>,
        dir: &VideoDir,
    ) -> Result<(PathBuf, String, u64)> {
        let file_name = field.file_name().unwrap_or_default().to_string();
        let extension = permitted_extension(&file_name, &self.permitted_extensions)
            .ok_or_else(|| {
                Error::invalid_input(format!("file type not permitted: {file_name:?}"))
            })?;

        let partial = tempfile::Builder::new()
            .prefix(".upload-")
            .tempfile_in(dir.path())?;
        let bytes = stream_to_file(partial.path(), field, self.max_bytes).await?;

        replace_source(dir, partial, &extension).map(|path| (path, extension, bytes))
    }
}

fn malformed(err: axum::extract::multipart::MultipartError) -> Error {
    Error::invalid_input(format!("malformed multipart body: {}", err.body_text()))
}

/// Copy a byte stream into `path`, failing once more than `limit` bytes arrive.
pub async fn stream_to_file<S, E>(path: &Path, stream: S, limit: u64) -> Result<u64>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    futures::pin_mut!(stream);
    let mut file = BufWriter::new(tokio::fs::File::create(path).await?);
    let mut written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| Error::invalid_input(format!("upload interrupted: {e}")))?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(Error::PayloadTooLarge { limit });
        }
        file.write_all(&chunk).await?;
    }

    file.flush().await?;
    Ok(written)
}

/// Swap the received file in as `video.<ext>`, removing any other source.
fn replace_source(
    dir: &VideoDir,
    partial: tempfile::NamedTempFile,
    extension: &str,
) -> Result<PathBuf> {
    let dest = dir.path().join(format!("{SOURCE_STEM}.{extension}"));
    for entry in std::fs::read_dir(dir.path())? {
        let old = entry?.path();
        let is_source = old.is_file()
            && old.file_stem().and_then(|s| s.to_str()) == Some(SOURCE_STEM);
        if is_source && old != dest {
            std::fs::remove_file(&old)?;
        }
    }
    partial.persist(&dest).map_err(|e| Error::Io(e.error))?;
    Ok(dest)
}
