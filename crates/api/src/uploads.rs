//! Content-addressed upload storage.
//!
//! Incoming bytes are streamed to a temporary file in the upload directory
//! while their SHA-256 is computed. Identical content is stored once: a
//! second upload of the same bytes reuses the first upload's stored name
//! and URL and is reported as deduplicated.

use std::fmt::Display;
use std::path::Path;

use axum::body::Bytes;
use futures::{Stream, StreamExt};
use mediaflow_core::error::CoreError;
use mediaflow_core::media::MediaPaths;
use mediaflow_core::uploads::{stored_name, validate_upload, FileClass, UploadedFile};
use mediaflow_db::models::asset::{Asset, CreateAsset};
use mediaflow_db::repositories::AssetRepo;
use mediaflow_db::DbPool;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Invalid(#[from] CoreError),

    #[error("Failed to read upload body: {0}")]
    Body(String),

    #[error("Upload storage failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Invalid(e) => Self::Core(e),
            UploadError::Body(msg) => Self::BadRequest(msg),
            UploadError::Io(e) => Self::InternalError(e.to_string()),
            UploadError::Database(e) => Self::Database(e),
        }
    }
}

pub struct UploadStore {
    pool: DbPool,
    paths: MediaPaths,
    max_bytes: u64,
}

impl UploadStore {
    pub fn new(pool: DbPool, paths: MediaPaths, max_bytes: u64) -> Self {
        Self {
            pool,
            paths,
            max_bytes,
        }
    }

    pub fn paths(&self) -> &MediaPaths {
        &self.paths
    }

    /// Store one upload from a stream of body chunks.
    pub async fn save<S, E>(&self, original_name: &str, body: S) -> Result<UploadedFile, UploadError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        tokio::fs::create_dir_all(self.paths.upload_dir()).await?;
        let temp = self.paths.path_for(&format!(".{}.part", uuid::Uuid::new_v4()));

        let written = write_hashed(&temp, body, self.max_bytes).await;
        let (size, hash) = match written {
            Ok(done) => done,
            Err(WriteError::TooLarge(size)) => {
                remove_quietly(&temp).await;
                return Err(validate_upload(original_name, size, self.max_bytes)
                    .err()
                    .unwrap_or_else(|| CoreError::Validation("File too large".into()))
                    .into());
            }
            Err(WriteError::Upload(e)) => {
                remove_quietly(&temp).await;
                return Err(e);
            }
        };

        let validated = match validate_upload(original_name, size, self.max_bytes) {
            Ok(v) => v,
            Err(e) => {
                remove_quietly(&temp).await;
                return Err(e.into());
            }
        };

        // 1. Known content whose file is still on disk: reuse it.
        if let Some(existing) = AssetRepo::find_by_hash(&self.pool, &hash).await? {
            let existing_path = self.paths.path_for(&existing.stored_filename);
            if tokio::fs::try_exists(&existing_path).await.unwrap_or(false) {
                remove_quietly(&temp).await;
            } else {
                tracing::warn!(stored = %existing.stored_filename, "Restoring missing deduplicated upload");
                tokio::fs::rename(&temp, &existing_path).await?;
            }
            tracing::info!(hash = %hash, stored = %existing.stored_filename, "Upload deduplicated");
            return Ok(describe(&existing, validated.filename, validated.file_type, true));
        }

        // 2. New content: move into place, then record it.
        let stored_filename = stored_name(&validated.extension);
        let final_path = self.paths.path_for(&stored_filename);
        tokio::fs::rename(&temp, &final_path).await?;

        let input = CreateAsset {
            filename: validated.filename.clone(),
            stored_filename: stored_filename.clone(),
            original_name: original_name.to_string(),
            url: self.paths.url_for(&stored_filename),
            file_type: validated.file_type.as_str().to_string(),
            extension: validated.extension.clone(),
            size: size as i64,
            hash: hash.clone(),
        };
        let (asset, inserted) = match AssetRepo::insert_or_get(&self.pool, &input).await {
            Ok(result) => result,
            Err(e) => {
                remove_quietly(&final_path).await;
                return Err(e.into());
            }
        };

        if !inserted {
            // Lost a race against an identical upload.
            remove_quietly(&final_path).await;
        }
        tracing::info!(
            hash = %hash,
            stored = %asset.stored_filename,
            size,
            deduplicated = !inserted,
            "Upload stored"
        );
        Ok(describe(&asset, validated.filename, validated.file_type, !inserted))
    }
}

enum WriteError {
    TooLarge(u64),
    Upload(UploadError),
}

impl From<std::io::Error> for WriteError {
    fn from(e: std::io::Error) -> Self {
        Self::Upload(e.into())
    }
}

/// Copy `body` into `path`, returning its size and hex SHA-256.
async fn write_hashed<S, E>(path: &Path, mut body: S, max_bytes: u64) -> Result<(u64, String), WriteError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut file = tokio::fs::File::create(path).await?;
    let mut hasher = Sha256::new();
    let mut size: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| WriteError::Upload(UploadError::Body(e.to_string())))?;
        size += chunk.len() as u64;
        if size > max_bytes {
            return Err(WriteError::TooLarge(size));
        }
        hasher.update(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok((size, format!("{:x}", hasher.finalize())))
}

fn describe(asset: &Asset, filename: String, file_type: FileClass, deduplicated: bool) -> UploadedFile {
    UploadedFile {
        filename,
        stored_filename: asset.stored_filename.clone(),
        url: asset.url.clone(),
        extension: asset.extension.clone(),
        file_type,
        size: asset.size.max(0) as u64,
        hash: asset.hash.clone(),
        deduplicated,
    }
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove upload file");
        }
    }
}
