//! Mapping between public upload URLs and files on disk, plus cheap
//! reference sniffing used by the local override router.

use std::path::{Path, PathBuf};

use crate::uploads::{extension_of, FileClass};

/// Path prefix under which stored files are served.
pub const UPLOADS_ROUTE: &str = "/uploads";

/// Error resolving a file reference to a local path.
#[derive(Debug, thiserror::Error)]
pub enum MediaPathError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid file reference: {0}")]
    InvalidReference(String),
}

/// Where uploads and locally produced outputs live, and how they are
/// addressed from outside.
#[derive(Debug, Clone)]
pub struct MediaPaths {
    upload_dir: PathBuf,
    public_base_url: String,
}

impl MediaPaths {
    pub fn new(upload_dir: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let base: String = public_base_url.into();
        Self {
            upload_dir: upload_dir.into(),
            public_base_url: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    /// Absolute public URL of a stored file.
    pub fn url_for(&self, stored_name: &str) -> String {
        format!("{}{UPLOADS_ROUTE}/{stored_name}", self.public_base_url)
    }

    /// On-disk path for a stored name. The name is not checked for existence.
    pub fn path_for(&self, stored_name: &str) -> PathBuf {
        self.upload_dir.join(stored_name)
    }

    /// Map a reference (our own upload URL, any URL, or a bare name) to an
    /// existing file in the upload directory using its final path segment.
    pub fn resolve_local(&self, reference: &str) -> Result<PathBuf, MediaPathError> {
        let name = final_segment(reference)
            .ok_or_else(|| MediaPathError::InvalidReference(reference.to_string()))?;
        let path = self.path_for(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(MediaPathError::FileNotFound(reference.to_string()))
        }
    }

    /// Whether `reference` is a URL into this service's upload namespace.
    pub fn is_own_upload(&self, reference: &str) -> bool {
        reference.starts_with(&format!("{}{UPLOADS_ROUTE}/", self.public_base_url))
    }
}

/// Last non-empty path segment with any query or fragment removed.
///
/// Rejects `.` and `..` so a reference can never leave the upload directory.
pub fn final_segment(reference: &str) -> Option<&str> {
    let without_fragment = reference.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();
    let segment = without_query
        .trim()
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()?;
    match segment {
        "" | "." | ".." => None,
        s => Some(s),
    }
}

/// File class of a reference judged by its extension alone.
pub fn class_of(reference: &str) -> Option<FileClass> {
    final_segment(reference)
        .and_then(extension_of)
        .and_then(|ext| FileClass::from_extension(&ext))
}

pub fn is_video_reference(reference: &str) -> bool {
    class_of(reference) == Some(FileClass::Video)
}

pub fn is_audio_reference(reference: &str) -> bool {
    class_of(reference) == Some(FileClass::Audio)
}

pub fn is_http_url(reference: &str) -> bool {
    let lower = reference.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Video-sharing URLs that are fetched locally before dispatch.
pub fn is_youtube_url(reference: &str) -> bool {
    is_http_url(reference) && (reference.contains("youtube.com") || reference.contains("youtu.be"))
}

/// Short random tag used in generated output filenames.
pub fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
