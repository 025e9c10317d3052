//! Upload classification, validation, and placeholder resolution.
//!
//! Storage itself lives in the API crate; everything here is pure so it can
//! be shared with intent extraction and the job runner.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default per-file upload limit (500 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 500 * 1024 * 1024;

/// Prefix of a positional reference to a file uploaded with the request,
/// e.g. `USE_UPLOADED_FILE_0`.
pub const PLACEHOLDER_PREFIX: &str = "USE_UPLOADED_FILE_";

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm", "flv"];
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "m4a", "ogg", "flac"];
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];
pub const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt"];

// ---------------------------------------------------------------------------
// File classes
// ---------------------------------------------------------------------------

/// Broad content class of an uploaded file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    Video,
    Audio,
    Image,
    Document,
}

impl FileClass {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
            Self::Document => "document",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let ext = ext.as_str();
        if VIDEO_EXTENSIONS.contains(&ext) {
            Some(Self::Video)
        } else if AUDIO_EXTENSIONS.contains(&ext) {
            Some(Self::Audio)
        } else if IMAGE_EXTENSIONS.contains(&ext) {
            Some(Self::Image)
        } else if DOCUMENT_EXTENSIONS.contains(&ext) {
            Some(Self::Document)
        } else {
            None
        }
    }
}

impl std::str::FromStr for FileClass {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "image" => Ok(Self::Image),
            "document" => Ok(Self::Document),
            other => Err(CoreError::Validation(format!("Unknown file class: {other}"))),
        }
    }
}

/// Descriptor of a stored upload, echoed back to clients and handed to
/// intent extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    /// Sanitised original filename.
    pub filename: String,
    /// Name on disk under the upload directory.
    pub stored_filename: String,
    pub url: String,
    /// Lowercase extension without the dot.
    pub extension: String,
    pub file_type: FileClass,
    pub size: u64,
    /// Hex SHA-256 of the content.
    pub hash: String,
    /// True when an identical upload already existed and was reused.
    #[serde(default)]
    pub deduplicated: bool,
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validated metadata for an incoming upload, before it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub filename: String,
    pub extension: String,
    pub file_type: FileClass,
}

/// Check an incoming file's name and size against the allow-list and limit.
pub fn validate_upload(
    original_name: &str,
    size: u64,
    max_bytes: u64,
) -> Result<ValidatedUpload, CoreError> {
    let filename = sanitize_filename(original_name);
    if filename.is_empty() {
        return Err(CoreError::Validation("Upload has no filename".to_string()));
    }

    let extension = extension_of(&filename)
        .ok_or_else(|| CoreError::Validation(format!("File type not allowed: {filename}")))?;
    let file_type = FileClass::from_extension(&extension)
        .ok_or_else(|| CoreError::Validation(format!("File type not allowed: {filename}")))?;

    if size == 0 {
        return Err(CoreError::Validation(format!("Upload is empty: {filename}")));
    }
    if size > max_bytes {
        return Err(CoreError::Validation(format!(
            "File too large: {:.2}MB (max: {:.2}MB)",
            bytes_to_mb(size),
            bytes_to_mb(max_bytes)
        )));
    }

    Ok(ValidatedUpload {
        filename,
        extension,
        file_type,
    })
}

/// Reduce a client-supplied filename to a safe basename.
///
/// Keeps ASCII alphanumerics, `.`, `-` and `_`; whitespace becomes `_`;
/// everything else is dropped. Leading dots are stripped so the result can
/// never name a hidden file or walk upward.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .filter_map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' => Some(c),
            c if c.is_whitespace() => Some('_'),
            _ => None,
        })
        .collect();
    cleaned.trim_start_matches('.').to_string()
}

/// Lowercase extension without the dot, if the name has one.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Fresh on-disk name for an upload: `<uuid>.<ext>`.
pub fn stored_name(extension: &str) -> String {
    format!("{}.{}", uuid::Uuid::new_v4(), extension)
}

fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

// ---------------------------------------------------------------------------
// Placeholders
// ---------------------------------------------------------------------------

/// Parse `USE_UPLOADED_FILE_<n>` into `n`.
pub fn parse_placeholder(value: &str) -> Option<usize> {
    value.trim().strip_prefix(PLACEHOLDER_PREFIX)?.parse().ok()
}

/// Replace every upload placeholder in `value` with the matching file URL.
///
/// Walks objects and arrays. Returns the placeholders that could not be
/// resolved because their index is out of range; those are left untouched.
pub fn resolve_placeholders(value: &mut Value, files: &[UploadedFile]) -> Vec<String> {
    let mut unresolved = Vec::new();
    resolve_into(value, files, &mut unresolved);
    unresolved
}

fn resolve_into(value: &mut Value, files: &[UploadedFile], unresolved: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            if let Some(index) = parse_placeholder(s) {
                match files.get(index) {
                    Some(file) => *s = file.url.clone(),
                    None => unresolved.push(s.clone()),
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                resolve_into(item, files, unresolved);
            }
        }
        Value::Object(map) => {
            for item in map.values_mut() {
                resolve_into(item, files, unresolved);
            }
        }
        _ => {}
    }
}
