//! Static registry of remote-backend operations.
//!
//! Every operation is keyed by its canonical endpoint path. Aliases seen in
//! model output, older clients, and scenario files collapse onto the
//! canonical path through [`normalize_endpoint`], which is idempotent.

use serde::Serialize;
use serde_json::Value;

use crate::types::Params;

// ---------------------------------------------------------------------------
// Canonical endpoint constants
// ---------------------------------------------------------------------------

/// Liveness / capability probe of the remote backend.
pub const ENDPOINT_TOOLKIT_TEST: &str = "/v1/toolkit/test";
/// Credential check against the remote backend.
pub const ENDPOINT_TOOLKIT_AUTHENTICATE: &str = "/v1/toolkit/authenticate";
/// Mux an audio track onto a video.
pub const ENDPOINT_AUDIO_MIXING: &str = "/audio-mixing";
/// Join several audio files in order.
pub const ENDPOINT_AUDIO_CONCATENATE: &str = "/v1/audio/concatenate";
/// Join several videos in order.
pub const ENDPOINT_VIDEO_CONCATENATE: &str = "/v1/video/concatenate";
/// Convert any media file to MP3.
pub const ENDPOINT_MEDIA_TO_MP3: &str = "/media-to-mp3";
/// Speech-to-text for audio or video.
pub const ENDPOINT_TRANSCRIBE: &str = "/transcribe";
/// Generic container / codec conversion.
pub const ENDPOINT_MEDIA_CONVERT: &str = "/v1/media/convert";
/// Extract container and stream metadata.
pub const ENDPOINT_MEDIA_METADATA: &str = "/v1/media/metadata";
/// Burn generated captions into a video.
pub const ENDPOINT_VIDEO_CAPTIONS: &str = "/v1/video/add/captions";
/// Overlay an image watermark on a video.
pub const ENDPOINT_VIDEO_WATERMARK: &str = "/v1/video/add/watermark";
/// Trim a video to a time range.
pub const ENDPOINT_VIDEO_CUT: &str = "/v1/video/cut";
/// Extract a still frame from a video.
pub const ENDPOINT_VIDEO_THUMBNAIL: &str = "/v1/video/thumbnail";
/// Render a web page and capture it as an image.
pub const ENDPOINT_WEBPAGE_SCREENSHOT: &str = "/v1/image/screenshot/webpage";
/// Turn a still image into a video clip.
pub const ENDPOINT_IMAGE_TO_VIDEO: &str = "/v1/image/convert/video";
/// Run a Python snippet on the backend.
pub const ENDPOINT_EXECUTE_PYTHON: &str = "/v1/code/execute/python";
/// Upload a file to Google Drive.
pub const ENDPOINT_GDRIVE_UPLOAD: &str = "/gdrive-upload";

// ---------------------------------------------------------------------------
// Operation metadata
// ---------------------------------------------------------------------------

/// HTTP verb the remote backend expects for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub endpoint: &'static str,
    pub category: &'static str,
    pub method: HttpMethod,
    pub description: &'static str,
    /// Parameters that must be present and non-empty.
    pub required: &'static [&'static str],
    /// Parameters the backend accepts but does not require.
    pub optional: &'static [&'static str],
}

static CATALOG: &[Operation] = &[
    Operation {
        endpoint: ENDPOINT_TOOLKIT_TEST,
        category: "toolkit",
        method: HttpMethod::Get,
        description: "Checks whether the processing backend is online",
        required: &[],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_TOOLKIT_AUTHENTICATE,
        category: "toolkit",
        method: HttpMethod::Post,
        description: "Verifies the configured API key",
        required: &[],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_AUDIO_MIXING,
        category: "video",
        method: HttpMethod::Post,
        description: "Mixes an audio track into a video",
        required: &["video_url", "audio_url"],
        optional: &["video_vol", "audio_vol", "output_length"],
    },
    Operation {
        endpoint: ENDPOINT_AUDIO_CONCATENATE,
        category: "audio",
        method: HttpMethod::Post,
        description: "Joins several audio files in the given order",
        required: &["audio_urls"],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_VIDEO_CONCATENATE,
        category: "video",
        method: HttpMethod::Post,
        description: "Joins several videos in the given order",
        required: &["video_urls"],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_MEDIA_TO_MP3,
        category: "media",
        method: HttpMethod::Post,
        description: "Converts audio or video to MP3",
        required: &["media_url"],
        optional: &["bitrate"],
    },
    Operation {
        endpoint: ENDPOINT_TRANSCRIBE,
        category: "media",
        method: HttpMethod::Post,
        description: "Transcribes speech in audio or video",
        required: &["media_url"],
        optional: &["language"],
    },
    Operation {
        endpoint: ENDPOINT_MEDIA_CONVERT,
        category: "media",
        method: HttpMethod::Post,
        description: "Converts a media file to another format",
        required: &["media_url", "format"],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_MEDIA_METADATA,
        category: "media",
        method: HttpMethod::Post,
        description: "Extracts container and stream metadata",
        required: &["media_url"],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_VIDEO_CAPTIONS,
        category: "video",
        method: HttpMethod::Post,
        description: "Generates and burns captions into a video",
        required: &["video_url"],
        optional: &["language"],
    },
    Operation {
        endpoint: ENDPOINT_VIDEO_WATERMARK,
        category: "video",
        method: HttpMethod::Post,
        description: "Overlays an image watermark on a video",
        required: &["video_url", "image_url"],
        optional: &["position"],
    },
    Operation {
        endpoint: ENDPOINT_VIDEO_CUT,
        category: "video",
        method: HttpMethod::Post,
        description: "Trims a video to a time range",
        required: &["video_url", "start_time"],
        optional: &["end_time"],
    },
    Operation {
        endpoint: ENDPOINT_VIDEO_THUMBNAIL,
        category: "video",
        method: HttpMethod::Post,
        description: "Extracts a still frame from a video",
        required: &["video_url"],
        optional: &["time_offset"],
    },
    Operation {
        endpoint: ENDPOINT_WEBPAGE_SCREENSHOT,
        category: "image",
        method: HttpMethod::Post,
        description: "Captures a full-page screenshot of a web page",
        required: &["url"],
        optional: &["viewport_width", "viewport_height"],
    },
    Operation {
        endpoint: ENDPOINT_IMAGE_TO_VIDEO,
        category: "image",
        method: HttpMethod::Post,
        description: "Turns a still image into a video clip",
        required: &["image_url"],
        optional: &["length"],
    },
    Operation {
        endpoint: ENDPOINT_EXECUTE_PYTHON,
        category: "code",
        method: HttpMethod::Post,
        description: "Executes Python code on the backend",
        required: &["code"],
        optional: &[],
    },
    Operation {
        endpoint: ENDPOINT_GDRIVE_UPLOAD,
        category: "storage",
        method: HttpMethod::Post,
        description: "Uploads a file to Google Drive",
        required: &["file_url"],
        optional: &[],
    },
];

/// Alias → canonical endpoint. Every right-hand side is a catalog entry.
const ALIASES: &[(&str, &str)] = &[
    ("/v1/video/add/audio", ENDPOINT_AUDIO_MIXING),
    ("/v1/video/audio-mixing", ENDPOINT_AUDIO_MIXING),
    ("/v1/audio/concat", ENDPOINT_AUDIO_CONCATENATE),
    ("/audio-concatenate", ENDPOINT_AUDIO_CONCATENATE),
    ("/combine-videos", ENDPOINT_VIDEO_CONCATENATE),
    ("/v1/video/combine", ENDPOINT_VIDEO_CONCATENATE),
    ("/v1/media/convert/mp3", ENDPOINT_MEDIA_TO_MP3),
    ("/v1/media/transcode", ENDPOINT_MEDIA_CONVERT),
    ("/v1/media/transcribe", ENDPOINT_TRANSCRIBE),
    ("/v1/video/caption", ENDPOINT_VIDEO_CAPTIONS),
    ("/v1/video/add/caption", ENDPOINT_VIDEO_CAPTIONS),
    ("/v1/image/screenshot", ENDPOINT_WEBPAGE_SCREENSHOT),
    ("/screenshot", ENDPOINT_WEBPAGE_SCREENSHOT),
    ("/thumbnail", ENDPOINT_VIDEO_THUMBNAIL),
    ("/authenticate", ENDPOINT_TOOLKIT_AUTHENTICATE),
    ("/test", ENDPOINT_TOOLKIT_TEST),
];

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Canonicalize an operation identifier.
///
/// Trims whitespace, lowercases, forces a single leading `/`, drops trailing
/// slashes, then resolves aliases. `normalize_endpoint(normalize_endpoint(x))`
/// always equals `normalize_endpoint(x)`.
pub fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().to_ascii_lowercase();
    let path = trimmed.trim_matches('/');
    let shaped = format!("/{path}");

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == shaped)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(shaped)
}

/// All catalog entries in declaration order.
pub fn operations() -> &'static [Operation] {
    CATALOG
}

/// Look up an operation by any of its identifiers.
pub fn find_operation(endpoint: &str) -> Option<&'static Operation> {
    let canonical = normalize_endpoint(endpoint);
    CATALOG.iter().find(|op| op.endpoint == canonical)
}

/// Required parameter names in catalog order, or `None` for unknown operations.
pub fn required_params(endpoint: &str) -> Option<&'static [&'static str]> {
    find_operation(endpoint).map(|op| op.required)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Raised when a known operation is missing required parameters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Missing parameters for {endpoint}: {}", missing.join(", "))]
pub struct MissingParameters {
    pub endpoint: String,
    pub missing: Vec<String>,
}

/// Whether a parameter value counts as absent (null, blank string, empty
/// array, empty object).
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Return the required parameters of `endpoint` that are absent or blank.
///
/// Unknown operations always validate; their callers are assumed to know
/// the backend contract.
pub fn validate_params(endpoint: &str, params: &Params) -> Vec<String> {
    let Some(required) = required_params(endpoint) else {
        return Vec::new();
    };

    required
        .iter()
        .filter(|name| params.get(**name).map_or(true, is_blank))
        .map(|name| (*name).to_string())
        .collect()
}

/// [`validate_params`] as a `Result`.
pub fn check_params(endpoint: &str, params: &Params) -> Result<(), MissingParameters> {
    let missing = validate_params(endpoint, params);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(MissingParameters {
            endpoint: endpoint.to_string(),
            missing,
        })
    }
}

/// Drop top-level parameters whose value is blank.
pub fn strip_blank_params(params: Params) -> Params {
    params.into_iter().filter(|(_, v)| !is_blank(v)).collect()
}

/// Render the catalog as a plain-text block for the intent-extraction prompt.
pub fn describe_for_prompt() -> String {
    let mut out = String::from("Available processing endpoints:\n\n");
    for op in CATALOG {
        out.push_str(&format!(
            "{} {} - {}\n",
            op.method.as_str(),
            op.endpoint,
            op.description
        ));
        if !op.required.is_empty() || !op.optional.is_empty() {
            let mut names: Vec<String> = op.required.iter().map(|p| (*p).to_string()).collect();
            names.extend(op.optional.iter().map(|p| format!("{p} (optional)")));
            out.push_str(&format!("   Parameters: {}\n", names.join(", ")));
        }
        out.push('\n');
    }
    out
}
