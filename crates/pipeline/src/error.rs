//! Error types for dispatch, local execution, scenarios and jobs.

use mediaflow_core::catalog::MissingParameters;
use mediaflow_core::browser::BrowserError;
use mediaflow_core::downloader::DownloadError;
use mediaflow_core::error::CoreError;
use mediaflow_core::ffmpeg::FfmpegError;
use mediaflow_core::media::MediaPathError;

/// Failure of one local executor.
#[derive(Debug, thiserror::Error)]
pub enum LocalTaskError {
    #[error(transparent)]
    FileNotFound(#[from] MediaPathError),

    #[error("audio concatenation failed: {0}")]
    Concat(#[source] FfmpegError),

    #[error("audio/video mixing failed: {0}")]
    Mix(#[source] FfmpegError),

    #[error("thumbnail extraction failed: {0}")]
    Thumbnail(#[source] FfmpegError),

    #[error("website screenshot failed: {0}")]
    Screenshot(#[source] BrowserError),

    #[error("video from image and audio failed: {0}")]
    ImageToVideo(#[source] FfmpegError),

    #[error("invalid arguments for {function}: {message}")]
    InvalidArguments { function: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LocalTaskError {
    pub fn invalid(function: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            function: function.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single dispatched operation.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    MissingParameters(#[from] MissingParameters),

    #[error("file not found for {endpoint}: {reference}")]
    FileNotFound { endpoint: String, reference: String },

    #[error("local execution of {endpoint} failed: {source}")]
    Local {
        endpoint: String,
        #[source]
        source: LocalTaskError,
    },

    #[error("remote call to {endpoint} failed: {message}")]
    Remote {
        endpoint: String,
        message: String,
        retryable: bool,
        attempts: u32,
        status_code: Option<u16>,
    },
}

impl DispatchError {
    /// Wrap a local failure, lifting missing files to their own variant.
    pub fn local(endpoint: &str, source: LocalTaskError) -> Self {
        match source {
            LocalTaskError::FileNotFound(MediaPathError::FileNotFound(reference)) => {
                Self::FileNotFound {
                    endpoint: endpoint.to_string(),
                    reference,
                }
            }
            source => Self::Local {
                endpoint: endpoint.to_string(),
                source,
            },
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("scenario '{0}' not found")]
    ScenarioNotFound(String),

    #[error("step '{step_id}' failed: {message}")]
    StepFailed { step_id: String, message: String },
}

/// Failure writing job or conversation state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Any failure that ends a background job.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("{0}")]
    NoIntent(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error("video download failed: {0}")]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("internal error: job task panicked")]
    Panicked,
}
