#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mediaflow_core::browser::{BrowserError, Viewport};
use mediaflow_core::downloader::DownloadError;
use mediaflow_core::ffmpeg::FfmpegError;
use mediaflow_core::intent::{IntentResult, IntentSource};
use mediaflow_core::media::MediaPaths;
use mediaflow_core::scenario::{parse_scenarios, ScenarioMap};
use mediaflow_core::types::{EntityId, Params};
use mediaflow_core::uploads::{FileClass, UploadedFile};
use mediaflow_db::models::job::{CreateJob, Job, PENDING_ENDPOINT};
use mediaflow_db::repositories::ConversationRepo;
use mediaflow_db::DbPool;
use mediaflow_pipeline::dispatcher::{Dispatcher, OperationDispatcher};
use mediaflow_pipeline::error::DispatchError;
use mediaflow_pipeline::fetch::MediaFetcher;
use mediaflow_pipeline::intent::{IntentExtractor, ModelIntentExtractor};
use mediaflow_pipeline::local::LocalExecutor;
use mediaflow_pipeline::router::LocalOverrideRouter;
use mediaflow_pipeline::text_gen::{TextGenError, TextGenerator};
use mediaflow_pipeline::tools::MediaTools;
use mediaflow_pipeline::{JobKind, JobRunner, JobStore, ScenarioRegistry, WorkflowEngine};
use mediaflow_toolkit::{
    RemoteDispatchClient, RemoteTransport, ToolkitConfig, TransportError, TransportResponse,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const BASE_URL: &str = "http://localhost:5000";

pub async fn pool() -> DbPool {
    let pool = mediaflow_db::create_pool("sqlite::memory:").await.unwrap();
    mediaflow_db::run_migrations(&pool).await.unwrap();
    pool
}

// ---------------------------------------------------------------------------
// Collaborator doubles
// ---------------------------------------------------------------------------

/// Answers every request with the same reply and records `METHOD endpoint`.
pub struct RecordingTransport {
    pub calls: Mutex<Vec<String>>,
    reply: Result<TransportResponse, TransportError>,
}

impl RecordingTransport {
    pub fn new(reply: Result<TransportResponse, TransportError>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            reply,
        })
    }

    pub fn ok(body: Value) -> Arc<Self> {
        Self::new(Ok(TransportResponse { status: 200, body }))
    }

    pub fn unreachable() -> Arc<Self> {
        Self::new(Err(TransportError::Connection("connection refused".into())))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteTransport for RecordingTransport {
    async fn post_json(
        &self,
        endpoint: &str,
        _body: &Value,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(format!("POST {endpoint}"));
        self.reply.clone()
    }

    async fn get_json(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<TransportResponse, TransportError> {
        self.calls.lock().unwrap().push(format!("GET {endpoint}"));
        self.reply.clone()
    }
}

/// Media tools that join input bytes instead of transcoding. With
/// `broken` set, frame grabs and page captures exit non-zero.
pub struct ByteTools {
    pub available: bool,
    pub broken: bool,
}

#[async_trait]
impl MediaTools for ByteTools {
    async fn ffmpeg_available(&self) -> bool {
        self.available
    }

    async fn concat_audio(&self, inputs: &[PathBuf], output: &Path) -> Result<(), FfmpegError> {
        let mut joined = Vec::new();
        for input in inputs {
            joined.extend(std::fs::read(input)?);
        }
        std::fs::write(output, joined)?;
        Ok(())
    }

    async fn mix_audio_video(&self, video: &Path, audio: &Path, output: &Path) -> Result<(), FfmpegError> {
        let mut joined = std::fs::read(video)?;
        joined.extend(std::fs::read(audio)?);
        std::fs::write(output, joined)?;
        Ok(())
    }

    async fn extract_frame(&self, _video: &Path, _offset: &str, output: &Path) -> Result<(), FfmpegError> {
        if self.broken {
            return Err(FfmpegError::ExecutionFailed {
                exit_code: 1,
                stderr: "invalid frame".into(),
            });
        }
        std::fs::write(output, b"frame")?;
        Ok(())
    }

    async fn image_to_video(&self, image: &Path, audio: &Path, output: &Path) -> Result<(), FfmpegError> {
        self.mix_audio_video(image, audio, output).await
    }

    async fn screenshot(&self, _url: &str, _viewport: Viewport, output: &Path) -> Result<(), BrowserError> {
        if self.broken {
            return Err(BrowserError::ExecutionFailed {
                exit_code: 1,
                stderr: "page crashed".into(),
            });
        }
        std::fs::write(output, b"png").map_err(BrowserError::Io)
    }
}

/// Always answers with the same intent.
pub struct FixedIntent(pub IntentResult);

impl FixedIntent {
    pub fn new(endpoint: &str, params: Value) -> Arc<Self> {
        Arc::new(Self(IntentResult {
            endpoint: Some(endpoint.to_string()),
            params: params.as_object().cloned().unwrap_or_default(),
            confidence: 0.9,
            reasoning: "fixed".into(),
            source: IntentSource::Model,
        }))
    }
}

#[async_trait]
impl IntentExtractor for FixedIntent {
    async fn extract(&self, _message: &str, _uploads: &[UploadedFile]) -> IntentResult {
        self.0.clone()
    }
}

/// Replaces each video URL with a fixed local URL.
pub struct StubFetcher;

#[async_trait]
impl MediaFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<String, DownloadError> {
        if url.contains("broken") {
            return Err(DownloadError::MissingOutput(url.to_string()));
        }
        Ok(format!("{BASE_URL}/uploads/fetched.mp4"))
    }
}

/// Upper-cases the prompt.
pub struct ShoutingGenerator;

#[async_trait]
impl TextGenerator for ShoutingGenerator {
    async fn generate(&self, prompt: &str, _json_output: bool) -> Result<String, TextGenError> {
        Ok(prompt.to_uppercase())
    }
}

/// Dispatcher with a canned answer for every call.
pub struct CannedDispatcher(pub Result<Value, String>);

#[async_trait]
impl OperationDispatcher for CannedDispatcher {
    async fn dispatch(&self, endpoint: &str, _params: Params) -> Result<Value, DispatchError> {
        self.call_remote(endpoint, Params::new()).await
    }

    async fn call_remote(&self, endpoint: &str, _params: Params) -> Result<Value, DispatchError> {
        self.0.clone().map_err(|message| DispatchError::Remote {
            endpoint: endpoint.to_string(),
            message,
            retryable: false,
            attempts: 1,
            status_code: Some(400),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Setup {
    pub ffmpeg: bool,
    pub broken_tools: bool,
    pub intent: Option<Arc<dyn IntentExtractor>>,
    pub transport: Arc<RecordingTransport>,
    pub dispatcher: Option<Arc<dyn OperationDispatcher>>,
    pub scenarios: &'static str,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            ffmpeg: true,
            broken_tools: false,
            intent: None,
            transport: RecordingTransport::ok(json!({"response": "remote"})),
            dispatcher: None,
            scenarios: "{}",
        }
    }
}

pub struct Harness {
    pub pool: DbPool,
    pub store: JobStore,
    pub runner: Arc<JobRunner>,
    pub transport: Arc<RecordingTransport>,
    pub paths: MediaPaths,
    pub dir: TempDir,
}

pub async fn harness(setup: Setup) -> Harness {
    let pool = pool().await;
    let dir = tempfile::tempdir().unwrap();
    let paths = MediaPaths::new(dir.path(), BASE_URL);

    let tools = ByteTools {
        available: setup.ffmpeg,
        broken: setup.broken_tools,
    };
    let executor = LocalExecutor::new(Arc::new(tools), paths.clone());
    let remote = RemoteDispatchClient::new(
        setup.transport.clone(),
        ToolkitConfig {
            max_retries: 1,
            ..ToolkitConfig::default()
        },
    );
    let dispatcher: Arc<dyn OperationDispatcher> = match setup.dispatcher {
        Some(dispatcher) => dispatcher,
        None => Arc::new(Dispatcher::new(LocalOverrideRouter::new(executor.clone()), remote)),
    };

    let intent: Arc<dyn IntentExtractor> = match setup.intent {
        Some(intent) => intent,
        None => Arc::new(ModelIntentExtractor::heuristic_only()),
    };

    let scenarios: ScenarioMap = parse_scenarios(setup.scenarios).unwrap();
    let registry = Arc::new(ScenarioRegistry::new(dir.path().join("scenarios.json"), scenarios));
    let workflow = Arc::new(WorkflowEngine::new(
        registry,
        dispatcher.clone(),
        executor,
        Some(Arc::new(ShoutingGenerator)),
    ));

    let store = JobStore::new(pool.clone());
    let runner = Arc::new(JobRunner::new(
        store.clone(),
        dispatcher,
        intent,
        Arc::new(StubFetcher),
        workflow,
    ));

    Harness {
        pool,
        store,
        runner,
        transport: setup.transport,
        paths,
        dir,
    }
}

impl Harness {
    /// Store a file in the upload directory and describe it as an upload.
    pub fn upload(&self, stored_name: &str, content: &[u8], class: FileClass) -> UploadedFile {
        std::fs::write(self.paths.path_for(stored_name), content).unwrap();
        UploadedFile {
            filename: stored_name.to_string(),
            stored_filename: stored_name.to_string(),
            url: self.paths.url_for(stored_name),
            extension: stored_name.rsplit('.').next().unwrap().to_string(),
            file_type: class,
            size: content.len() as u64,
            hash: mediaflow_core::hashing::sha256_hex(content),
            deduplicated: false,
        }
    }

    pub async fn conversation(&self) -> EntityId {
        ConversationRepo::create(&self.pool, None, Some("test")).await.unwrap().id
    }

    /// Create a pending job and run it to completion.
    pub async fn run(&self, conversation_id: Option<EntityId>, kind: JobKind) -> Job {
        let job = self
            .store
            .create(&CreateJob {
                title: "test".into(),
                endpoint: PENDING_ENDPOINT.into(),
                params: json!({}),
                conversation_id,
                message_id: None,
            })
            .await
            .unwrap();
        assert_eq!(job.progress, 0);

        self.runner.spawn(job.id, conversation_id, kind).await.unwrap();
        self.store.get(job.id).await.unwrap().unwrap()
    }

    pub async fn run_message(&self, message: &str, uploads: Vec<UploadedFile>) -> Job {
        self.run(
            None,
            JobKind::Intent {
                message: message.to_string(),
                uploads,
            },
        )
        .await
    }
}
