use std::sync::Arc;
use std::time::Duration;

use mediaflow_core::browser::HeadlessBrowser;
use mediaflow_core::downloader::VideoDownloader;
use mediaflow_core::ffmpeg::Ffmpeg;
use mediaflow_core::media::MediaPaths;
use mediaflow_db::DbPool;
use mediaflow_pipeline::fetch::{MediaFetcher, YtDlpFetcher};
use mediaflow_pipeline::intent::ModelIntentExtractor;
use mediaflow_pipeline::local::LocalExecutor;
use mediaflow_pipeline::router::LocalOverrideRouter;
use mediaflow_pipeline::text_gen::{GeminiClient, TextGenerator};
use mediaflow_pipeline::tools::{MediaTools, SystemMediaTools};
use mediaflow_pipeline::{Dispatcher, JobRunner, JobStore, ScenarioRegistry, WorkflowEngine};
use mediaflow_toolkit::{RemoteDispatchClient, RemoteTransport, ReqwestTransport};

use crate::config::ServerConfig;
use crate::uploads::UploadStore;

/// Timeout of the remote reachability check behind `GET /health`.
pub const HEALTH_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    pub config: Arc<ServerConfig>,
    pub uploads: Arc<UploadStore>,
    /// Background job runner; owns the task tracker awaited on shutdown.
    pub runner: Arc<JobRunner>,
    pub scenarios: Arc<ScenarioRegistry>,
    /// Remote backend client, used for health reporting.
    pub toolkit: RemoteDispatchClient,
}

/// External collaborators the pipeline talks to. Production builds them
/// from configuration; tests substitute doubles.
pub struct Collaborators {
    pub transport: Arc<dyn RemoteTransport>,
    pub tools: Arc<dyn MediaTools>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub text: Option<Arc<dyn TextGenerator>>,
}

impl Collaborators {
    /// Real processes and HTTP clients as configured.
    pub fn from_config(config: &ServerConfig, paths: &MediaPaths) -> Self {
        let timeout = config.local_tool_timeout();
        let transport = Arc::new(ReqwestTransport::new(
            config.toolkit_api_url.clone(),
            config.toolkit_api_key.clone(),
        ));
        let tools = Arc::new(SystemMediaTools::new(
            Ffmpeg::new(config.ffmpeg_bin.clone(), timeout),
            HeadlessBrowser::new(config.browser_bin.clone(), timeout),
        ));
        let fetcher = Arc::new(YtDlpFetcher::new(
            VideoDownloader::new(config.ytdlp_bin.clone(), timeout),
            paths.clone(),
        ));
        let text = config.gemini_api_key.as_ref().map(|key| {
            Arc::new(GeminiClient::new(
                config.gemini_api_url.clone(),
                key.clone(),
                config.gemini_model.clone(),
            )) as Arc<dyn TextGenerator>
        });
        if text.is_none() {
            tracing::warn!("GEMINI_API_KEY not set, intent extraction uses keyword heuristics only");
        }

        Self {
            transport,
            tools,
            fetcher,
            text,
        }
    }
}

impl AppState {
    /// Wire the pipeline once at start-up.
    pub fn new(
        pool: DbPool,
        config: ServerConfig,
        scenarios: Arc<ScenarioRegistry>,
        collaborators: Collaborators,
    ) -> Self {
        let paths = MediaPaths::new(config.upload_dir.clone(), config.public_base_url.clone());
        let toolkit = RemoteDispatchClient::new(collaborators.transport, config.toolkit());

        let executor = LocalExecutor::new(collaborators.tools, paths.clone());
        let dispatcher = Arc::new(Dispatcher::new(
            LocalOverrideRouter::new(executor.clone()),
            toolkit.clone(),
        ));
        let workflow = Arc::new(WorkflowEngine::new(
            Arc::clone(&scenarios),
            dispatcher.clone(),
            executor,
            collaborators.text.clone(),
        ));
        let runner = Arc::new(JobRunner::new(
            JobStore::new(pool.clone()),
            dispatcher,
            Arc::new(ModelIntentExtractor::new(collaborators.text)),
            collaborators.fetcher,
            workflow,
        ));
        let uploads = Arc::new(UploadStore::new(pool.clone(), paths, config.max_upload_bytes));

        Self {
            pool,
            config: Arc::new(config),
            uploads,
            runner,
            scenarios,
            toolkit,
        }
    }
}
