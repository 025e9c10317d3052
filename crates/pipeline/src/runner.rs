//! Background job runner.
//!
//! One tracked task per submitted job. Milestones of an intent job:
//!
//! | progress | milestone |
//! |----------|-----------|
//! | 10 | request accepted by the worker |
//! | 20 | intent recognized |
//! | 25 | upload placeholders resolved |
//! | 30 → 50 | video-sharing URLs downloaded |
//! | 60 | operation dispatched |
//! | 90 | result packaged |
//! | 100 | completed |
//!
//! Every failure, including a panic inside the job, ends in `failed`.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use mediaflow_core::catalog;
use mediaflow_core::intent::CONFIDENCE_THRESHOLD;
use mediaflow_core::scenario::Step;
use mediaflow_core::types::{EntityId, Params};
use mediaflow_core::uploads::{resolve_placeholders, UploadedFile};
use mediaflow_db::models::job::{CreateJob, Job};
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;

use crate::dispatcher::OperationDispatcher;
use crate::error::{JobError, StoreError};
use crate::fetch::{replace_url, video_share_urls, MediaFetcher};
use crate::intent::IntentExtractor;
use crate::store::JobStore;
use crate::workflow::{StepObserver, WorkflowEngine};

const DOWNLOAD_START: i64 = 30;
const DOWNLOAD_END: i64 = 50;
const SCENARIO_START: i64 = 10;
const SCENARIO_END: i64 = 90;

/// What a job does once it runs.
#[derive(Debug, Clone)]
pub enum JobKind {
    /// Recognize an operation from a chat message and run it.
    Intent {
        message: String,
        uploads: Vec<UploadedFile>,
    },
    /// Run a registered scenario.
    Scenario { scenario_id: String, inputs: Params },
}

pub struct JobRunner {
    store: JobStore,
    dispatcher: Arc<dyn OperationDispatcher>,
    intent: Arc<dyn IntentExtractor>,
    fetcher: Arc<dyn MediaFetcher>,
    workflow: Arc<WorkflowEngine>,
    tracker: TaskTracker,
}

impl JobRunner {
    pub fn new(
        store: JobStore,
        dispatcher: Arc<dyn OperationDispatcher>,
        intent: Arc<dyn IntentExtractor>,
        fetcher: Arc<dyn MediaFetcher>,
        workflow: Arc<WorkflowEngine>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            intent,
            fetcher,
            workflow,
            tracker: TaskTracker::new(),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn workflow(&self) -> &Arc<WorkflowEngine> {
        &self.workflow
    }

    /// Tracker of in-flight job tasks, awaited on shutdown.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Create a pending job and start it in the background.
    pub async fn submit(self: &Arc<Self>, input: &CreateJob, kind: JobKind) -> Result<Job, StoreError> {
        let job = self.store.create(input).await?;
        tracing::info!(job_id = %job.id, endpoint = %job.endpoint, "Job submitted");
        self.spawn(job.id, job.conversation_id, kind);
        Ok(job)
    }

    /// Run an existing job on a tracked task.
    pub fn spawn(
        self: &Arc<Self>,
        job_id: EntityId,
        conversation_id: Option<EntityId>,
        kind: JobKind,
    ) -> JoinHandle<()> {
        let runner = Arc::clone(self);
        self.tracker.spawn(async move {
            runner.run(job_id, conversation_id, kind).await;
        })
    }

    /// Drive one job to a terminal state.
    pub async fn run(&self, job_id: EntityId, conversation_id: Option<EntityId>, kind: JobKind) {
        let work = async {
            match &kind {
                JobKind::Intent { message, uploads } => self.run_intent(job_id, message, uploads).await,
                JobKind::Scenario { scenario_id, inputs } => {
                    self.run_scenario(job_id, scenario_id, inputs.clone()).await
                }
            }
        };

        let outcome = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(job_id = %job_id, "Job task panicked");
                Err(JobError::Panicked)
            }
        };

        match outcome {
            Ok((summary, result)) => self.finish(job_id, conversation_id, &summary, result).await,
            Err(e) => self.abort(job_id, conversation_id, &e).await,
        }
    }

    async fn run_intent(
        &self,
        job_id: EntityId,
        message: &str,
        uploads: &[UploadedFile],
    ) -> Result<(String, Value), JobError> {
        // 1. Preparing.
        self.store.progress(job_id, 10, "Preparing request").await?;

        // 2. Intent.
        let intent = self.intent.extract(message, uploads).await;
        tracing::info!(
            job_id = %job_id,
            endpoint = ?intent.endpoint,
            confidence = intent.confidence,
            source = ?intent.source,
            "Intent extracted"
        );
        let endpoint = match intent.endpoint.as_deref() {
            Some(endpoint) if intent.is_actionable() => catalog::normalize_endpoint(endpoint),
            _ => {
                return Err(JobError::NoIntent(format!(
                    "Could not recognize a supported operation (confidence {:.2}, required {CONFIDENCE_THRESHOLD}). \
                     Please rephrase your request.",
                    intent.confidence
                )));
            }
        };
        let mut params = Value::Object(intent.params);
        self.store.set_operation(job_id, &endpoint, &params).await?;
        self.store
            .progress(job_id, 20, &format!("Recognized operation {endpoint}"))
            .await?;

        // 3. Upload placeholders.
        let unresolved = resolve_placeholders(&mut params, uploads);
        if !unresolved.is_empty() {
            tracing::warn!(job_id = %job_id, unresolved = ?unresolved, "Upload placeholders left unresolved");
        }
        self.store.progress(job_id, 25, "Resolved uploaded files").await?;

        // 4. Video-sharing URLs.
        let urls = video_share_urls(&params);
        if !urls.is_empty() {
            self.store
                .progress(job_id, DOWNLOAD_START, "Downloading remote video")
                .await?;
            let total = urls.len() as i64;
            for (i, url) in urls.iter().enumerate() {
                let local_url = self.fetcher.fetch(url).await?;
                tracing::info!(job_id = %job_id, url = %url, local_url = %local_url, "Remote video fetched");
                replace_url(&mut params, url, &local_url);

                let done = i as i64 + 1;
                let progress = DOWNLOAD_START + (DOWNLOAD_END - DOWNLOAD_START) * done / total;
                self.store
                    .progress(job_id, progress, &format!("Downloaded video {done}/{total}"))
                    .await?;
            }
            self.store.set_operation(job_id, &endpoint, &params).await?;
        }

        // 5. Dispatch.
        self.store
            .progress(job_id, 60, &format!("Processing with {endpoint}"))
            .await?;
        let params = match params {
            Value::Object(map) => map,
            _ => Params::new(),
        };
        let result = self.dispatcher.dispatch(&endpoint, params).await?;

        // 6. Package.
        self.store.progress(job_id, 90, "Packaging result").await?;
        Ok((format!("Operation {endpoint} completed."), result))
    }

    async fn run_scenario(
        &self,
        job_id: EntityId,
        scenario_id: &str,
        inputs: Params,
    ) -> Result<(String, Value), JobError> {
        self.store
            .progress(job_id, SCENARIO_START, &format!("Starting scenario {scenario_id}"))
            .await?;

        let observer = ProgressObserver {
            store: &self.store,
            job_id,
        };
        let results = self
            .workflow
            .execute_observed(scenario_id, inputs, &observer)
            .await?;

        self.store.progress(job_id, SCENARIO_END, "Packaging result").await?;
        Ok((
            format!("Scenario '{scenario_id}' completed."),
            Value::Object(results),
        ))
    }

    async fn finish(&self, job_id: EntityId, conversation_id: Option<EntityId>, summary: &str, result: Value) {
        if let Err(e) = self.store.complete(job_id, &result).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job completed");
            return;
        }
        tracing::info!(job_id = %job_id, "Job completed");

        if let Some(conversation_id) = conversation_id {
            let data = json!({ "job_id": job_id, "result": result });
            if let Err(e) = self.store.assistant_message(conversation_id, summary, Some(&data)).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record assistant message");
            }
        }
    }

    async fn abort(&self, job_id: EntityId, conversation_id: Option<EntityId>, error: &JobError) {
        let message = error.to_string();
        tracing::error!(job_id = %job_id, error = %message, "Job failed");

        if let Err(e) = self.store.fail(job_id, &message).await {
            tracing::error!(job_id = %job_id, error = %e, "Failed to mark job failed");
            return;
        }

        if let Some(conversation_id) = conversation_id {
            let data = json!({ "job_id": job_id, "error": message });
            if let Err(e) = self.store.assistant_message(conversation_id, &message, Some(&data)).await {
                tracing::error!(job_id = %job_id, error = %e, "Failed to record assistant message");
            }
        }
    }
}

/// Maps scenario steps onto the 10..90 progress band.
struct ProgressObserver<'a> {
    store: &'a JobStore,
    job_id: EntityId,
}

#[async_trait]
impl<'a> StepObserver for ProgressObserver<'a> {
    async fn step_started(&self, index: usize, total: usize, step: &Step) {
        let total = total.max(1) as i64;
        let progress = SCENARIO_START + (SCENARIO_END - SCENARIO_START) * index as i64 / total;
        let message = format!("Step {}/{total}: {}", index + 1, step.id);
        if let Err(e) = self.store.progress(self.job_id, progress, &message).await {
            tracing::warn!(job_id = %self.job_id, error = %e, "Failed to record step progress");
        }
    }
}
