//! Handler for `POST /api/process`.
//!
//! Accepts either `multipart/form-data` (`message`, optional
//! `conversation_id`, any number of file parts) or a JSON body
//! `{ "message": ..., "conversation_id": ... }`. The synchronous part only
//! stores uploads, records the user message and creates a pending job; the
//! work itself runs on the job runner.

use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use mediaflow_core::types::EntityId;
use mediaflow_core::uploads::UploadedFile;
use mediaflow_db::models::job::{CreateJob, PENDING_ENDPOINT};
use mediaflow_db::models::status::MessageRole;
use mediaflow_db::repositories::ConversationRepo;
use mediaflow_pipeline::JobKind;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Longest job title taken from a message.
const MAX_JOB_TITLE_CHARS: usize = 60;

/// JSON body of a text-only submission.
#[derive(Debug, Deserialize)]
pub struct ProcessRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub conversation_id: Option<EntityId>,
}

#[derive(Debug, Serialize)]
pub struct ProcessAccepted {
    pub job_id: EntityId,
    pub conversation_id: EntityId,
    pub uploaded_files: Vec<UploadedFile>,
}

/// POST /api/process
///
/// Returns 202 with the job id to poll.
pub async fn submit(
    State(state): State<AppState>,
    request: Request,
) -> AppResult<(StatusCode, Json<DataResponse<ProcessAccepted>>)> {
    let (body, uploads) = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        read_multipart(&state, multipart).await?
    } else {
        let Json(body) = Json::<ProcessRequest>::from_request(request, &state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        (body, Vec::new())
    };

    let message = body.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("message is required".to_string()));
    }

    // 1. Conversation and user message.
    let conversation =
        ConversationRepo::get_or_create(&state.pool, body.conversation_id, Some(message)).await?;
    let data = (!uploads.is_empty()).then(|| json!({ "uploaded_files": uploads }));
    let user_message = ConversationRepo::add_message(
        &state.pool,
        conversation.id,
        MessageRole::User,
        message,
        data.as_ref(),
    )
    .await?;

    // 2. Pending job, started in the background.
    let input = CreateJob {
        title: job_title(message),
        endpoint: PENDING_ENDPOINT.to_string(),
        params: json!({}),
        conversation_id: Some(conversation.id),
        message_id: Some(user_message.id),
    };
    let job = state
        .runner
        .submit(
            &input,
            JobKind::Intent {
                message: message.to_string(),
                uploads: uploads.clone(),
            },
        )
        .await?;

    tracing::info!(
        job_id = %job.id,
        conversation_id = %conversation.id,
        uploads = uploads.len(),
        "Processing request accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ProcessAccepted {
                job_id: job.id,
                conversation_id: conversation.id,
                uploaded_files: uploads,
            },
        }),
    ))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("multipart/form-data"))
}

/// Text fields become the request body; every part with a filename is
/// stored as an upload, in the order received.
async fn read_multipart(
    state: &AppState,
    mut multipart: Multipart,
) -> AppResult<(ProcessRequest, Vec<UploadedFile>)> {
    let mut body = ProcessRequest {
        message: String::new(),
        conversation_id: None,
    };
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if let Some(filename) = field.file_name().map(str::to_string) {
            if filename.is_empty() {
                continue;
            }
            let stored = state.uploads.save(&filename, std::pin::pin!(field)).await?;
            uploads.push(stored);
            continue;
        }

        let name = field.name().unwrap_or_default().to_string();
        let text = field
            .text()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        match name.as_str() {
            "message" => body.message = text,
            "conversation_id" if !text.trim().is_empty() => {
                let id = text
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("Invalid conversation_id: {text}")))?;
                body.conversation_id = Some(id);
            }
            _ => {}
        }
    }

    Ok((body, uploads))
}

fn job_title(message: &str) -> String {
    let mut title: String = message.chars().take(MAX_JOB_TITLE_CHARS).collect();
    if message.chars().count() > MAX_JOB_TITLE_CHARS {
        title.push('…');
    }
    title
}
