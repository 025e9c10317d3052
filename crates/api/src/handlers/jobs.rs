//! Handlers for the `/jobs` resource.

use axum::extract::{Path, Query, State};
use axum::Json;
use mediaflow_core::error::CoreError;
use mediaflow_core::types::EntityId;
use mediaflow_db::models::job::Job;

use crate::error::{AppError, AppResult};
use crate::query::LimitParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/jobs
///
/// Most recent jobs first, at most `JOB_LIST_LIMIT`.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> AppResult<Json<DataResponse<Vec<Job>>>> {
    let max = state.config.job_list_limit.max(1);
    let limit = params.limit.unwrap_or(max).clamp(1, max);
    let jobs = state.runner.store().list(Some(limit)).await?;
    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/jobs/{id}
///
/// Poll one job. The record carries status, progress, status message and,
/// once completed, the result.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<EntityId>,
) -> AppResult<Json<DataResponse<Job>>> {
    let job = state
        .runner
        .store()
        .get(job_id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: job_id.to_string(),
            })
        })?;
    Ok(Json(DataResponse { data: job }))
}
