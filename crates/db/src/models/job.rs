//! Job entity model and DTOs.

use serde::Serialize;
use sqlx::FromRow;
use mediaflow_core::types::{EntityId, Timestamp};

use super::status::JobStatus;

/// Operation identifier a job carries until intent resolution sets it.
pub const PENDING_ENDPOINT: &str = "pending";

/// Status message of a freshly created job.
pub const INITIAL_STATUS_MESSAGE: &str = "Initialized";

/// A row from the `jobs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Job {
    pub id: EntityId,
    pub title: String,
    pub endpoint: String,
    pub params: serde_json::Value,
    pub status: JobStatus,
    pub progress: i64,
    pub status_message: String,
    pub result: Option<serde_json::Value>,
    pub conversation_id: Option<EntityId>,
    pub message_id: Option<EntityId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Input for creating a pending job.
#[derive(Debug, Clone)]
pub struct CreateJob {
    pub title: String,
    pub endpoint: String,
    pub params: serde_json::Value,
    pub conversation_id: Option<EntityId>,
    pub message_id: Option<EntityId>,
}
