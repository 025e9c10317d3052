//! Repository for the `jobs` table.
//!
//! Every write after creation is a single guarded `UPDATE`: it only touches
//! rows still in `pending` or `processing`, and progress never moves
//! backwards. Writers learn whether the guard held from the returned flag.

use chrono::Utc;
use mediaflow_core::types::EntityId;

use crate::models::job::{CreateJob, Job, INITIAL_STATUS_MESSAGE};
use crate::models::status::JobStatus;
use crate::DbPool;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, title, endpoint, params, status, progress, status_message, result, \
    conversation_id, message_id, created_at, updated_at";

/// Rows a write may touch.
const ACTIVE_GUARD: &str = "status IN ('pending', 'processing')";

/// Maximum page size for job listing.
pub const MAX_LIMIT: i64 = 500;

/// Default page size for job listing.
pub const DEFAULT_LIMIT: i64 = 100;

/// Provides CRUD operations for background jobs.
pub struct JobRepo;

impl JobRepo {
    /// Insert a new pending job at progress 0.
    pub async fn create(pool: &DbPool, input: &CreateJob) -> Result<Job, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO jobs (id, title, endpoint, params, status, progress, status_message, \
                               conversation_id, message_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?, ?, ?) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(uuid::Uuid::new_v4())
            .bind(&input.title)
            .bind(&input.endpoint)
            .bind(&input.params)
            .bind(JobStatus::Pending)
            .bind(INITIAL_STATUS_MESSAGE)
            .bind(input.conversation_id)
            .bind(input.message_id)
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &DbPool, id: EntityId) -> Result<Option<Job>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = ?");
        sqlx::query_as::<_, Job>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Most recent jobs first. `limit` is clamped to `1..=MAX_LIMIT`.
    pub async fn list_recent(pool: &DbPool, limit: Option<i64>) -> Result<Vec<Job>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let query = format!(
            "SELECT {COLUMNS} FROM jobs ORDER BY created_at DESC, rowid DESC LIMIT ?"
        );
        sqlx::query_as::<_, Job>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Move the job to `processing` and record a milestone.
    ///
    /// Progress is raised to `progress` but never lowered. Returns `false`
    /// when the job is missing or already terminal.
    pub async fn update_progress(
        pool: &DbPool,
        id: EntityId,
        progress: i64,
        message: &str,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = ?, progress = MAX(progress, ?), status_message = ?, updated_at = ? \
             WHERE id = ? AND {ACTIVE_GUARD}"
        );
        let result = sqlx::query(&query)
            .bind(JobStatus::Processing)
            .bind(progress.clamp(0, 99))
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Replace the operation identifier and parameters once intent is known.
    pub async fn set_operation(
        pool: &DbPool,
        id: EntityId,
        endpoint: &str,
        params: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs SET endpoint = ?, params = ?, updated_at = ? \
             WHERE id = ? AND {ACTIVE_GUARD}"
        );
        let result = sqlx::query(&query)
            .bind(endpoint)
            .bind(params)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the job completed at progress 100 with its result.
    pub async fn complete(
        pool: &DbPool,
        id: EntityId,
        result: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = ?, progress = 100, status_message = ?, result = ?, updated_at = ? \
             WHERE id = ? AND {ACTIVE_GUARD}"
        );
        let outcome = sqlx::query(&query)
            .bind(JobStatus::Completed)
            .bind("Completed")
            .bind(result)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(outcome.rows_affected() > 0)
    }

    /// Mark the job failed. The message becomes its status message and any
    /// result is cleared.
    pub async fn fail(pool: &DbPool, id: EntityId, message: &str) -> Result<bool, sqlx::Error> {
        let query = format!(
            "UPDATE jobs \
             SET status = ?, status_message = ?, result = NULL, updated_at = ? \
             WHERE id = ? AND {ACTIVE_GUARD}"
        );
        let outcome = sqlx::query(&query)
            .bind(JobStatus::Failed)
            .bind(message)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;
        Ok(outcome.rows_affected() > 0)
    }
}
