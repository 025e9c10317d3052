//! Job and conversation writes used by the runner.
//!
//! Every job transition is one guarded `UPDATE`; a write that matches no
//! active row (missing or already terminal job) is reported as
//! [`CoreError::Conflict`].

use mediaflow_core::error::CoreError;
use mediaflow_core::types::EntityId;
use mediaflow_db::models::conversation::Message;
use mediaflow_db::models::job::{CreateJob, Job};
use mediaflow_db::models::status::MessageRole;
use mediaflow_db::repositories::{ConversationRepo, JobRepo};
use mediaflow_db::DbPool;
use serde_json::Value;

use crate::error::StoreError;

#[derive(Clone)]
pub struct JobStore {
    pool: DbPool,
}

impl JobStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn create(&self, input: &CreateJob) -> Result<Job, StoreError> {
        Ok(JobRepo::create(&self.pool, input).await?)
    }

    pub async fn get(&self, id: EntityId) -> Result<Option<Job>, StoreError> {
        Ok(JobRepo::find_by_id(&self.pool, id).await?)
    }

    pub async fn list(&self, limit: Option<i64>) -> Result<Vec<Job>, StoreError> {
        Ok(JobRepo::list_recent(&self.pool, limit).await?)
    }

    /// Record a milestone. Progress never decreases and stays below 100
    /// until completion.
    pub async fn progress(&self, id: EntityId, progress: i64, message: &str) -> Result<(), StoreError> {
        tracing::debug!(job_id = %id, progress, message, "Job progress");
        let updated = JobRepo::update_progress(&self.pool, id, progress, message).await?;
        guard(id, updated)
    }

    pub async fn set_operation(&self, id: EntityId, endpoint: &str, params: &Value) -> Result<(), StoreError> {
        let updated = JobRepo::set_operation(&self.pool, id, endpoint, params).await?;
        guard(id, updated)
    }

    pub async fn complete(&self, id: EntityId, result: &Value) -> Result<(), StoreError> {
        let updated = JobRepo::complete(&self.pool, id, result).await?;
        guard(id, updated)
    }

    pub async fn fail(&self, id: EntityId, message: &str) -> Result<(), StoreError> {
        let updated = JobRepo::fail(&self.pool, id, message).await?;
        guard(id, updated)
    }

    pub async fn assistant_message(
        &self,
        conversation_id: EntityId,
        text: &str,
        data: Option<&Value>,
    ) -> Result<Message, StoreError> {
        Ok(ConversationRepo::add_message(&self.pool, conversation_id, MessageRole::Assistant, text, data).await?)
    }
}

fn guard(id: EntityId, updated: bool) -> Result<(), StoreError> {
    if updated {
        Ok(())
    } else {
        Err(CoreError::Conflict(format!("job {id} is missing or already finished")).into())
    }
}
