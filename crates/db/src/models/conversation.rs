//! Conversation and message models.

use serde::Serialize;
use sqlx::FromRow;
use mediaflow_core::types::{EntityId, Timestamp};

use super::status::MessageRole;

/// A row from the `conversations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Conversation {
    pub id: EntityId,
    pub title: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A row from the `messages` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: EntityId,
    pub conversation_id: EntityId,
    pub role: MessageRole,
    pub text: String,
    /// Structured payload, e.g. the job result on assistant messages.
    pub data: Option<serde_json::Value>,
    pub created_at: Timestamp,
}

/// A conversation with its messages in order, for history views.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}
