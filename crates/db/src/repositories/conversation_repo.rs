//! Repository for `conversations` and `messages`.

use chrono::Utc;
use mediaflow_core::types::EntityId;

use crate::models::conversation::{Conversation, ConversationWithMessages, Message};
use crate::models::status::MessageRole;
use crate::DbPool;

const CONVERSATION_COLUMNS: &str = "id, title, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, conversation_id, role, text, data, created_at";

/// Longest title derived from a first message.
const MAX_TITLE_CHARS: usize = 80;

/// Maximum conversations returned by a history query.
pub const MAX_HISTORY_LIMIT: i64 = 200;

/// Default conversations returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

pub struct ConversationRepo;

impl ConversationRepo {
    pub async fn create(
        pool: &DbPool,
        id: Option<EntityId>,
        title: Option<&str>,
    ) -> Result<Conversation, sqlx::Error> {
        let now = Utc::now();
        let query = format!(
            "INSERT INTO conversations (id, title, created_at, updated_at) \
             VALUES (?, ?, ?, ?) \
             RETURNING {CONVERSATION_COLUMNS}"
        );
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id.unwrap_or_else(uuid::Uuid::new_v4))
            .bind(title.map(truncate_title))
            .bind(now)
            .bind(now)
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(
        pool: &DbPool,
        id: EntityId,
    ) -> Result<Option<Conversation>, sqlx::Error> {
        let query = format!("SELECT {CONVERSATION_COLUMNS} FROM conversations WHERE id = ?");
        sqlx::query_as::<_, Conversation>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Return the conversation with `id`, creating it when absent. With no
    /// id a new conversation is started.
    pub async fn get_or_create(
        pool: &DbPool,
        id: Option<EntityId>,
        title: Option<&str>,
    ) -> Result<Conversation, sqlx::Error> {
        if let Some(id) = id {
            if let Some(existing) = Self::find_by_id(pool, id).await? {
                return Ok(existing);
            }
        }
        Self::create(pool, id, title).await
    }

    /// Append a message and bump the conversation's `updated_at`.
    pub async fn add_message(
        pool: &DbPool,
        conversation_id: EntityId,
        role: MessageRole,
        text: &str,
        data: Option<&serde_json::Value>,
    ) -> Result<Message, sqlx::Error> {
        let now = Utc::now();
        let mut tx = pool.begin().await?;

        let query = format!(
            "INSERT INTO messages (id, conversation_id, role, text, data, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             RETURNING {MESSAGE_COLUMNS}"
        );
        let message = sqlx::query_as::<_, Message>(&query)
            .bind(uuid::Uuid::new_v4())
            .bind(conversation_id)
            .bind(role)
            .bind(text)
            .bind(data)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(conversation_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(message)
    }

    /// Messages of one conversation, oldest first.
    pub async fn list_messages(
        pool: &DbPool,
        conversation_id: EntityId,
    ) -> Result<Vec<Message>, sqlx::Error> {
        let query = format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages \
             WHERE conversation_id = ? \
             ORDER BY created_at ASC, rowid ASC"
        );
        sqlx::query_as::<_, Message>(&query)
            .bind(conversation_id)
            .fetch_all(pool)
            .await
    }

    /// Most recently active conversations with their messages.
    pub async fn list_history(
        pool: &DbPool,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationWithMessages>, sqlx::Error> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, MAX_HISTORY_LIMIT);
        let query = format!(
            "SELECT {CONVERSATION_COLUMNS} FROM conversations \
             ORDER BY updated_at DESC, rowid DESC LIMIT ?"
        );
        let conversations = sqlx::query_as::<_, Conversation>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await?;

        let mut history = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let messages = Self::list_messages(pool, conversation.id).await?;
            history.push(ConversationWithMessages {
                conversation,
                messages,
            });
        }
        Ok(history)
    }
}

fn truncate_title(title: &str) -> String {
    let trimmed = title.trim();
    if trimmed.chars().count() <= MAX_TITLE_CHARS {
        trimmed.to_string()
    } else {
        let mut cut: String = trimmed.chars().take(MAX_TITLE_CHARS).collect();
        cut.push('…');
        cut
    }
}
