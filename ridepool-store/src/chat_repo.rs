use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ridepool_domain::chat::ChatMessage;
use ridepool_domain::repository::{ChatRepository, RepoError};

pub struct PgChatRepository {
    pool: PgPool,
}

impl PgChatRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ChatMessageRow {
    id: Uuid,
    ride_id: Uuid,
    sender_id: Uuid,
    sender_name: String,
    text: String,
    sent_at: DateTime<Utc>,
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        ChatMessage {
            id: row.id,
            ride_id: row.ride_id,
            sender_id: row.sender_id,
            sender_name: row.sender_name,
            text: row.text,
            sent_at: row.sent_at,
        }
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn append_message(&self, message: &ChatMessage) -> Result<(), RepoError> {
        sqlx::query(
            "INSERT INTO chat_messages (id, ride_id, sender_id, sender_name, text, sent_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(message.id)
        .bind(message.ride_id)
        .bind(message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.text)
        .bind(message.sent_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ride_history(&self, ride_id: Uuid) -> Result<Vec<ChatMessage>, RepoError> {
        let rows: Vec<ChatMessageRow> = sqlx::query_as(
            "SELECT id, ride_id, sender_id, sender_name, text, sent_at \
             FROM chat_messages WHERE ride_id = $1 ORDER BY sent_at ASC",
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ChatMessage::from).collect())
    }
}
