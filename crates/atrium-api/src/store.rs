use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use tracing::warn;

use atrium_db::Database;
use atrium_db::models::{MessageRow, NewMessageRow, UserRow};
use atrium_types::models::{Message, MessageKind, NewMessage, User};
use atrium_types::{MessageId, RoomId, UserId};

use crate::ports::MessageStore;

/// `MessageStore` backed by the SQLite database. Every call runs on the
/// blocking pool so the async runtime never waits on the connection lock.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Database>,
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Database) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || f(&db))
            .await
            .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = self.blocking(move |db| db.get_user_by_id(id.get())).await?;
        row.map(user_from_row).transpose()
    }

    async fn find_message(&self, id: MessageId) -> Result<Option<Message>> {
        let row = self.blocking(move |db| db.get_message(id.get())).await?;
        row.map(message_from_row).transpose()
    }

    async fn save_message(&self, msg: NewMessage) -> Result<Message> {
        let row = self
            .blocking(move |db| {
                db.insert_message(&NewMessageRow {
                    user_id: msg.user_id.get(),
                    room_id: msg.room_id.get(),
                    file_url: msg.file_url.as_deref(),
                    kind: msg.kind.as_str(),
                    content: &msg.content,
                })
            })
            .await?;
        message_from_row(row)
    }

    async fn delete_message(&self, id: MessageId) -> Result<()> {
        let deleted = self.blocking(move |db| db.delete_message(id.get())).await?;
        if !deleted {
            warn!("Message {} was already gone at delete time", id);
        }
        Ok(())
    }

    async fn find_by_room_and_content_containing(
        &self,
        room_id: RoomId,
        text: &str,
    ) -> Result<Vec<Message>> {
        let text = text.to_string();
        let rows = self
            .blocking(move |db| db.search_messages(room_id.get(), &text))
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }

    async fn find_by_room(&self, room_id: RoomId, limit: u32) -> Result<Vec<Message>> {
        let rows = self
            .blocking(move |db| db.get_room_messages(room_id.get(), limit))
            .await?;
        rows.into_iter().map(message_from_row).collect()
    }
}

fn user_from_row(row: UserRow) -> Result<User> {
    let created_at = parse_timestamp(&row.created_at)
        .with_context(|| format!("Corrupt created_at on user {}", row.id))?;
    Ok(User {
        id: UserId::new(row.id)?,
        username: row.username,
        created_at,
    })
}

fn message_from_row(row: MessageRow) -> Result<Message> {
    let created_at = parse_timestamp(&row.created_at)
        .with_context(|| format!("Corrupt created_at on message {}", row.id))?;
    Ok(Message {
        id: MessageId::new(row.id)?,
        user_id: UserId::new(row.user_id)
            .with_context(|| format!("Corrupt user_id on message {}", row.id))?,
        room_id: RoomId::new(row.room_id)
            .with_context(|| format!("Corrupt room_id on message {}", row.id))?,
        file_url: row.file_url,
        kind: row.kind.parse::<MessageKind>().map_err(|e: String| anyhow!("Message {}: {}", row.id, e))?,
        content: row.content,
        created_at,
    })
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    raw.parse::<chrono::DateTime<chrono::Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            // Parse as naive UTC and convert.
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("unparseable timestamp '{}'", raw))
}
