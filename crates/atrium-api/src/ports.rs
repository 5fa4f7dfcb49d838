//! Narrow interfaces to the collaborators the message endpoints orchestrate.
//!
//! Every method returns `anyhow::Result`; failures are not recovered by the
//! endpoint layer and surface as internal errors.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use atrium_types::models::{Message, NewMessage, User};
use atrium_types::{MessageId, RoomId, UserId};

/// Persistent storage for users and messages.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    async fn find_message(&self, id: MessageId) -> Result<Option<Message>>;

    /// Persist a new message and return it with its storage-assigned id.
    async fn save_message(&self, msg: NewMessage) -> Result<Message>;

    async fn delete_message(&self, id: MessageId) -> Result<()>;

    /// Messages in `room_id` whose content contains `text` as a substring.
    async fn find_by_room_and_content_containing(
        &self,
        room_id: RoomId,
        text: &str,
    ) -> Result<Vec<Message>>;

    /// The latest `limit` messages of a room, oldest first.
    async fn find_by_room(&self, room_id: RoomId, limit: u32) -> Result<Vec<Message>>;
}

/// Durable blob storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` and return a URL it can be fetched from.
    async fn upload(&self, data: Bytes, file_name: Option<&str>) -> Result<String>;
}

/// Key/value cache of message lists.
#[async_trait]
pub trait MessageCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<Message>>>;

    async fn set(&self, key: &str, messages: Vec<Message>) -> Result<()>;

    async fn invalidate(&self, key: &str) -> Result<()>;

    /// Drop every entry whose key starts with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<()>;
}

/// Fire-and-forget room notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, room_id: RoomId, user_id: UserId, text: &str) -> Result<()>;
}
