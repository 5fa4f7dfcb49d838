use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info};

use atrium_types::api::{SendMessageResponse, UploadResponse};
use atrium_types::models::{Message, NewMessage};
use atrium_types::{MessageId, RoomId, UserId};

use crate::cache::{room_messages_key, search_key, search_prefix};
use crate::error::ApiError;
use crate::ports::{MessageCache, MessageStore, Notifier, ObjectStore};

pub type AppState = Arc<MessageService>;

/// Longest accepted search query, in bytes.
pub const MAX_QUERY_LEN: usize = 256;

/// Most messages returned by a room listing.
pub const ROOM_LIST_LIMIT: u32 = 200;

/// Longest accepted text message, in bytes.
pub const MAX_CONTENT_LEN: usize = 4000;

const UPLOAD_NOTIFICATION: &str = "New file uploaded";
const MESSAGE_NOTIFICATION: &str = "New message";

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub data: Bytes,
    pub file_name: Option<String>,
}

/// Orchestrates the message endpoints over the four collaborators.
///
/// Each operation is a straight sequence of collaborator calls. Nothing is
/// retried or rolled back: a failure after the storage write leaves the
/// message persisted with the cache or notification step undone.
pub struct MessageService {
    store: Arc<dyn MessageStore>,
    objects: Arc<dyn ObjectStore>,
    cache: Arc<dyn MessageCache>,
    notifier: Arc<dyn Notifier>,
}

impl MessageService {
    pub fn new(
        store: Arc<dyn MessageStore>,
        objects: Arc<dyn ObjectStore>,
        cache: Arc<dyn MessageCache>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            objects,
            cache,
            notifier,
        }
    }

    pub async fn upload_file(
        &self,
        upload: FileUpload,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<UploadResponse, ApiError> {
        if self.store.find_user(user_id).await?.is_none() {
            return Err(ApiError::NotFound);
        }

        let file_url = self
            .objects
            .upload(upload.data, upload.file_name.as_deref())
            .await?;

        let message = self
            .store
            .save_message(NewMessage::file(
                user_id,
                room_id,
                file_url,
                upload.file_name.unwrap_or_default(),
            ))
            .await?;

        self.invalidate_room(room_id).await?;
        self.notifier.send(room_id, user_id, UPLOAD_NOTIFICATION).await?;

        info!(message_id = %message.id, room_id = %room_id, "File message created");

        Ok(UploadResponse {
            id: message.id,
            file_url: message.file_url.unwrap_or_default(),
        })
    }

    pub async fn send_message(
        &self,
        content: String,
        room_id: RoomId,
        user_id: UserId,
    ) -> Result<SendMessageResponse, ApiError> {
        if content.trim().is_empty() {
            return Err(ApiError::BadRequest("message content is empty".to_string()));
        }
        if content.len() > MAX_CONTENT_LEN {
            return Err(ApiError::BadRequest(format!(
                "message longer than {} bytes",
                MAX_CONTENT_LEN
            )));
        }

        if self.store.find_user(user_id).await?.is_none() {
            return Err(ApiError::NotFound);
        }

        let message = self
            .store
            .save_message(NewMessage::text(user_id, room_id, content))
            .await?;

        self.invalidate_room(room_id).await?;
        self.notifier.send(room_id, user_id, MESSAGE_NOTIFICATION).await?;

        info!(message_id = %message.id, room_id = %room_id, "Text message created");

        Ok(SendMessageResponse {
            id: message.id,
            sent: true,
        })
    }

    pub async fn search_messages(
        &self,
        query: &str,
        room_id: RoomId,
    ) -> Result<Vec<Message>, ApiError> {
        if query.len() > MAX_QUERY_LEN {
            return Err(ApiError::BadRequest(format!(
                "query longer than {} bytes",
                MAX_QUERY_LEN
            )));
        }

        let key = search_key(room_id, query);
        if let Some(cached) = self.cache.get(&key).await? {
            debug!("Cache hit: {}", key);
            return Ok(cached);
        }

        debug!("Cache miss: {}", key);
        let messages = self
            .store
            .find_by_room_and_content_containing(room_id, query)
            .await?;
        self.cache.set(&key, messages.clone()).await?;
        Ok(messages)
    }

    pub async fn delete_message(&self, message_id: MessageId) -> Result<(), ApiError> {
        let message = self
            .store
            .find_message(message_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        self.store.delete_message(message_id).await?;
        self.invalidate_room(message.room_id).await?;

        info!(message_id = %message_id, room_id = %message.room_id, "Message deleted");
        Ok(())
    }

    pub async fn list_room_messages(&self, room_id: RoomId) -> Result<Vec<Message>, ApiError> {
        let key = room_messages_key(room_id);
        if let Some(cached) = self.cache.get(&key).await? {
            debug!("Cache hit: {}", key);
            return Ok(cached);
        }

        debug!("Cache miss: {}", key);
        let messages = self.store.find_by_room(room_id, ROOM_LIST_LIMIT).await?;
        self.cache.set(&key, messages.clone()).await?;
        Ok(messages)
    }

    /// Drop the room's list entry and every cached search of the room.
    async fn invalidate_room(&self, room_id: RoomId) -> anyhow::Result<()> {
        self.cache.invalidate(&room_messages_key(room_id)).await?;
        self.cache.invalidate_prefix(&search_prefix(room_id)).await
    }
}
