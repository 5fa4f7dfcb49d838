use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use atrium_types::RoomId;
use atrium_types::models::Message;

use crate::ports::MessageCache;

/// Key of a room's message list.
pub fn room_messages_key(room_id: RoomId) -> String {
    format!("room_{}_messages", room_id)
}

/// Key of a search result. The query is used verbatim.
pub fn search_key(room_id: RoomId, query: &str) -> String {
    format!("{}{}", search_prefix(room_id), query)
}

/// Prefix shared by every search key of a room. The trailing underscore keeps
/// room 1 from matching room 11.
pub fn search_prefix(room_id: RoomId) -> String {
    format!("search_{}_", room_id)
}

/// In-process cache. Unbounded: entries live until invalidated, so a room
/// holds one search entry per distinct query until its next write.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl MessageCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<Message>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, messages: Vec<Message>) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), messages);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
        self.entries.write().await.retain(|key, _| !key.starts_with(prefix));
        Ok(())
    }
}
