use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use atrium_types::events::RoomEvent;
use atrium_types::{RoomId, UserId};

use crate::ports::Notifier;

const CHANNEL_CAPACITY: usize = 1024;

/// Fans room events out to every subscriber.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    broadcast_tx: broadcast::Sender<RoomEvent>,
}

impl Dispatcher {
    pub fn new() -> Self {
        let (broadcast_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(DispatcherInner { broadcast_tx }),
        }
    }

    /// Subscribe to room events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.inner.broadcast_tx.subscribe()
    }

    /// Subscribe to the events of a single room.
    pub fn subscribe_room(&self, room_id: RoomId) -> RoomSubscription {
        RoomSubscription {
            room_id,
            rx: self.subscribe(),
        }
    }

    /// Broadcast an event. Having no subscribers is not an error.
    pub fn broadcast(&self, event: RoomEvent) {
        let room_id = event.room_id();
        match self.inner.broadcast_tx.send(event) {
            Ok(n) => debug!("Room {} event delivered to {} subscribers", room_id, n),
            Err(_) => debug!("Room {} event dropped, no subscribers", room_id),
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver that skips events of other rooms.
pub struct RoomSubscription {
    room_id: RoomId,
    rx: broadcast::Receiver<RoomEvent>,
}

impl RoomSubscription {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Next event of this room, or `None` once the dispatcher is gone.
    /// A lagging receiver loses the overwritten events and keeps going.
    pub async fn recv(&mut self) -> Option<RoomEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.room_id() == self.room_id => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(n)) => {
                    warn!("Room {} subscriber lagged by {} events", self.room_id, n);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[async_trait]
impl Notifier for Dispatcher {
    async fn send(&self, room_id: RoomId, user_id: UserId, text: &str) -> Result<()> {
        self.broadcast(RoomEvent::Notification {
            room_id,
            user_id,
            text: text.to_string(),
            timestamp: chrono::Utc::now(),
        });
        Ok(())
    }
}
