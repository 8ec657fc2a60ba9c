use crate::error::{SessionError, SessionResult};
use crate::protocol::{ClientEvent, ServerEvent};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc::UnboundedSender, Mutex, RwLock};
use uuid::Uuid;

pub mod presence;
pub mod room;

pub use presence::PresenceCounter;
pub use room::{DeleteOutcome, StoredMessage};

use room::Room;

/// Room registry with ordered per-room fan-out
///
/// The outer map is only locked long enough to look up or create a room;
/// each room has its own lock held for the duration of applying one
/// operation (never across I/O), so operations on the same room are
/// totally ordered while different rooms proceed fully in parallel.
///
/// Membership and the message log are mutated only through these entry
/// points; connections never touch room state directly.
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<RwLock<HashMap<String, Arc<Mutex<Room>>>>>,
    activity_retention: usize,
}

impl RoomHub {
    pub fn new(activity_retention: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            activity_retention,
        }
    }

    /// Add a connection to a room, creating the room on first join.
    /// Idempotent. The joiner receives the room's history (deleted messages
    /// already tombstoned) and retained activity through `sender` before
    /// any subsequent broadcast.
    pub async fn join(
        &self,
        connection_id: Uuid,
        room_id: &str,
        sender: UnboundedSender<ServerEvent>,
    ) -> usize {
        loop {
            let room = self.room_or_create(room_id).await;
            let mut room = room.lock().await;
            // A concurrent cleanup may have dropped this entry between the
            // registry lookup and taking the room lock; retry against a
            // fresh entry rather than joining an orphan.
            if room.is_closed() {
                continue;
            }
            room.join(connection_id, sender.clone());
            return room.presence();
        }
    }

    /// Remove a connection from a room. Idempotent; unknown rooms and
    /// non-members are no-ops. Only rooms with no history are dropped from
    /// the registry: the message log and activity window outlive membership,
    /// so a late joiner still receives tombstone state even if the room
    /// emptied in between.
    pub async fn leave(&self, connection_id: Uuid, room_id: &str) {
        let Some(room) = self.room(room_id).await else {
            return;
        };

        let cleanup_candidate = {
            let mut room = room.lock().await;
            room.leave(connection_id);
            room.presence() == 0 && !room.has_history()
        };

        if cleanup_candidate {
            // Lock order is always map → room. The entry is marked closed
            // under the write lock before removal, so a join that already
            // cloned the old Arc observes the flag and retries.
            let mut rooms = self.rooms.write().await;
            if let Some(entry) = rooms.get(room_id) {
                let mut room = entry.lock().await;
                if room.presence() == 0 && !room.has_history() {
                    room.close();
                    drop(room);
                    rooms.remove(room_id);
                    tracing::debug!(%room_id, "removed idle room from registry");
                }
            }
        }
    }

    /// Append a message to the room's ordered log and deliver it to every
    /// current member in that order.
    pub async fn publish(
        &self,
        room_id: &str,
        author_id: Uuid,
        text: String,
    ) -> SessionResult<Uuid> {
        let room = self
            .room(room_id)
            .await
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;

        let mut room = room.lock().await;
        Ok(room.publish(author_id, text))
    }

    /// Apply a pre-authorized moderation delete. Idempotent: deleting an
    /// already-deleted message succeeds without a second tombstone.
    pub async fn delete(
        &self,
        room_id: &str,
        message_id: Uuid,
        actor_id: Uuid,
    ) -> SessionResult<DeleteOutcome> {
        let room = self
            .room(room_id)
            .await
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;

        let mut room = room.lock().await;
        match room.delete(message_id) {
            Some(outcome) => {
                tracing::info!(%room_id, %message_id, %actor_id, ?outcome, "moderation delete applied");
                Ok(outcome)
            }
            None => {
                tracing::warn!(%room_id, %message_id, %actor_id, "delete target not found");
                Err(SessionError::MessageNotFound(message_id))
            }
        }
    }

    /// Broadcast an ephemeral activity event (cart-add, heart, ...).
    pub async fn publish_activity(
        &self,
        room_id: &str,
        kind: String,
        payload: JsonValue,
        dedup_id: String,
    ) -> SessionResult<()> {
        let room = self
            .room(room_id)
            .await
            .ok_or_else(|| SessionError::RoomNotFound(room_id.to_string()))?;

        let mut room = room.lock().await;
        room.publish_activity(kind, payload, dedup_id);
        Ok(())
    }

    /// Apply one inbound client event. `delete-message` arrives
    /// pre-authorized; the capability check lives upstream.
    pub async fn apply(
        &self,
        connection_id: Uuid,
        sender: &UnboundedSender<ServerEvent>,
        event: ClientEvent,
    ) -> SessionResult<()> {
        match event {
            ClientEvent::JoinRoom { room_id } => {
                self.join(connection_id, &room_id, sender.clone()).await;
                Ok(())
            }
            ClientEvent::LeaveRoom { room_id } => {
                self.leave(connection_id, &room_id).await;
                Ok(())
            }
            ClientEvent::SendMessage { room_id, text } => {
                self.publish(&room_id, connection_id, text).await.map(|_| ())
            }
            ClientEvent::DeleteMessage {
                room_id,
                message_id,
            } => self
                .delete(&room_id, message_id, connection_id)
                .await
                .map(|_| ()),
        }
    }

    /// Live member count; zero for unknown rooms.
    pub async fn presence(&self, room_id: &str) -> usize {
        match self.room(room_id).await {
            Some(room) => room.lock().await.presence(),
            None => 0,
        }
    }

    /// Read one message's stored state (for moderation tooling and tests).
    pub async fn message(&self, room_id: &str, message_id: Uuid) -> Option<StoredMessage> {
        let room = self.room(room_id).await?;
        let room = room.lock().await;
        room.message(message_id).cloned()
    }

    async fn room(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    async fn room_or_create(&self, room_id: &str) -> Arc<Mutex<Room>> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(Room::new(
                    room_id.to_string(),
                    self.activity_retention,
                )))
            })
            .clone()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(100)
    }
}
