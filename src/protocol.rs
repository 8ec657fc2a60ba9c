use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Inbound events from client to hub
///
/// Authorization for moderation events is enforced upstream; by the time a
/// `delete-message` reaches the hub it is pre-authorized.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "join-room")]
    JoinRoom { room_id: String },

    #[serde(rename = "leave-room")]
    LeaveRoom { room_id: String },

    #[serde(rename = "send-message")]
    SendMessage { room_id: String, text: String },

    #[serde(rename = "delete-message")]
    DeleteMessage { room_id: String, message_id: Uuid },
}

/// Outbound events from hub to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    /// Chat message in the room's ordered stream. Deleted messages keep
    /// their position and ship with `deleted: true` and empty text
    /// (tombstone rendering).
    #[serde(rename = "message")]
    Message {
        id: Uuid,
        room_id: String,
        author_id: Uuid,
        text: String,
        timestamp: DateTime<Utc>,
        #[serde(default)]
        deleted: bool,
    },

    /// Moderation tombstone referencing an already-delivered message.
    #[serde(rename = "message-deleted")]
    MessageDeleted { room_id: String, message_id: Uuid },

    #[serde(rename = "user-joined")]
    UserJoined { room_id: String },

    #[serde(rename = "user-left")]
    UserLeft { room_id: String },

    #[serde(rename = "presence-count")]
    PresenceCount { room_id: String, count: usize },

    /// Ephemeral activity (cart-add, heart, ...); bounded retention, never
    /// replayed after expiry.
    #[serde(rename = "activity")]
    Activity {
        room_id: String,
        kind: String,
        payload: JsonValue,
    },
}
