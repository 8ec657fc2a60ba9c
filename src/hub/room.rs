use crate::protocol::ServerEvent;
use chrono::Utc;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// One slot in a room's append-only message log.
///
/// The sequence number is the slot's index in the log arena. Moderation
/// flips the monotonic `deleted` flag in place, so ordering and position
/// survive deletion.
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub id: Uuid,
    pub author_id: Uuid,
    pub text: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub deleted: bool,
}

impl StoredMessage {
    /// Wire rendering; deleted messages keep their slot but ship as
    /// tombstones with empty text.
    fn to_event(&self, room_id: &str) -> ServerEvent {
        ServerEvent::Message {
            id: self.id,
            room_id: room_id.to_string(),
            author_id: self.author_id,
            text: if self.deleted {
                String::new()
            } else {
                self.text.clone()
            },
            timestamp: self.timestamp,
            deleted: self.deleted,
        }
    }
}

/// Result of applying a moderation delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Flag flipped, one tombstone broadcast
    Deleted,
    /// Was already deleted; successful no-op, nothing broadcast
    AlreadyDeleted,
}

struct ActivityRecord {
    dedup_id: String,
    event: ServerEvent,
}

/// One broadcast room. All methods are called with the hub's per-room lock
/// held, so every operation on a room is applied in a single total order.
pub(crate) struct Room {
    room_id: String,
    members: HashMap<Uuid, UnboundedSender<ServerEvent>>,
    log: Vec<StoredMessage>,
    index: HashMap<Uuid, usize>,
    activity: VecDeque<ActivityRecord>,
    activity_ids: HashSet<String>,
    activity_retention: usize,
    closed: bool,
}

impl Room {
    pub(crate) fn new(room_id: String, activity_retention: usize) -> Self {
        Self {
            room_id,
            members: HashMap::new(),
            log: Vec::new(),
            index: HashMap::new(),
            activity: VecDeque::new(),
            activity_ids: HashSet::new(),
            activity_retention,
            closed: false,
        }
    }

    /// Mark this entry as dropped from the registry. A join that raced the
    /// cleanup and still holds the old `Arc` must go back through the
    /// registry for a fresh entry instead of landing in an orphan.
    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether a future joiner would be replayed anything. Rooms with
    /// history must outlive their membership; the log is never physically
    /// removed.
    pub(crate) fn has_history(&self) -> bool {
        !self.log.is_empty() || !self.activity.is_empty()
    }

    /// Add a member. Idempotent: re-joining while already a member is a
    /// no-op (no duplicate history replay, no duplicate join broadcast).
    ///
    /// A new member receives the message log (tombstone state included) and
    /// the retained activity window through its own channel before any
    /// later broadcast, then existing members see `user-joined` and
    /// everyone sees the updated `presence-count`.
    pub(crate) fn join(&mut self, connection_id: Uuid, sender: UnboundedSender<ServerEvent>) {
        if self.members.contains_key(&connection_id) {
            tracing::debug!(room_id = %self.room_id, %connection_id, "join ignored, already a member");
            return;
        }

        for message in &self.log {
            let _ = sender.send(message.to_event(&self.room_id));
        }
        for record in &self.activity {
            let _ = sender.send(record.event.clone());
        }

        self.broadcast(ServerEvent::UserJoined {
            room_id: self.room_id.clone(),
        });

        self.members.insert(connection_id, sender);
        self.broadcast_presence();

        tracing::debug!(
            room_id = %self.room_id,
            %connection_id,
            members = self.members.len(),
            "member joined"
        );
    }

    /// Remove a member. Idempotent. Returns true when the member was
    /// actually removed.
    pub(crate) fn leave(&mut self, connection_id: Uuid) -> bool {
        if self.members.remove(&connection_id).is_none() {
            return false;
        }

        self.broadcast(ServerEvent::UserLeft {
            room_id: self.room_id.clone(),
        });
        self.broadcast_presence();

        tracing::debug!(
            room_id = %self.room_id,
            %connection_id,
            members = self.members.len(),
            "member left"
        );
        true
    }

    /// Append a message to the log and fan it out in arrival order.
    pub(crate) fn publish(&mut self, author_id: Uuid, text: String) -> Uuid {
        let message = StoredMessage {
            id: Uuid::new_v4(),
            author_id,
            text,
            timestamp: Utc::now(),
            deleted: false,
        };
        let id = message.id;
        let event = message.to_event(&self.room_id);

        self.index.insert(id, self.log.len());
        self.log.push(message);
        self.broadcast(event);

        id
    }

    /// Apply a moderation delete. The flag is monotonic: once deleted, a
    /// message never becomes live again, and only the first delete
    /// broadcasts a tombstone.
    pub(crate) fn delete(&mut self, message_id: Uuid) -> Option<DeleteOutcome> {
        let seq = *self.index.get(&message_id)?;
        let message = &mut self.log[seq];

        if message.deleted {
            return Some(DeleteOutcome::AlreadyDeleted);
        }

        message.deleted = true;
        self.broadcast(ServerEvent::MessageDeleted {
            room_id: self.room_id.clone(),
            message_id,
        });

        Some(DeleteOutcome::Deleted)
    }

    /// Broadcast an ephemeral activity event. Duplicate dedup ids within
    /// the retained window are dropped; records past the most-recent-N
    /// window expire and are never replayed.
    pub(crate) fn publish_activity(&mut self, kind: String, payload: JsonValue, dedup_id: String) {
        if self.activity_ids.contains(&dedup_id) {
            tracing::debug!(room_id = %self.room_id, %dedup_id, "duplicate activity dropped");
            return;
        }

        let event = ServerEvent::Activity {
            room_id: self.room_id.clone(),
            kind,
            payload,
        };

        if self.activity.len() >= self.activity_retention {
            if let Some(expired) = self.activity.pop_front() {
                self.activity_ids.remove(&expired.dedup_id);
            }
        }
        self.activity_ids.insert(dedup_id.clone());
        self.activity.push_back(ActivityRecord {
            dedup_id,
            event: event.clone(),
        });

        self.broadcast(event);
    }

    pub(crate) fn presence(&self) -> usize {
        self.members.len()
    }

    pub(crate) fn message(&self, message_id: Uuid) -> Option<&StoredMessage> {
        self.index.get(&message_id).map(|&seq| &self.log[seq])
    }

    /// Send to every member, pruning senders whose receiving half is gone.
    fn broadcast(&mut self, event: ServerEvent) {
        let before = self.members.len();
        self.members
            .retain(|_, sender| sender.send(event.clone()).is_ok());
        let after = self.members.len();

        if before != after {
            tracing::debug!(
                room_id = %self.room_id,
                pruned = before - after,
                active = after,
                "dead members pruned during broadcast"
            );
        }
    }

    fn broadcast_presence(&mut self) {
        let event = ServerEvent::PresenceCount {
            room_id: self.room_id.clone(),
            count: self.members.len(),
        };
        self.broadcast(event);
    }
}
