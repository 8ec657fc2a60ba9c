use crate::hub::RoomHub;

/// Derived per-room viewer count.
///
/// Always reflects the hub's membership set at read time; it never tracks
/// the join/leave notification stream, so it cannot drift even when a
/// client observes those events out of order.
#[derive(Clone)]
pub struct PresenceCounter {
    hub: RoomHub,
}

impl PresenceCounter {
    pub fn new(hub: RoomHub) -> Self {
        Self { hub }
    }

    pub async fn count(&self, room_id: &str) -> usize {
        self.hub.presence(room_id).await
    }
}
