use gatechat_models::ServerEvent;
use tokio::sync::broadcast;
use uuid::Uuid;

/// One fan-out unit. Sessions filter on `room_id` and drop events whose
/// `exclude_connection` matches their own connection id (presence/typing
/// events the origin already knows about).
#[derive(Debug, Clone)]
pub struct RoomEvent {
    pub room_id: String,
    pub exclude_connection: Option<Uuid>,
    pub event: ServerEvent,
}

/// Broadcast-based event bus for real-time dispatch.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RoomEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.sender.subscribe()
    }

    /// Deliver to every connection in the room, the origin included.
    pub fn broadcast(&self, room_id: &str, event: ServerEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(RoomEvent {
            room_id: room_id.to_string(),
            exclude_connection: None,
            event,
        });
    }

    /// Deliver to every connection in the room except the origin.
    pub fn broadcast_others(&self, room_id: &str, origin: Uuid, event: ServerEvent) {
        let _ = self.sender.send(RoomEvent {
            room_id: room_id.to_string(),
            exclude_connection: Some(origin),
            event,
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(4096)
    }
}
