pub mod dispatch;
pub mod error;
pub mod events;
pub mod presence;
pub mod ratelimit;
pub mod rooms;
pub mod store;
pub mod token;

use std::sync::Arc;
use std::time::Instant;

use gatechat_db::DbPool;

use crate::events::EventBus;
use crate::presence::PresenceTracker;
use crate::ratelimit::RateLimitConfig;
use crate::rooms::RoomRegistry;

/// Shared state injected into every connection handler. Presence and the
/// database pool are the only shared mutable resources; everything else a
/// connection needs lives in its own session.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub presence: Arc<PresenceTracker>,
    pub event_bus: EventBus,
    pub rooms: RoomRegistry,
    pub config: AppConfig,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(db: DbPool, rooms: RoomRegistry, config: AppConfig) -> Self {
        Self {
            db,
            presence: Arc::new(PresenceTracker::new()),
            event_bus: EventBus::default(),
            rooms,
            config,
            started_at: Instant::now(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub signing_secret: String,
    /// How many messages to replay to a joining client.
    pub history_limit: i64,
    /// Retention window from message creation.
    pub message_ttl: chrono::Duration,
    pub rate_limit: RateLimitConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            signing_secret: String::new(),
            history_limit: 50,
            message_ttl: chrono::Duration::days(3),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
