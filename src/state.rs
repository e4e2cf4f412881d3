use crate::{
    config::Config,
    redis_client::RedisClient,
    services::{notification_producer::NotificationProducer, presence_service::PresenceTracker},
    websocket::{typing::TypingTracker, ConnectionRegistry},
};
use db_pool::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub registry: ConnectionRegistry,
    pub redis: RedisClient,
    pub config: Arc<Config>,
    /// Presence Tracker: connection lifecycle -> status broadcasts
    pub presence: Arc<PresenceTracker>,
    /// Self-expiring typing indicators
    pub typing: TypingTracker,
    /// Kafka producer for push notification events (None when Kafka is not configured)
    pub notifications: Option<Arc<NotificationProducer>>,
}
