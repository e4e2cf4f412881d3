pub mod message_service;
pub mod notification_producer;
pub mod presence_service;
pub mod room_service;

// Re-export key types for convenience
pub use message_service::MessageService;
pub use notification_producer::NotificationProducer;
pub use presence_service::{DebounceMap, PresenceTracker};
pub use room_service::RoomService;
