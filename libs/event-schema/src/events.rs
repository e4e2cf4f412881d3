use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outbox::priority;

/// Domain events enumeration covering the chat delivery surface
///
/// This enum provides a type-safe way to work with domain events across
/// the system, ensuring consistent event handling and priority assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DomainEvent {
    // ============================================================================
    // MESSAGE EVENTS
    // ============================================================================
    MessageCreated {
        message_id: Uuid,
        room_id: Uuid,
        sender_id: Uuid,
        content: String,
        message_kind: String,
        created_at: DateTime<Utc>,
    },

    MessageEdited {
        message_id: Uuid,
        room_id: Uuid,
        new_content: String,
        edited_at: DateTime<Utc>,
    },

    MessageDeleted {
        message_id: Uuid,
        room_id: Uuid,
        deleted_at: DateTime<Utc>,
    },

    MessageRead {
        room_id: Uuid,
        user_id: Uuid,
        read_at: DateTime<Utc>,
    },

    // ============================================================================
    // ROOM EVENTS
    // ============================================================================
    RoomCreated {
        room_id: Uuid,
        kind: String,
        created_by: Uuid,
        created_at: DateTime<Utc>,
    },

    MemberAdded {
        room_id: Uuid,
        user_id: Uuid,
        added_by: Uuid,
        role: String,
        added_at: DateTime<Utc>,
    },

    MemberRemoved {
        room_id: Uuid,
        user_id: Uuid,
        removed_by: Uuid,
        removed_at: DateTime<Utc>,
    },

    // ============================================================================
    // PRESENCE EVENTS
    // ============================================================================
    PresenceChanged {
        user_id: Uuid,
        status: String,
        last_seen_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    /// Id of the aggregate the event belongs to (partition key for Kafka)
    pub fn aggregate_id(&self) -> Uuid {
        match self {
            DomainEvent::MessageCreated { room_id, .. }
            | DomainEvent::MessageEdited { room_id, .. }
            | DomainEvent::MessageDeleted { room_id, .. }
            | DomainEvent::MessageRead { room_id, .. }
            | DomainEvent::RoomCreated { room_id, .. }
            | DomainEvent::MemberAdded { room_id, .. }
            | DomainEvent::MemberRemoved { room_id, .. } => *room_id,
            DomainEvent::PresenceChanged { user_id, .. } => *user_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::MessageCreated { .. } => "MessageCreated",
            DomainEvent::MessageEdited { .. } => "MessageEdited",
            DomainEvent::MessageDeleted { .. } => "MessageDeleted",
            DomainEvent::MessageRead { .. } => "MessageRead",
            DomainEvent::RoomCreated { .. } => "RoomCreated",
            DomainEvent::MemberAdded { .. } => "MemberAdded",
            DomainEvent::MemberRemoved { .. } => "MemberRemoved",
            DomainEvent::PresenceChanged { .. } => "PresenceChanged",
        }
    }

    /// Get the priority for this event
    /// Critical events need immediate delivery, low-priority can be batched
    pub fn priority(&self) -> u8 {
        match self {
            DomainEvent::MessageCreated { .. } => priority::CRITICAL,
            DomainEvent::RoomCreated { .. }
            | DomainEvent::MemberAdded { .. }
            | DomainEvent::MemberRemoved { .. } => priority::HIGH,
            DomainEvent::MessageEdited { .. }
            | DomainEvent::MessageDeleted { .. }
            | DomainEvent::MessageRead { .. } => priority::NORMAL,
            DomainEvent::PresenceChanged { .. } => priority::LOW,
        }
    }

    /// Whether the notification service should turn this event into a push
    pub fn triggers_notification(&self) -> bool {
        matches!(
            self,
            DomainEvent::MessageCreated { .. } | DomainEvent::MemberAdded { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_created_event() {
        let room_id = Uuid::new_v4();
        let event = DomainEvent::MessageCreated {
            message_id: Uuid::new_v4(),
            room_id,
            sender_id: Uuid::new_v4(),
            content: "Test".to_string(),
            message_kind: "text".to_string(),
            created_at: Utc::now(),
        };

        assert_eq!(event.aggregate_id(), room_id);
        assert_eq!(event.event_type(), "MessageCreated");
        assert_eq!(event.priority(), priority::CRITICAL);
        assert!(event.triggers_notification());
    }

    #[test]
    fn test_presence_changed_event() {
        let user_id = Uuid::new_v4();
        let event = DomainEvent::PresenceChanged {
            user_id,
            status: "offline".to_string(),
            last_seen_at: Utc::now(),
        };

        assert_eq!(event.aggregate_id(), user_id);
        assert_eq!(event.event_type(), "PresenceChanged");
        assert_eq!(event.priority(), priority::LOW);
        assert!(!event.triggers_notification());
    }

    #[test]
    fn test_event_serialization() {
        let event = DomainEvent::MessageCreated {
            message_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "Test".to_string(),
            message_kind: "text".to_string(),
            created_at: Utc::now(),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"MessageCreated\""));

        let deserialized: DomainEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event.event_type(), deserialized.event_type());
    }

    #[test]
    fn test_priority_levels() {
        let critical_event = DomainEvent::MessageCreated {
            message_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "Test".to_string(),
            message_kind: "text".to_string(),
            created_at: Utc::now(),
        };

        let high_event = DomainEvent::MemberAdded {
            room_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            added_by: Uuid::new_v4(),
            role: "member".to_string(),
            added_at: Utc::now(),
        };

        let normal_event = DomainEvent::MessageEdited {
            message_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            new_content: "Edited".to_string(),
            edited_at: Utc::now(),
        };

        let low_event = DomainEvent::PresenceChanged {
            user_id: Uuid::new_v4(),
            status: "away".to_string(),
            last_seen_at: Utc::now(),
        };

        assert_eq!(critical_event.priority(), priority::CRITICAL);
        assert_eq!(high_event.priority(), priority::HIGH);
        assert_eq!(normal_event.priority(), priority::NORMAL);
        assert_eq!(low_event.priority(), priority::LOW);
    }
}
