//! Kafka Notification Producer
//!
//! Publishes notification events to Kafka for the notification service to
//! consume and turn into push notifications. Publishing is best-effort:
//! a Kafka failure is logged and never fails the originating operation.

use chrono::Utc;
use event_schema::DomainEvent;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Notification event types matching the notification service's format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NotificationEventType {
    Message,
    RoomInvite,
}

impl std::fmt::Display for NotificationEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationEventType::Message => write!(f, "message"),
            NotificationEventType::RoomInvite => write!(f, "room_invite"),
        }
    }
}

/// Kafka notification event format matching the notification service's
/// expected schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaNotification {
    pub id: String,
    pub user_id: Uuid,
    pub event_type: NotificationEventType,
    pub title: String,
    pub body: String,
    pub data: Option<serde_json::Value>,
    pub priority: u8,
    pub timestamp: i64,
}

/// Producer for sending notification events to Kafka
#[derive(Clone)]
pub struct NotificationProducer {
    producer: FutureProducer,
    topic: String,
}

impl NotificationProducer {
    /// Create a new notification producer
    pub fn new(brokers: &str, topic: &str) -> Result<Self, String> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .set("retries", "3")
            .set("retry.backoff.ms", "100")
            .create()
            .map_err(|e| format!("Failed to create Kafka producer: {}", e))?;

        tracing::info!(
            brokers = %brokers,
            topic = %topic,
            "NotificationProducer initialized"
        );

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    /// Publish a message notification event
    ///
    /// Called after a message is persisted, once per recipient (the room's
    /// active members minus the sender).
    pub async fn publish_message_notification(
        &self,
        recipient_id: Uuid,
        sender_id: Uuid,
        room_id: Uuid,
        message_id: Uuid,
        message_preview: &str,
    ) -> Result<(), String> {
        let event = DomainEvent::MessageCreated {
            message_id,
            room_id,
            sender_id,
            content: String::new(),
            message_kind: "text".to_string(),
            created_at: Utc::now(),
        };

        let notification = KafkaNotification {
            id: Uuid::new_v4().to_string(),
            user_id: recipient_id,
            event_type: NotificationEventType::Message,
            title: "New message".to_string(),
            body: truncate_message_preview(message_preview, 100),
            data: Some(serde_json::json!({
                "sender_id": sender_id.to_string(),
                "room_id": room_id.to_string(),
                "message_id": message_id.to_string(),
                "object_id": room_id.to_string(),
                "object_type": "room",
            })),
            priority: event.priority(),
            timestamp: Utc::now().timestamp(),
        };

        self.publish(notification).await
    }

    /// Publish a room-invite notification (user added to a group)
    pub async fn publish_room_invite(
        &self,
        recipient_id: Uuid,
        added_by: Uuid,
        room_id: Uuid,
        room_name: &str,
    ) -> Result<(), String> {
        let event = DomainEvent::MemberAdded {
            room_id,
            user_id: recipient_id,
            added_by,
            role: "member".to_string(),
            added_at: Utc::now(),
        };

        let notification = KafkaNotification {
            id: Uuid::new_v4().to_string(),
            user_id: recipient_id,
            event_type: NotificationEventType::RoomInvite,
            title: "Added to room".to_string(),
            body: truncate_message_preview(room_name, 100),
            data: Some(serde_json::json!({
                "added_by": added_by.to_string(),
                "room_id": room_id.to_string(),
                "object_id": room_id.to_string(),
                "object_type": "room",
            })),
            priority: event.priority(),
            timestamp: Utc::now().timestamp(),
        };

        self.publish(notification).await
    }

    /// Publish a notification event to Kafka
    async fn publish(&self, notification: KafkaNotification) -> Result<(), String> {
        let payload = serde_json::to_string(&notification)
            .map_err(|e| format!("Failed to serialize notification: {}", e))?;

        let key = notification.user_id.to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, Duration::from_secs(5)).await {
            Ok((partition, offset)) => {
                tracing::debug!(
                    user_id = %notification.user_id,
                    event_type = %notification.event_type,
                    partition = partition,
                    offset = offset,
                    "Notification event published to Kafka"
                );
                Ok(())
            }
            Err((e, _)) => {
                tracing::error!(
                    error = %e,
                    user_id = %notification.user_id,
                    event_type = %notification.event_type,
                    "Failed to publish notification event to Kafka"
                );
                Err(format!("Failed to publish to Kafka: {}", e))
            }
        }
    }
}

/// Truncate message preview to a maximum length, adding ellipsis if needed
fn truncate_message_preview(message: &str, max_len: usize) -> String {
    if message.len() <= max_len {
        message.to_string()
    } else {
        let truncated: String = message.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_message_preview() {
        assert_eq!(truncate_message_preview("Hello", 100), "Hello");
        assert_eq!(truncate_message_preview("Hello world!", 8), "Hello...");
        assert_eq!(truncate_message_preview("Hi", 10), "Hi");
    }

    #[test]
    fn test_notification_event_type_display() {
        assert_eq!(NotificationEventType::Message.to_string(), "message");
        assert_eq!(NotificationEventType::RoomInvite.to_string(), "room_invite");
    }

    #[test]
    fn test_kafka_notification_serialization() {
        let notification = KafkaNotification {
            id: "test-id".to_string(),
            user_id: Uuid::nil(),
            event_type: NotificationEventType::Message,
            title: "New message".to_string(),
            body: "Hello!".to_string(),
            data: Some(serde_json::json!({"key": "value"})),
            priority: 3,
            timestamp: 1234567890,
        };

        let json = serde_json::to_string(&notification).unwrap();
        assert!(json.contains("\"event_type\":\"Message\""));
        assert!(json.contains("\"priority\":3"));
    }
}
