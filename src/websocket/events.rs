//! Unified realtime event definitions and fan-out entry point
//!
//! Every state change a client can observe in a room flows through
//! [`broadcast_event`]: it wraps the event in a [`MessageEnvelope`], stamps
//! the sender, and hands it to the Redis Streams pipeline. Local delivery
//! happens when the streams listener reads the entry back; if the publish
//! fails the event is delivered to local subscribers directly so a Redis
//! outage degrades to single-instance delivery instead of silence.

use crate::models::message::MessageEnvelope;
use crate::redis_client::RedisClient;
use crate::websocket::{streams, ConnectionRegistry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outbound realtime events, tagged the way clients switch on them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WebSocketEvent {
    #[serde(rename = "message.created")]
    MessageCreated {
        message_id: Uuid,
        sender_id: Uuid,
        content: String,
        kind: String,
        sequence_number: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        reply_to_id: Option<Uuid>,
        created_at: DateTime<Utc>,
    },

    #[serde(rename = "message.edited")]
    MessageEdited {
        message_id: Uuid,
        content: String,
        version_number: i32,
        edited_at: DateTime<Utc>,
    },

    #[serde(rename = "message.deleted")]
    MessageDeleted {
        message_id: Uuid,
        deleted_at: DateTime<Utc>,
    },

    #[serde(rename = "message.read")]
    MessageRead { user_id: Uuid, read_at: DateTime<Utc> },

    #[serde(rename = "member.joined")]
    MemberJoined { user_id: Uuid, role: String },

    #[serde(rename = "member.left")]
    MemberLeft { user_id: Uuid },

    #[serde(rename = "typing.started")]
    TypingStarted { user_id: Uuid },

    #[serde(rename = "typing.stopped")]
    TypingStopped { user_id: Uuid },

    #[serde(rename = "presence.changed")]
    PresenceChanged {
        user_id: Uuid,
        status: String,
        last_seen_at: DateTime<Utc>,
    },
}

/// Wrap an event in an envelope and publish it to the room's stream.
///
/// Falls back to direct local delivery when the stream publish fails.
pub async fn broadcast_event(
    registry: &ConnectionRegistry,
    redis: &RedisClient,
    room_id: Uuid,
    sender_id: Uuid,
    event: WebSocketEvent,
) -> Result<(), crate::error::AppError> {
    let mut payload = match serde_json::to_value(&event) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "event serialization failed");
            return Err(crate::error::AppError::Internal);
        }
    };

    if let Some(obj) = payload.as_object_mut() {
        obj.entry("sender_id".to_string())
            .or_insert_with(|| serde_json::Value::String(sender_id.to_string()));
    }

    let envelope = MessageEnvelope::from_payload(room_id, payload)
        .map_err(crate::error::AppError::BadRequest)?;

    match streams::publish_envelope(redis, &envelope).await {
        Ok(_entry_id) => Ok(()),
        Err(e) => {
            tracing::warn!(
                error = %e,
                room_id = %room_id,
                "stream publish failed, falling back to local delivery"
            );
            if let Ok(json) = envelope.to_json() {
                registry.broadcast(room_id, json).await;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_tag_names() {
        let event = WebSocketEvent::TypingStarted {
            user_id: Uuid::new_v4(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "typing.started");

        let event = WebSocketEvent::PresenceChanged {
            user_id: Uuid::new_v4(),
            status: "offline".to_string(),
            last_seen_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "presence.changed");
    }

    #[test]
    fn test_message_created_omits_absent_reply() {
        let event = WebSocketEvent::MessageCreated {
            message_id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            content: "hi".to_string(),
            kind: "text".to_string(),
            sequence_number: 7,
            reply_to_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("reply_to_id").is_none());
        assert_eq!(json["sequence_number"], 7);
    }

    #[test]
    fn test_event_round_trip() {
        let event = WebSocketEvent::MemberJoined {
            user_id: Uuid::new_v4(),
            role: "member".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: WebSocketEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, WebSocketEvent::MemberJoined { .. }));
    }
}
