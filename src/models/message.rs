use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Message content kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
    Audio,
    System,
}

impl MessageKind {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "audio" => Some(Self::Audio),
            "system" => Some(Self::System),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::System => "system",
        }
    }
}

/// Message row matching the messages table
///
/// Edits and deletes are logical: `edited_at` / `deleted_at` tombstones,
/// never physical removal, so concurrent readers keep a stable order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub room_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: MessageKind,
    pub reply_to_id: Option<Uuid>,
    pub sequence_number: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub version_number: i32,
}

/// Envelope used for realtime fanout and Redis Streams persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    pub room_id: Uuid,
    #[serde(flatten)]
    pub data: Map<String, JsonValue>,
}

impl MessageEnvelope {
    /// Build an envelope from a JSON object representing the event payload.
    /// Automatically stamps `room_id` and ensures a `timestamp` field exists.
    pub fn from_payload(room_id: Uuid, payload: JsonValue) -> Result<Self, String> {
        let mut data = payload
            .as_object()
            .cloned()
            .ok_or_else(|| "event payload must be a JSON object".to_string())?;

        data.remove("stream_id");
        data.remove("room_id");

        // Ensure timestamp exists so downstream consumers have ordering context.
        if !data.contains_key("timestamp") {
            data.insert(
                "timestamp".to_string(),
                JsonValue::String(Utc::now().to_rfc3339()),
            );
        }

        Ok(Self {
            stream_id: None,
            room_id,
            data,
        })
    }

    /// Parse an envelope from the serialized JSON string stored in Redis Streams.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str::<MessageEnvelope>(payload)
    }

    /// Convert envelope to JSON string for storage / broadcast.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Set the stream identifier (after persisting to Redis Streams).
    pub fn set_stream_id(&mut self, id: String) {
        self.stream_id = Some(id.clone());
        // Reflect stream id into payload for backward compatibility.
        self.data
            .insert("stream_id".to_string(), JsonValue::String(id));
    }

    /// Retrieve the event type (if present).
    pub fn event_type(&self) -> Option<&str> {
        self.data.get("type").and_then(|v| v.as_str())
    }

    /// Retrieve the sender id if encoded in payload.
    pub fn sender_id(&self) -> Option<Uuid> {
        self.data
            .get("sender_id")
            .and_then(|v| v.as_str())
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_from_payload_stamps_fields() {
        let room_id = Uuid::new_v4();
        let envelope = MessageEnvelope::from_payload(
            room_id,
            json!({"type": "message.created", "sender_id": Uuid::new_v4().to_string()}),
        )
        .unwrap();

        assert_eq!(envelope.room_id, room_id);
        assert_eq!(envelope.event_type(), Some("message.created"));
        assert!(envelope.data.contains_key("timestamp"));
    }

    #[test]
    fn test_envelope_rejects_non_object_payload() {
        let err = MessageEnvelope::from_payload(Uuid::new_v4(), json!("just a string")).unwrap_err();
        assert!(err.contains("JSON object"));
    }

    #[test]
    fn test_envelope_json_round_trip_with_stream_id() {
        let room_id = Uuid::new_v4();
        let mut envelope =
            MessageEnvelope::from_payload(room_id, json!({"type": "typing.started"})).unwrap();
        envelope.set_stream_id("1700000000000-0".to_string());

        let json = envelope.to_json().unwrap();
        let parsed = MessageEnvelope::from_json(&json).unwrap();

        assert_eq!(parsed.room_id, room_id);
        assert_eq!(parsed.stream_id.as_deref(), Some("1700000000000-0"));
        assert_eq!(parsed.event_type(), Some("typing.started"));
    }

    #[test]
    fn test_envelope_sender_id_extraction() {
        let sender = Uuid::new_v4();
        let envelope = MessageEnvelope::from_payload(
            Uuid::new_v4(),
            json!({"type": "message.created", "sender_id": sender.to_string()}),
        )
        .unwrap();

        assert_eq!(envelope.sender_id(), Some(sender));
    }

    #[test]
    fn test_message_kind_round_trip() {
        for kind in [
            MessageKind::Text,
            MessageKind::Image,
            MessageKind::Audio,
            MessageKind::System,
        ] {
            assert_eq!(MessageKind::from_db(kind.to_db()), Some(kind));
        }
        assert_eq!(MessageKind::from_db("video"), None);
    }
}
