use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound WebSocket events from client to server
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WsInboundEvent {
    /// Client started composing; refreshes the server-side typing timer
    #[serde(rename = "typing.start")]
    TypingStart { room_id: Uuid },

    /// Client explicitly stopped composing before the timer expired
    #[serde(rename = "typing.stop")]
    TypingStop { room_id: Uuid },

    /// Acknowledge delivery of a stream entry
    #[serde(rename = "ack")]
    Ack { msg_id: String, room_id: Uuid },

    /// Client-chosen presence status ("online" or "away")
    #[serde(rename = "presence.set")]
    PresenceSet { status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_typing_start() {
        let room = Uuid::new_v4();
        let json = format!(r#"{{"type":"typing.start","room_id":"{room}"}}"#);
        let evt: WsInboundEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(evt, WsInboundEvent::TypingStart { room_id } if room_id == room));
    }

    #[test]
    fn test_parse_ack() {
        let room = Uuid::new_v4();
        let json = format!(r#"{{"type":"ack","msg_id":"1700000000000-0","room_id":"{room}"}}"#);
        let evt: WsInboundEvent = serde_json::from_str(&json).unwrap();
        assert!(matches!(evt, WsInboundEvent::Ack { .. }));
    }

    #[test]
    fn test_unknown_event_rejected() {
        let json = r#"{"type":"no.such.event"}"#;
        assert!(serde_json::from_str::<WsInboundEvent>(json).is_err());
    }
}
