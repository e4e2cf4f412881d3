// In-process integration of the realtime fan-out path: event -> envelope ->
// registry delivery, plus typing expiry wired to a live registry. External
// collaborators (Postgres, Redis, Kafka) are exercised by the service's
// deployment smoke tests, not here.

use chat_relay_service::models::message::MessageEnvelope;
use chat_relay_service::websocket::events::WebSocketEvent;
use chat_relay_service::websocket::typing::TypingTracker;
use chat_relay_service::websocket::ConnectionRegistry;
use serde_json::json;
use std::time::Duration;
use uuid::Uuid;

/// Serialize an event the way broadcast_event does before handing the
/// payload to the streams pipeline.
fn envelope_for(room_id: Uuid, sender_id: Uuid, event: &WebSocketEvent) -> MessageEnvelope {
    let mut payload = serde_json::to_value(event).unwrap();
    payload
        .as_object_mut()
        .unwrap()
        .insert("sender_id".into(), json!(sender_id.to_string()));
    MessageEnvelope::from_payload(room_id, payload).unwrap()
}

#[tokio::test]
async fn message_created_event_reaches_all_room_subscribers() {
    let registry = ConnectionRegistry::new();
    let room = Uuid::new_v4();
    let sender = Uuid::new_v4();

    let (_id_a, mut rx_a) = registry.add_subscriber(room).await;
    let (_id_b, mut rx_b) = registry.add_subscriber(room).await;

    let event = WebSocketEvent::MessageCreated {
        message_id: Uuid::new_v4(),
        sender_id: sender,
        content: "hello room".into(),
        kind: "text".into(),
        sequence_number: 1,
        reply_to_id: None,
        created_at: chrono::Utc::now(),
    };

    let envelope = envelope_for(room, sender, &event);
    registry.broadcast(room, envelope.to_json().unwrap()).await;

    for rx in [&mut rx_a, &mut rx_b] {
        let raw = rx.recv().await.expect("subscriber should receive payload");
        let parsed = MessageEnvelope::from_json(&raw).unwrap();
        assert_eq!(parsed.room_id, room);
        assert_eq!(parsed.event_type(), Some("message.created"));
        assert_eq!(parsed.sender_id(), Some(sender));
    }
}

#[tokio::test]
async fn departed_subscriber_no_longer_receives_events() {
    let registry = ConnectionRegistry::new();
    let room = Uuid::new_v4();

    let (id_a, mut rx_a) = registry.add_subscriber(room).await;
    let (_id_b, mut rx_b) = registry.add_subscriber(room).await;

    registry.remove_subscriber(room, id_a).await;
    registry.broadcast(room, "after-leave".into()).await;

    assert!(rx_b.recv().await.is_some());
    // Sender side of the removed subscription is dropped by the registry
    assert!(rx_a.try_recv().is_err());
}

#[tokio::test]
async fn typing_expiry_broadcasts_stop_to_room() {
    let registry = ConnectionRegistry::new();
    let tracker = TypingTracker::new(Duration::from_millis(30));
    let room = Uuid::new_v4();
    let typist = Uuid::new_v4();

    let (_id, mut rx) = registry.add_subscriber(room).await;

    let expire_registry = registry.clone();
    tracker
        .start(room, typist, async move {
            let stopped = WebSocketEvent::TypingStopped { user_id: typist };
            let envelope = MessageEnvelope::from_payload(
                room,
                serde_json::to_value(&stopped).unwrap(),
            )
            .unwrap();
            expire_registry
                .broadcast(room, envelope.to_json().unwrap())
                .await;
        })
        .await;

    let raw = tokio::time::timeout(Duration::from_millis(500), rx.recv())
        .await
        .expect("expiry should fire within TTL")
        .expect("payload");

    let parsed = MessageEnvelope::from_json(&raw).unwrap();
    assert_eq!(parsed.event_type(), Some("typing.stopped"));
}

#[tokio::test]
async fn explicit_typing_stop_suppresses_expiry_broadcast() {
    let registry = ConnectionRegistry::new();
    let tracker = TypingTracker::new(Duration::from_millis(30));
    let room = Uuid::new_v4();
    let typist = Uuid::new_v4();

    let (_id, mut rx) = registry.add_subscriber(room).await;

    let expire_registry = registry.clone();
    tracker
        .start(room, typist, async move {
            expire_registry.broadcast(room, "expired".into()).await;
        })
        .await;

    assert!(tracker.stop(room, typist).await);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn stream_id_is_reflected_into_payload_for_acks() {
    // Clients ack with the stream entry id they saw in the payload; the
    // listener stamps it before delivery.
    let room = Uuid::new_v4();
    let mut envelope =
        MessageEnvelope::from_payload(room, json!({"type": "message.created"})).unwrap();
    envelope.set_stream_id("1700000000000-7".into());

    let raw = envelope.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(value["stream_id"], "1700000000000-7");
}
