//! Redis Streams-based event distribution
//!
//! Provides ordered, durable delivery of room events across instances. Each
//! room has its own stream; a shared fanout stream tells every instance
//! which entries to pick up and hand to its local subscribers.

use crate::{models::message::MessageEnvelope, redis_client::RedisClient as Client};
use redis::{aio::ConnectionManager, AsyncCommands};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::time::{self, Duration};
use uuid::Uuid;

/// Configuration for the Redis Streams consumer
pub struct StreamsConfig {
    /// Maximum age of fanout entries to keep (in ms)
    pub max_age_ms: u64,
    /// Batch size for reading messages
    pub batch_size: usize,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            max_age_ms: 24 * 60 * 60 * 1000, // 24 hours
            batch_size: 100,
        }
    }
}

/// Stream key naming convention
fn stream_key(room_id: Uuid) -> String {
    format!("stream:room:{}", room_id)
}

/// Fanout stream shared by all rooms
fn fanout_stream_key() -> String {
    "stream:fanout:all-rooms".to_string()
}

/// Global message counter for probabilistic stream trimming. Trimming on
/// every publish measurably slows Redis, so only every Nth entry trims.
static TRIM_COUNTER: AtomicU64 = AtomicU64::new(0);
const TRIM_INTERVAL: u64 = 100;

/// Publish an envelope to the room stream and announce it on the fanout
/// stream. Returns the room-stream entry id.
pub async fn publish_envelope(
    client: &Client,
    envelope: &MessageEnvelope,
) -> redis::RedisResult<String> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let key = stream_key(envelope.room_id);
    let envelope_json = envelope.to_json().map_err(|e| {
        redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "serialize message envelope",
            e.to_string(),
        ))
    })?;

    let entry_id: String = conn
        .xadd::<_, _, _, _, String>(
            &key,
            "*", // Auto-generate ID with current timestamp
            &[
                ("room_id", envelope.room_id.to_string().as_str()),
                ("payload", envelope_json.as_str()),
                (
                    "timestamp",
                    &chrono::Utc::now().timestamp_millis().to_string(),
                ),
            ],
        )
        .await?;

    // Announce on the fanout stream for listener pickup
    conn.xadd::<_, _, _, _, String>(
        fanout_stream_key(),
        "*",
        &[
            ("room_id", envelope.room_id.to_string().as_str()),
            ("stream_key", key.as_str()),
            ("entry_id", entry_id.as_str()),
        ],
    )
    .await?;

    let counter = TRIM_COUNTER.fetch_add(1, Ordering::Relaxed);
    if counter % TRIM_INTERVAL == 0 {
        // Non-blocking trim so the publish path never waits on maintenance
        let key_clone = key.clone();
        let redis_client = client.clone();

        tokio::spawn(async move {
            let mut trim_conn = match redis_client.get_multiplexed_async_connection().await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!("Failed to connect for stream trim: {:?}", e);
                    return;
                }
            };

            // Approximate trimming allows variance but is much faster
            if let Err(e) = redis::cmd("XTRIM")
                .arg(&key_clone)
                .arg("MAXLEN")
                .arg("~")
                .arg(50000)
                .query_async::<_, ()>(&mut trim_conn)
                .await
            {
                tracing::warn!("Failed to trim stream {}: {:?}", key_clone, e);
            }
        });
    }

    Ok(entry_id)
}

/// Trim old entries from the fanout stream (periodic maintenance)
pub async fn trim_old_messages(client: &Client, config: &StreamsConfig) -> redis::RedisResult<()> {
    let mut conn = client.get_multiplexed_async_connection().await?;
    let key = fanout_stream_key();

    // XTRIM MINID removes all entries older than the cutoff; ids are
    // timestamp-sequence so the cutoff is now - max_age
    let now_ms = chrono::Utc::now().timestamp_millis();
    let cutoff_ms = now_ms - config.max_age_ms as i64;

    let _: Result<(), _> = redis::cmd("XTRIM")
        .arg(&key)
        .arg("MINID")
        .arg("~")
        .arg(format!("{}-0", cutoff_ms))
        .query_async(&mut conn)
        .await;

    Ok(())
}

/// Listener that drains the fanout stream and delivers entries to this
/// instance's local subscribers.
pub async fn start_streams_listener(
    client: Client,
    registry: crate::websocket::ConnectionRegistry,
    config: StreamsConfig,
) -> redis::RedisResult<()> {
    let mut last_id = "$".to_string();
    let mut conn = client.get_multiplexed_async_connection().await?;
    let key = fanout_stream_key();

    loop {
        let read_result: redis::RedisResult<Vec<(String, HashMap<String, String>)>> =
            redis::cmd("XREAD")
                .arg("BLOCK")
                .arg("5000") // Block for 5 seconds
                .arg("COUNT")
                .arg(config.batch_size)
                .arg("STREAMS")
                .arg(&key)
                .arg(&last_id)
                .query_async(&mut conn)
                .await;

        match read_result {
            Ok(messages) => {
                for (stream_id, fields) in messages {
                    if let Some(room_id_str) = fields.get("room_id") {
                        if let Ok(room_id) = Uuid::parse_str(room_id_str) {
                            if let Some(stream_key_name) = fields.get("stream_key") {
                                let entry_id = fields.get("entry_id").cloned().unwrap_or_default();
                                if let Ok(msg_data) =
                                    fetch_stream_entry(&mut conn, stream_key_name, &entry_id).await
                                {
                                    let payload = match MessageEnvelope::from_json(&msg_data) {
                                        Ok(mut envelope) => {
                                            envelope.set_stream_id(entry_id.clone());
                                            envelope.to_json().unwrap_or(msg_data.clone())
                                        }
                                        Err(_) => msg_data.clone(),
                                    };

                                    registry.broadcast(room_id, payload).await;
                                }
                            }
                        } else {
                            tracing::warn!("Invalid room_id in fanout entry: {}", room_id_str);
                        }
                    }

                    last_id = stream_id;
                }
            }
            Err(e) if e.kind() == redis::ErrorKind::IoError => {
                // Timeout or connection issue, continue
                time::sleep(Duration::from_millis(100)).await;
            }
            Err(e) => {
                tracing::error!(error=%e, "stream listener error");
                time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

/// Fetch a single entry from a room stream
async fn fetch_stream_entry(
    conn: &mut ConnectionManager,
    stream_key: &str,
    entry_id: &str,
) -> redis::RedisResult<String> {
    if entry_id.is_empty() {
        return Ok(String::new());
    }

    let entries: Vec<(String, Vec<(String, String)>)> = redis::cmd("XRANGE")
        .arg(stream_key)
        .arg(entry_id)
        .arg(entry_id)
        .query_async(conn)
        .await?;

    if let Some((_, fields)) = entries.first() {
        Ok(fields
            .iter()
            .find(|(k, _)| k == "payload")
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    } else {
        Ok(String::new())
    }
}
