//! # Message Service
//!
//! Persistence half of the Message Router: sequence-numbered inserts,
//! logical edit/delete, and tombstone-filtered history reads. Fan-out to
//! connected clients happens after these calls return, so a delivered
//! message is always durable first.

use crate::models::message::{Message as MessageRow, MessageKind};
use chrono::{DateTime, Utc};
use db_pool::PgPool;
use uuid::Uuid;

pub struct MessageService;

impl MessageService {
    /// Persist a message, assigning the next per-room sequence number.
    ///
    /// The counter upsert and the insert run in one statement so two
    /// concurrent sends can never observe the same sequence number. The
    /// room's last-message pointer is advanced in the same transaction.
    pub async fn send_message_db(
        db: &PgPool,
        room_id: Uuid,
        sender_id: Uuid,
        content: &str,
        kind: MessageKind,
        reply_to_id: Option<Uuid>,
    ) -> Result<MessageRow, crate::error::AppError> {
        let id = Uuid::new_v4();

        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_one(
                r#"
                WITH next AS (
                    INSERT INTO room_counters (room_id, last_seq)
                    VALUES ($2, 1)
                    ON CONFLICT (room_id)
                    DO UPDATE SET last_seq = room_counters.last_seq + 1
                    RETURNING last_seq
                )
                INSERT INTO messages (
                    id,
                    room_id,
                    sender_id,
                    content,
                    kind,
                    reply_to_id,
                    sequence_number
                )
                SELECT
                    $1,
                    $2,
                    $3,
                    $4,
                    $5,
                    $6,
                    next.last_seq
                FROM next
                RETURNING id, room_id, sender_id, content, kind, reply_to_id, sequence_number, created_at
                "#,
                &[&id, &room_id, &sender_id, &content, &kind.to_db(), &reply_to_id],
            )
            .await?;

        tx.execute(
            "UPDATE rooms SET last_message_id = $1, updated_at = NOW() WHERE id = $2",
            &[&id, &room_id],
        )
        .await?;

        tx.commit().await?;

        let kind_str: String = row.get("kind");

        Ok(MessageRow {
            id: row.get("id"),
            room_id: row.get("room_id"),
            sender_id: row.get("sender_id"),
            content: row.get("content"),
            kind: MessageKind::from_db(&kind_str).unwrap_or(MessageKind::Text),
            reply_to_id: row.get("reply_to_id"),
            sequence_number: row.get("sequence_number"),
            created_at: row.get("created_at"),
            edited_at: None,
            deleted_at: None,
            version_number: 1,
        })
    }

    /// Seq-descending history page, tombstones filtered out.
    /// `before_seq = None` starts from the newest message.
    pub async fn get_history(
        db: &PgPool,
        room_id: Uuid,
        before_seq: Option<i64>,
        limit: i64,
    ) -> Result<Vec<crate::routes::messages::MessageDto>, crate::error::AppError> {
        let limit = limit.clamp(1, 200);

        let client = db.get().await?;

        let rows = client
            .query(
                r#"SELECT id,
                          sender_id,
                          content,
                          kind,
                          reply_to_id,
                          sequence_number,
                          created_at,
                          edited_at,
                          version_number
                   FROM messages
                   WHERE room_id = $1
                     AND deleted_at IS NULL
                     AND ($2::bigint IS NULL OR sequence_number < $2)
                   ORDER BY sequence_number DESC
                   LIMIT $3"#,
                &[&room_id, &before_seq, &limit],
            )
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let id: Uuid = r.get("id");
            let sender_id: Uuid = r.get("sender_id");
            let content: String = r.get("content");
            let kind: String = r.get("kind");
            let reply_to_id: Option<Uuid> = r.get("reply_to_id");
            let seq: i64 = r.get("sequence_number");
            let created_at: DateTime<Utc> = r.get("created_at");
            let edited_at: Option<DateTime<Utc>> = r.get("edited_at");
            let version_number: i32 = r.get("version_number");

            out.push(crate::routes::messages::MessageDto {
                id,
                sender_id,
                content,
                kind,
                reply_to_id,
                sequence_number: seq,
                created_at: created_at.to_rfc3339(),
                edited_at: edited_at.map(|t| t.to_rfc3339()),
                version_number,
            });
        }
        Ok(out)
    }

    /// Edit a message. Only the original sender may edit; deleted messages
    /// reject edits. Returns (room_id, new version, edit timestamp).
    pub async fn edit_message(
        db: &PgPool,
        message_id: Uuid,
        editor_id: Uuid,
        content: &str,
    ) -> Result<(Uuid, i32, DateTime<Utc>), crate::error::AppError> {
        let client = db.get().await?;

        let row = client
            .query_opt(
                "SELECT room_id, sender_id, deleted_at FROM messages WHERE id = $1",
                &[&message_id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let room_id: Uuid = row.get("room_id");
        let sender_id: Uuid = row.get("sender_id");
        let deleted_at: Option<DateTime<Utc>> = row.get("deleted_at");

        if sender_id != editor_id {
            return Err(crate::error::AppError::Forbidden);
        }
        if deleted_at.is_some() {
            return Err(crate::error::AppError::AlreadyDeleted);
        }

        let row = client
            .query_one(
                r#"
                UPDATE messages
                SET content = $1, version_number = version_number + 1, edited_at = NOW()
                WHERE id = $2 AND deleted_at IS NULL
                RETURNING version_number, edited_at
                "#,
                &[&content, &message_id],
            )
            .await?;

        Ok((room_id, row.get("version_number"), row.get("edited_at")))
    }

    /// Tombstone a message; the row is never physically removed so
    /// concurrent readers keep a stable sequence order. Only the original
    /// sender may delete. Returns (room_id, deletion timestamp).
    pub async fn delete_message(
        db: &PgPool,
        message_id: Uuid,
        requester_id: Uuid,
    ) -> Result<(Uuid, DateTime<Utc>), crate::error::AppError> {
        let client = db.get().await?;

        let row = client
            .query_opt(
                "SELECT room_id, sender_id, deleted_at FROM messages WHERE id = $1",
                &[&message_id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let room_id: Uuid = row.get("room_id");
        let sender_id: Uuid = row.get("sender_id");
        let deleted_at: Option<DateTime<Utc>> = row.get("deleted_at");

        if sender_id != requester_id {
            return Err(crate::error::AppError::Forbidden);
        }
        if deleted_at.is_some() {
            return Err(crate::error::AppError::AlreadyDeleted);
        }

        let row = client
            .query_one(
                "UPDATE messages SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL RETURNING deleted_at",
                &[&message_id],
            )
            .await?;

        Ok((room_id, row.get("deleted_at")))
    }

    /// Room a message belongs to (for membership checks on reads)
    pub async fn room_of_message(
        db: &PgPool,
        message_id: Uuid,
    ) -> Result<Uuid, crate::error::AppError> {
        let client = db.get().await?;

        let row = client
            .query_opt("SELECT room_id FROM messages WHERE id = $1", &[&message_id])
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        Ok(row.get(0))
    }
}
