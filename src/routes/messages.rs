//! Message Router endpoints
//!
//! Sends validate membership through the guard, persist, then fan out.
//! Edits and deletes are sender-only logical mutations; the broadcast tells
//! concurrent readers to update their copy in place.

use crate::{
    error::AppError,
    middleware::guards::{RoomMemberGuard, User},
    models::MessageKind,
    services::{message_service::MessageService, room_service::RoomService},
    state::AppState,
    websocket::events::{broadcast_event, WebSocketEvent},
};
use actix_web::{delete, get, post, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Serialize)]
pub struct MessageDto {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub kind: String,
    pub reply_to_id: Option<Uuid>,
    pub sequence_number: i64,
    pub created_at: String,
    pub edited_at: Option<String>,
    pub version_number: i32,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default = "default_message_kind")]
    pub kind: String,
    #[serde(default)]
    pub reply_to_id: Option<Uuid>,
}

fn default_message_kind() -> String {
    "text".to_string()
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub before_seq: Option<i64>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<MessageDto>,
    pub has_more: bool,
}

#[derive(Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

#[derive(Serialize)]
pub struct EditMessageResponse {
    pub message_id: Uuid,
    pub version_number: i32,
    pub edited_at: String,
}

// ============================================
// Endpoints
// ============================================

/// POST /rooms/{id}/messages
/// Send a message to a room
///
/// Persistence is acknowledged before fan-out: the message is durable by
/// the time any subscriber sees it.
#[post("/rooms/{id}/messages")]
pub async fn send_message(
    state: web::Data<AppState>,
    user: User,
    room_id: web::Path<Uuid>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let room_id = room_id.into_inner();
    RoomMemberGuard::verify(&state.db, user.id, room_id).await?;

    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("message content cannot be empty".into()));
    }
    if content.len() > 16_000 {
        return Err(AppError::BadRequest("message content too long".into()));
    }

    let kind = MessageKind::from_db(&body.kind)
        .ok_or_else(|| AppError::BadRequest("invalid message kind".into()))?;

    let message =
        MessageService::send_message_db(&state.db, room_id, user.id, content, kind, body.reply_to_id)
            .await?;

    let event = WebSocketEvent::MessageCreated {
        message_id: message.id,
        sender_id: message.sender_id,
        content: message.content.clone(),
        kind: message.kind.to_db().to_string(),
        sequence_number: message.sequence_number,
        reply_to_id: message.reply_to_id,
        created_at: message.created_at,
    };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    // Push notification events for the other members (best-effort)
    if let Some(notifications) = &state.notifications {
        match RoomService::member_user_ids(&state.db, room_id).await {
            Ok(members) => {
                for recipient in members.into_iter().filter(|id| *id != user.id) {
                    let _ = notifications
                        .publish_message_notification(
                            recipient,
                            user.id,
                            room_id,
                            message.id,
                            &message.content,
                        )
                        .await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, room_id = %room_id, "notification recipients lookup failed");
            }
        }
    }

    Ok(HttpResponse::Created().json(MessageDto {
        id: message.id,
        sender_id: message.sender_id,
        content: message.content,
        kind: message.kind.to_db().to_string(),
        reply_to_id: message.reply_to_id,
        sequence_number: message.sequence_number,
        created_at: message.created_at.to_rfc3339(),
        edited_at: None,
        version_number: message.version_number,
    }))
}

/// GET /rooms/{id}/messages?before_seq=&limit=
/// Paginated history, newest first
#[get("/rooms/{id}/messages")]
pub async fn get_messages(
    state: web::Data<AppState>,
    user: User,
    room_id: web::Path<Uuid>,
    query: web::Query<HistoryQuery>,
) -> Result<HttpResponse, AppError> {
    let room_id = room_id.into_inner();
    RoomMemberGuard::verify(&state.db, user.id, room_id).await?;

    let limit = query.limit.clamp(1, 200);
    let messages = MessageService::get_history(&state.db, room_id, query.before_seq, limit).await?;

    let has_more = messages.len() as i64 == limit;
    Ok(HttpResponse::Ok().json(HistoryResponse { messages, has_more }))
}

/// PUT /messages/{id}
/// Edit a message (original sender only)
#[put("/messages/{id}")]
pub async fn edit_message(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
    body: web::Json<EditMessageRequest>,
) -> Result<HttpResponse, AppError> {
    let message_id = message_id.into_inner();

    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("message content cannot be empty".into()));
    }

    let (room_id, version_number, edited_at) =
        MessageService::edit_message(&state.db, message_id, user.id, content).await?;

    let event = WebSocketEvent::MessageEdited {
        message_id,
        content: content.to_string(),
        version_number,
        edited_at,
    };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    Ok(HttpResponse::Ok().json(EditMessageResponse {
        message_id,
        version_number,
        edited_at: edited_at.to_rfc3339(),
    }))
}

/// DELETE /messages/{id}
/// Tombstone a message (original sender only)
#[delete("/messages/{id}")]
pub async fn delete_message(
    state: web::Data<AppState>,
    user: User,
    message_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let message_id = message_id.into_inner();

    let (room_id, deleted_at) =
        MessageService::delete_message(&state.db, message_id, user.id).await?;

    let event = WebSocketEvent::MessageDeleted {
        message_id,
        deleted_at,
    };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    Ok(HttpResponse::NoContent().finish())
}
