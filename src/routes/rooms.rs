//! Room Registry endpoints
//!
//! Room creation, membership management, and read markers. Membership
//! mutations are group-only and admin-gated via RoomAdminGuard.

use crate::{
    error::AppError,
    middleware::guards::{RoomAdminGuard, RoomMemberGuard, User},
    models::MemberRole,
    services::room_service::RoomService,
    state::AppState,
    websocket::events::{broadcast_event, WebSocketEvent},
};
use actix_web::{delete, get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================
// Request/Response DTOs
// ============================================

#[derive(Deserialize)]
pub struct CreateDirectRoomRequest {
    pub user_id: Uuid,
}

#[derive(Deserialize)]
pub struct CreateGroupRoomRequest {
    pub name: String,
    #[serde(default)]
    pub member_ids: Vec<Uuid>,
}

#[derive(Serialize)]
pub struct RoomCreatedResponse {
    pub room_id: Uuid,
}

#[derive(Serialize)]
pub struct RoomDto {
    pub id: Uuid,
    pub kind: String,
    pub name: Option<String>,
    pub member_count: i32,
    pub last_message_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct RoomMemberDto {
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: String,
    pub last_read_at: Option<String>,
}

#[derive(Serialize)]
pub struct RoomWithMembersDto {
    pub id: Uuid,
    pub kind: String,
    pub name: Option<String>,
    pub member_count: i32,
    pub last_message_id: Option<Uuid>,
    pub members: Vec<RoomMemberDto>,
}

#[derive(Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomDto>,
    pub total: usize,
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[serde(default = "default_member_role")]
    pub role: String, // "member" or "admin"
}

fn default_member_role() -> String {
    "member".to_string()
}

#[derive(Serialize)]
pub struct MarkReadResponse {
    pub read_at: String,
}

// ============================================
// Endpoints
// ============================================

/// POST /rooms/direct
/// Idempotent get-or-create of the direct room for (caller, user_id)
#[post("/rooms/direct")]
pub async fn create_direct_room(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateDirectRoomRequest>,
) -> Result<HttpResponse, AppError> {
    let room_id = RoomService::create_direct_room(&state.db, user.id, body.user_id).await?;

    Ok(HttpResponse::Ok().json(RoomCreatedResponse { room_id }))
}

/// POST /rooms/group
/// Create a group room; the caller becomes owner
#[post("/rooms/group")]
pub async fn create_group_room(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<CreateGroupRoomRequest>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let member_ids = body.member_ids.clone();
    let room_name = body.name.clone();
    let room_id = RoomService::create_group_room(&state.db, user.id, body.name, member_ids.clone())
        .await?;

    // Invite notifications are best-effort
    if let Some(notifications) = &state.notifications {
        for member_id in member_ids.iter().filter(|id| **id != user.id) {
            let _ = notifications
                .publish_room_invite(*member_id, user.id, room_id, &room_name)
                .await;
        }
    }

    Ok(HttpResponse::Created().json(RoomCreatedResponse { room_id }))
}

/// GET /rooms
/// List the caller's rooms, most recently active first
#[get("/rooms")]
pub async fn list_rooms(state: web::Data<AppState>, user: User) -> Result<HttpResponse, AppError> {
    let rooms = RoomService::list_rooms(&state.db, user.id).await?;

    let rooms: Vec<RoomDto> = rooms
        .into_iter()
        .map(|r| RoomDto {
            id: r.id,
            kind: r.kind.to_db().to_string(),
            name: r.name,
            member_count: r.member_count,
            last_message_id: r.last_message_id,
        })
        .collect();

    let total = rooms.len();
    Ok(HttpResponse::Ok().json(RoomListResponse { rooms, total }))
}

/// GET /rooms/{id}
/// Room details with members; caller must be a member
#[get("/rooms/{id}")]
pub async fn get_room(
    state: web::Data<AppState>,
    user: User,
    room_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let room_id = room_id.into_inner();
    RoomMemberGuard::verify(&state.db, user.id, room_id).await?;

    let room = RoomService::get_room_with_members(&state.db, room_id).await?;

    Ok(HttpResponse::Ok().json(RoomWithMembersDto {
        id: room.id,
        kind: room.kind.to_db().to_string(),
        name: room.name,
        member_count: room.member_count,
        last_message_id: room.last_message_id,
        members: room
            .members
            .into_iter()
            .map(|m| RoomMemberDto {
                user_id: m.user_id,
                role: m.role.to_db().to_string(),
                joined_at: m.joined_at.to_rfc3339(),
                last_read_at: m.last_read_at.map(|t| t.to_rfc3339()),
            })
            .collect(),
    }))
}

/// POST /rooms/{id}/members
/// Add a member to a group room
///
/// Authorization: requires admin role; admins can only grant roles below
/// their own
#[post("/rooms/{id}/members")]
pub async fn add_member(
    state: web::Data<AppState>,
    user: User,
    room_id: web::Path<Uuid>,
    body: web::Json<AddMemberRequest>,
) -> Result<HttpResponse, AppError> {
    let room_id = room_id.into_inner();
    let admin = RoomAdminGuard::verify(&state.db, user.id, room_id).await?;
    admin.inner.require_group()?;

    let role = MemberRole::from_db(&body.role)
        .ok_or_else(|| AppError::BadRequest("invalid role".into()))?;

    if !admin.inner.can_manage_role(role) {
        return Err(AppError::Forbidden);
    }

    RoomService::add_member(&state.db, room_id, body.user_id, role).await?;
    RoomService::invalidate_membership_cache(&state.redis, room_id, body.user_id).await;

    let event = WebSocketEvent::MemberJoined {
        user_id: body.user_id,
        role: role.to_db().to_string(),
    };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    if let Some(notifications) = &state.notifications {
        let room = RoomService::get_room(&state.db, room_id).await?;
        let _ = notifications
            .publish_room_invite(
                body.user_id,
                user.id,
                room_id,
                room.name.as_deref().unwrap_or(""),
            )
            .await;
    }

    Ok(HttpResponse::Created().finish())
}

/// DELETE /rooms/{id}/members/{user_id}
/// Remove a member (or leave, when user_id is the caller)
#[delete("/rooms/{id}/members/{user_id}")]
pub async fn remove_member(
    state: web::Data<AppState>,
    user: User,
    path: web::Path<(Uuid, Uuid)>,
) -> Result<HttpResponse, AppError> {
    let (room_id, member_id) = path.into_inner();

    RoomService::remove_member(&state.db, room_id, member_id, user.id).await?;
    RoomService::invalidate_membership_cache(&state.redis, room_id, member_id).await;

    let event = WebSocketEvent::MemberLeft { user_id: member_id };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    Ok(HttpResponse::NoContent().finish())
}

/// POST /rooms/{id}/read
/// Mark the room read up to now; broadcasts a message.read event
#[post("/rooms/{id}/read")]
pub async fn mark_read(
    state: web::Data<AppState>,
    user: User,
    room_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let room_id = room_id.into_inner();
    RoomMemberGuard::verify(&state.db, user.id, room_id).await?;

    let read_at = RoomService::mark_read(&state.db, room_id, user.id).await?;

    let event = WebSocketEvent::MessageRead {
        user_id: user.id,
        read_at,
    };
    let _ = broadcast_event(&state.registry, &state.redis, room_id, user.id, event).await;

    Ok(HttpResponse::Ok().json(MarkReadResponse {
        read_at: read_at.to_rfc3339(),
    }))
}
