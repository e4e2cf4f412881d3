//! Presence endpoints
//!
//! Read any user's status; set your own (explicit away/online). Connect and
//! disconnect transitions come from the WebSocket lifecycle, not from here.

use crate::{
    error::AppError,
    middleware::guards::User,
    models::PresenceStatus,
    state::AppState,
};
use actix_web::{get, put, web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct PresenceDto {
    pub user_id: Uuid,
    pub status: String,
    pub last_seen_at: Option<String>,
}

#[derive(Deserialize)]
pub struct SetPresenceRequest {
    pub status: String, // "online" or "away"
}

/// GET /presence/{user_id}
#[get("/presence/{user_id}")]
pub async fn get_presence(
    state: web::Data<AppState>,
    _user: User,
    user_id: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = user_id.into_inner();
    let record = state.presence.get(user_id).await?;

    let last_seen_at = if record.last_seen_at == chrono::DateTime::<chrono::Utc>::MIN_UTC {
        None
    } else {
        Some(record.last_seen_at.to_rfc3339())
    };

    Ok(HttpResponse::Ok().json(PresenceDto {
        user_id,
        status: record.status.to_db().to_string(),
        last_seen_at,
    }))
}

/// PUT /presence
/// Set the caller's own status. Offline is owned by the connection
/// lifecycle and cannot be requested explicitly.
#[put("/presence")]
pub async fn set_presence(
    state: web::Data<AppState>,
    user: User,
    body: web::Json<SetPresenceRequest>,
) -> Result<HttpResponse, AppError> {
    let status = PresenceStatus::from_db(&body.status)
        .ok_or_else(|| AppError::BadRequest("invalid presence status".into()))?;

    if status == PresenceStatus::Offline {
        return Err(AppError::BadRequest(
            "offline is set by disconnecting, not explicitly".into(),
        ));
    }

    state.presence.set_status(user.id, status).await?;

    Ok(HttpResponse::Ok().json(PresenceDto {
        user_id: user.id,
        status: status.to_db().to_string(),
        last_seen_at: Some(chrono::Utc::now().to_rfc3339()),
    }))
}
