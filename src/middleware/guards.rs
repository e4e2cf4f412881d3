//! Authorization guards that enforce permission checks at the type level
//! This prevents handlers from accidentally bypassing authorization

use db_pool::PgPool;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{MemberRole, RoomKind};
use actix_middleware::UserId;
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest};

/// Represents an authenticated user extracted from JWT claims
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
}

impl FromRequest for User {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
        let extensions = req.extensions();
        let user_id = extensions.get::<UserId>().map(|u| u.0);

        Box::pin(async move {
            let user_id = user_id.ok_or(AppError::Unauthorized)?;
            Ok(User { id: user_id })
        })
    }
}

/// Represents a verified room member with all permission context
#[derive(Debug, Clone)]
pub struct RoomMemberGuard {
    pub user_id: Uuid,
    pub room_id: Uuid,
    pub role: MemberRole,
    pub room_kind: RoomKind,
}

impl RoomMemberGuard {
    /// Factory method to create and verify a room member
    /// Performs ONE database query to check membership, role, and room kind
    pub async fn verify(db: &PgPool, user_id: Uuid, room_id: Uuid) -> Result<Self, AppError> {
        let client = db.get().await?;

        let row = client
            .query_opt(
                r#"
                SELECT
                    rm.user_id,
                    rm.room_id,
                    rm.role,
                    r.kind,
                    (r.id IS NOT NULL) AS room_exists
                FROM room_members rm
                LEFT JOIN rooms r
                  ON r.id = rm.room_id
                 AND r.deleted_at IS NULL
                WHERE rm.user_id = $1 AND rm.room_id = $2 AND rm.left_at IS NULL
                "#,
                &[&user_id, &room_id],
            )
            .await?;

        // Distinguish "room missing" from "not a member": a missing room is
        // 404, a live room the user is not in is 403.
        let row = match row {
            Some(row) => row,
            None => {
                let room_exists = client
                    .query_opt(
                        "SELECT 1 FROM rooms WHERE id = $1 AND deleted_at IS NULL",
                        &[&room_id],
                    )
                    .await?
                    .is_some();
                return Err(if room_exists {
                    AppError::Forbidden
                } else {
                    AppError::NotFound
                });
            }
        };

        let room_exists: bool = row.get("room_exists");
        if !room_exists {
            return Err(AppError::NotFound);
        }

        let role_str: String = row.get("role");
        let role = MemberRole::from_db(&role_str)
            .ok_or_else(|| AppError::Database("invalid role in database".into()))?;

        let kind_str: String = row.get("kind");
        let room_kind = RoomKind::from_db(&kind_str)
            .ok_or_else(|| AppError::Database("invalid room kind in database".into()))?;

        Ok(RoomMemberGuard {
            user_id: row.get("user_id"),
            room_id: row.get("room_id"),
            role,
            room_kind,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_privileged()
    }

    pub fn is_group(&self) -> bool {
        self.room_kind == RoomKind::Group
    }

    pub fn require_group(&self) -> Result<(), AppError> {
        if !self.is_group() {
            return Err(AppError::Forbidden);
        }
        Ok(())
    }

    /// Check if this member can manage another member's role
    pub fn can_manage_role(&self, target_role: MemberRole) -> bool {
        self.role.can_manage(target_role)
    }
}

/// Represents an admin of a room
/// This is a stricter guard than RoomMemberGuard
#[derive(Debug, Clone)]
pub struct RoomAdminGuard {
    pub inner: RoomMemberGuard,
}

impl RoomAdminGuard {
    /// Factory method to create and verify a room admin
    pub async fn verify(db: &PgPool, user_id: Uuid, room_id: Uuid) -> Result<Self, AppError> {
        let member = RoomMemberGuard::verify(db, user_id, room_id).await?;

        if !member.is_admin() {
            return Err(AppError::Forbidden);
        }

        Ok(RoomAdminGuard { inner: member })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(role: MemberRole, kind: RoomKind) -> RoomMemberGuard {
        RoomMemberGuard {
            user_id: Uuid::new_v4(),
            room_id: Uuid::new_v4(),
            role,
            room_kind: kind,
        }
    }

    #[test]
    fn test_require_group_rejects_direct_rooms() {
        let direct = member(MemberRole::Admin, RoomKind::Direct);
        assert!(matches!(direct.require_group(), Err(AppError::Forbidden)));

        let group = member(MemberRole::Member, RoomKind::Group);
        assert!(group.require_group().is_ok());
    }

    #[test]
    fn test_admin_detection() {
        assert!(!member(MemberRole::Member, RoomKind::Group).is_admin());
        assert!(member(MemberRole::Admin, RoomKind::Group).is_admin());
        assert!(member(MemberRole::Owner, RoomKind::Group).is_admin());
    }

    #[test]
    fn test_role_management_is_strict() {
        let admin = member(MemberRole::Admin, RoomKind::Group);
        assert!(admin.can_manage_role(MemberRole::Member));
        assert!(!admin.can_manage_role(MemberRole::Admin));
        assert!(!admin.can_manage_role(MemberRole::Owner));
    }
}
