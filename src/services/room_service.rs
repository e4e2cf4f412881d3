use crate::models::room::direct_pair;
use crate::models::{MemberRole, RoomKind};
use chrono::{DateTime, Utc};
use db_pool::PgPool;
use uuid::Uuid;

pub struct RoomDetails {
    pub id: Uuid,
    pub kind: RoomKind,
    pub name: Option<String>,
    pub member_count: i32,
    pub last_message_id: Option<Uuid>,
}

pub struct RoomMemberDetails {
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
    pub last_read_at: Option<DateTime<Utc>>,
}

pub struct RoomWithMembers {
    pub id: Uuid,
    pub kind: RoomKind,
    pub name: Option<String>,
    pub member_count: i32,
    pub last_message_id: Option<Uuid>,
    pub members: Vec<RoomMemberDetails>,
}

pub struct RoomService;

impl RoomService {
    /// Create a direct (1:1) room between two users
    ///
    /// Idempotent get-or-create per unordered user pair: the pair is stored
    /// canonically ordered and guarded by a partial unique index, so two
    /// racing creates converge on one room.
    pub async fn create_direct_room(
        db: &PgPool,
        initiator: Uuid,
        recipient: Uuid,
    ) -> Result<Uuid, crate::error::AppError> {
        if initiator == recipient {
            return Err(crate::error::AppError::BadRequest(
                "cannot open a direct room with yourself".into(),
            ));
        }

        if let Some(existing_id) = Self::find_existing_direct_room(db, initiator, recipient).await?
        {
            return Ok(existing_id);
        }

        let (lo, hi) = direct_pair(initiator, recipient);
        let id = Uuid::new_v4();

        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        // A concurrent create for the same pair loses the insert race and
        // falls through to the re-select below.
        let inserted = tx
            .query_opt(
                r#"
                INSERT INTO rooms (id, kind, created_by, member_count, direct_user_lo, direct_user_hi)
                VALUES ($1, 'direct', $2, 2, $3, $4)
                ON CONFLICT (direct_user_lo, direct_user_hi) WHERE deleted_at IS NULL
                DO NOTHING
                RETURNING id
                "#,
                &[&id, &initiator, &lo, &hi],
            )
            .await?;

        let room_id = match inserted {
            Some(row) => {
                let room_id: Uuid = row.get(0);
                tx.execute(
                    "INSERT INTO room_members (room_id, user_id, role) VALUES ($1, $2, 'member'), ($1, $3, 'member') ON CONFLICT DO NOTHING",
                    &[&room_id, &initiator, &recipient],
                )
                .await?;
                tx.commit().await?;
                room_id
            }
            None => {
                tx.rollback().await?;
                Self::find_existing_direct_room(db, initiator, recipient)
                    .await?
                    .ok_or(crate::error::AppError::Internal)?
            }
        };

        Ok(room_id)
    }

    /// Find existing direct room between two users
    async fn find_existing_direct_room(
        db: &PgPool,
        user_a: Uuid,
        user_b: Uuid,
    ) -> Result<Option<Uuid>, crate::error::AppError> {
        let (lo, hi) = direct_pair(user_a, user_b);
        let client = db.get().await?;

        let result = client
            .query_opt(
                r#"
                SELECT id
                FROM rooms
                WHERE kind = 'direct'
                  AND deleted_at IS NULL
                  AND direct_user_lo = $1
                  AND direct_user_hi = $2
                LIMIT 1
                "#,
                &[&lo, &hi],
            )
            .await?;

        Ok(result.map(|row| row.get(0)))
    }

    /// Create a group room with specified members and creator as owner
    pub async fn create_group_room(
        db: &PgPool,
        creator_id: Uuid,
        name: String,
        member_ids: Vec<Uuid>,
    ) -> Result<Uuid, crate::error::AppError> {
        if name.trim().is_empty() {
            return Err(crate::error::AppError::BadRequest(
                "group name cannot be empty".into(),
            ));
        }
        if name.len() > 255 {
            return Err(crate::error::AppError::BadRequest(
                "group name too long (max 255)".into(),
            ));
        }

        // Creator first, members deduplicated
        let mut all_members = vec![creator_id];
        for member_id in &member_ids {
            if member_id != &creator_id && !all_members.contains(member_id) {
                all_members.push(*member_id);
            }
        }

        let room_id = Uuid::new_v4();
        let member_count = all_members.len() as i32;

        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        tx.execute(
            "INSERT INTO rooms (id, kind, name, created_by, member_count) VALUES ($1, 'group', $2, $3, $4)",
            &[&room_id, &name, &creator_id, &member_count],
        )
        .await?;

        for member_id in &all_members {
            let role = if member_id == &creator_id {
                "owner"
            } else {
                "member"
            };

            tx.execute(
                "INSERT INTO room_members (room_id, user_id, role) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
                &[&room_id, member_id, &role],
            )
            .await?;
        }

        tx.commit().await?;

        Ok(room_id)
    }

    pub async fn get_room(db: &PgPool, id: Uuid) -> Result<RoomDetails, crate::error::AppError> {
        let client = db.get().await?;

        let r = client
            .query_opt(
                r#"
                SELECT
                  r.id,
                  r.kind,
                  r.name,
                  (
                    SELECT COUNT(*)::int FROM room_members rm
                    WHERE rm.room_id = r.id AND rm.left_at IS NULL
                  ) AS member_count,
                  r.last_message_id
                FROM rooms r
                WHERE r.id = $1 AND r.deleted_at IS NULL
                "#,
                &[&id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let kind_str: String = r.get("kind");

        Ok(RoomDetails {
            id: r.get("id"),
            kind: RoomKind::from_db(&kind_str)
                .ok_or_else(|| crate::error::AppError::Database("invalid room kind".into()))?,
            name: r.get("name"),
            member_count: r.get("member_count"),
            last_message_id: r.get("last_message_id"),
        })
    }

    /// List all rooms for a user, most recently active first
    /// Security: only returns rooms where user is an active member
    pub async fn list_rooms(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<RoomDetails>, crate::error::AppError> {
        let client = db.get().await?;

        let rows = client
            .query(
                r#"
                SELECT r.id, r.kind, r.name, r.member_count, r.last_message_id
                FROM rooms r
                JOIN room_members rm ON r.id = rm.room_id
                WHERE rm.user_id = $1 AND rm.left_at IS NULL AND r.deleted_at IS NULL
                ORDER BY r.updated_at DESC
                LIMIT 100
                "#,
                &[&user_id],
            )
            .await?;

        let rooms = rows
            .into_iter()
            .filter_map(|row| {
                let kind_str: String = row.get("kind");
                let kind = RoomKind::from_db(&kind_str)?;
                Some(RoomDetails {
                    id: row.get("id"),
                    kind,
                    name: row.get("name"),
                    member_count: row.get("member_count"),
                    last_message_id: row.get("last_message_id"),
                })
            })
            .collect();

        Ok(rooms)
    }

    /// Get room with full member details
    /// Security: caller must already be verified as a member
    pub async fn get_room_with_members(
        db: &PgPool,
        room_id: Uuid,
    ) -> Result<RoomWithMembers, crate::error::AppError> {
        let details = Self::get_room(db, room_id).await?;

        let client = db.get().await?;
        let member_rows = client
            .query(
                r#"
                SELECT user_id, role, joined_at, last_read_at
                FROM room_members
                WHERE room_id = $1 AND left_at IS NULL
                ORDER BY joined_at ASC
                "#,
                &[&room_id],
            )
            .await?;

        let members = member_rows
            .into_iter()
            .filter_map(|row| {
                let role_str: String = row.get("role");
                let role = MemberRole::from_db(&role_str)?;
                Some(RoomMemberDetails {
                    user_id: row.get("user_id"),
                    role,
                    joined_at: row.get("joined_at"),
                    last_read_at: row.get("last_read_at"),
                })
            })
            .collect();

        Ok(RoomWithMembers {
            id: details.id,
            kind: details.kind,
            name: details.name,
            member_count: details.member_count,
            last_message_id: details.last_message_id,
            members,
        })
    }

    pub async fn is_member(
        db: &PgPool,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, crate::error::AppError> {
        let client = db.get().await?;

        let rec = client
            .query_opt(
                r#"
                SELECT 1
                FROM room_members rm
                JOIN rooms r ON r.id = rm.room_id
                WHERE rm.room_id = $1
                  AND rm.user_id = $2
                  AND rm.left_at IS NULL
                  AND r.deleted_at IS NULL
                LIMIT 1
                "#,
                &[&room_id, &user_id],
            )
            .await?;
        Ok(rec.is_some())
    }

    /// Check membership with Redis caching
    /// Cache TTL: 60 seconds - reduces DB load for rapid room browsing
    pub async fn is_member_cached(
        db: &PgPool,
        redis: &crate::redis_client::RedisClient,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, crate::error::AppError> {
        use redis::AsyncCommands;

        let cache_key = format!("chat:member:{}:{}", room_id, user_id);

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            if let Ok(Some(cached)) = conn.get::<_, Option<String>>(&cache_key).await {
                return Ok(cached == "1");
            }
        }

        let is_member = Self::is_member(db, room_id, user_id).await?;

        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let _: Result<(), _> = conn
                .set_ex(&cache_key, if is_member { "1" } else { "0" }, 60)
                .await;
        }

        Ok(is_member)
    }

    /// Invalidate membership cache when membership changes (add/remove member)
    pub async fn invalidate_membership_cache(
        redis: &crate::redis_client::RedisClient,
        room_id: Uuid,
        user_id: Uuid,
    ) {
        use redis::AsyncCommands;

        let cache_key = format!("chat:member:{}:{}", room_id, user_id);
        if let Ok(mut conn) = redis.get_multiplexed_async_connection().await {
            let _: Result<(), _> = conn.del(&cache_key).await;
        }
    }

    /// Add a member to a group room. Caller must already hold admin rights
    /// (RoomAdminGuard). Locks the room row so adds serialize with removes
    /// and with sends that snapshot the member set.
    pub async fn add_member(
        db: &PgPool,
        room_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<(), crate::error::AppError> {
        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let room = tx
            .query_opt(
                "SELECT kind FROM rooms WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
                &[&room_id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let kind: String = room.get("kind");
        if kind != "group" {
            return Err(crate::error::AppError::Forbidden);
        }

        // Re-joining revives the tombstoned membership with the new role
        let changed = tx
            .execute(
                r#"
                INSERT INTO room_members (room_id, user_id, role)
                VALUES ($1, $2, $3)
                ON CONFLICT (room_id, user_id) DO UPDATE
                SET left_at = NULL, role = EXCLUDED.role, joined_at = NOW()
                WHERE room_members.left_at IS NOT NULL
                "#,
                &[&room_id, &user_id, &role.to_db()],
            )
            .await?;

        if changed == 0 {
            // Already an active member; nothing to do
            tx.rollback().await?;
            return Ok(());
        }

        tx.execute(
            "UPDATE rooms SET member_count = member_count + 1, updated_at = NOW() WHERE id = $1",
            &[&room_id],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Remove a member from a room (or leave, when member_id == requester_id)
    ///
    /// Direct rooms are immutable after creation. In groups, self-removal is
    /// always permitted; removing someone else requires a role strictly
    /// above theirs, and the owner can never be removed.
    pub async fn remove_member(
        db: &PgPool,
        room_id: Uuid,
        member_id: Uuid,
        requester_id: Uuid,
    ) -> Result<(), crate::error::AppError> {
        let mut client = db.get().await?;
        let tx = client.transaction().await?;

        let room = tx
            .query_opt(
                "SELECT kind FROM rooms WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
                &[&room_id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let kind: String = room.get("kind");
        if kind == "direct" {
            return Err(crate::error::AppError::Forbidden);
        }

        let member_row = tx
            .query_opt(
                "SELECT role FROM room_members WHERE room_id = $1 AND user_id = $2 AND left_at IS NULL",
                &[&room_id, &member_id],
            )
            .await?
            .ok_or(crate::error::AppError::NotFound)?;

        let member_role_str: String = member_row.get("role");
        let member_role = MemberRole::from_db(&member_role_str)
            .ok_or_else(|| crate::error::AppError::Database("invalid role in database".into()))?;

        if member_id != requester_id {
            let requester_row = tx
                .query_opt(
                    "SELECT role FROM room_members WHERE room_id = $1 AND user_id = $2 AND left_at IS NULL",
                    &[&room_id, &requester_id],
                )
                .await?
                .ok_or(crate::error::AppError::Forbidden)?;

            let requester_role_str: String = requester_row.get("role");
            let requester_role = MemberRole::from_db(&requester_role_str).ok_or_else(|| {
                crate::error::AppError::Database("invalid role in database".into())
            })?;

            if !requester_role.can_manage(member_role) {
                return Err(crate::error::AppError::Forbidden);
            }
        }

        if member_role == MemberRole::Owner {
            return Err(crate::error::AppError::BadRequest(
                "cannot remove the room owner".into(),
            ));
        }

        tx.execute(
            "UPDATE room_members SET left_at = NOW() WHERE room_id = $1 AND user_id = $2 AND left_at IS NULL",
            &[&room_id, &member_id],
        )
        .await?;

        tx.execute(
            "UPDATE rooms SET member_count = member_count - 1, updated_at = NOW() WHERE id = $1 AND member_count > 0",
            &[&room_id],
        )
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Mark room as read by user (update last_read_at timestamp)
    pub async fn mark_read(
        db: &PgPool,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<DateTime<Utc>, crate::error::AppError> {
        let client = db.get().await?;

        let row = client
            .query_opt(
                r#"
                UPDATE room_members SET last_read_at = NOW()
                WHERE room_id = $1 AND user_id = $2 AND left_at IS NULL
                RETURNING last_read_at
                "#,
                &[&room_id, &user_id],
            )
            .await?
            .ok_or(crate::error::AppError::Forbidden)?;

        Ok(row.get(0))
    }

    /// All rooms the user currently participates in (presence fan-out set)
    pub async fn room_ids_for_user(
        db: &PgPool,
        user_id: Uuid,
    ) -> Result<Vec<Uuid>, crate::error::AppError> {
        let client = db.get().await?;

        let rows = client
            .query(
                r#"
                SELECT rm.room_id
                FROM room_members rm
                JOIN rooms r ON r.id = rm.room_id
                WHERE rm.user_id = $1 AND rm.left_at IS NULL AND r.deleted_at IS NULL
                "#,
                &[&user_id],
            )
            .await?;

        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }

    /// Active member ids of a room (notification recipient set)
    pub async fn member_user_ids(
        db: &PgPool,
        room_id: Uuid,
    ) -> Result<Vec<Uuid>, crate::error::AppError> {
        let client = db.get().await?;

        let rows = client
            .query(
                "SELECT user_id FROM room_members WHERE room_id = $1 AND left_at IS NULL",
                &[&room_id],
            )
            .await?;

        Ok(rows.into_iter().map(|r| r.get(0)).collect())
    }
}
