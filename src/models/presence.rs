use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User connectivity status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Away,
    Offline,
}

impl PresenceStatus {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "away" => Some(Self::Away),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Away => "away",
            Self::Offline => "offline",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db())
    }
}

/// One presence record per user; stored in Redis, last-write-wins by
/// `last_seen_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub user_id: Uuid,
    pub status: PresenceStatus,
    pub last_seen_at: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn new(user_id: Uuid, status: PresenceStatus) -> Self {
        Self {
            user_id,
            status,
            last_seen_at: Utc::now(),
        }
    }

    /// Merge an incoming record: the newer `last_seen_at` wins; on a
    /// timestamp tie the incoming write wins.
    pub fn merge(self, incoming: PresenceRecord) -> PresenceRecord {
        if incoming.last_seen_at >= self.last_seen_at {
            incoming
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_round_trip() {
        for status in [
            PresenceStatus::Online,
            PresenceStatus::Away,
            PresenceStatus::Offline,
        ] {
            assert_eq!(PresenceStatus::from_db(status.to_db()), Some(status));
        }
        assert_eq!(PresenceStatus::from_db("busy"), None);
    }

    #[test]
    fn test_merge_newer_wins() {
        let user = Uuid::new_v4();
        let older = PresenceRecord {
            user_id: user,
            status: PresenceStatus::Online,
            last_seen_at: Utc::now() - Duration::seconds(30),
        };
        let newer = PresenceRecord {
            user_id: user,
            status: PresenceStatus::Offline,
            last_seen_at: Utc::now(),
        };

        let merged = older.clone().merge(newer.clone());
        assert_eq!(merged.status, PresenceStatus::Offline);

        // Order of application does not matter
        let merged = newer.merge(older);
        assert_eq!(merged.status, PresenceStatus::Offline);
    }

    #[test]
    fn test_merge_tie_prefers_incoming() {
        let user = Uuid::new_v4();
        let ts = Utc::now();
        let current = PresenceRecord {
            user_id: user,
            status: PresenceStatus::Online,
            last_seen_at: ts,
        };
        let incoming = PresenceRecord {
            user_id: user,
            status: PresenceStatus::Away,
            last_seen_at: ts,
        };

        assert_eq!(current.merge(incoming).status, PresenceStatus::Away);
    }
}
