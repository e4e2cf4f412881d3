use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room kind. Direct rooms are fixed 2-party conversations; group rooms
/// carry a mutable member list with role-based administration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    Direct,
    Group,
}

impl RoomKind {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }
}

impl std::fmt::Display for RoomKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_db())
    }
}

/// Canonical key for a direct room: the unordered user pair, stored ordered
/// so uniqueness is independent of who initiated the conversation.
pub fn direct_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_kind_round_trip() {
        assert_eq!(RoomKind::from_db("direct"), Some(RoomKind::Direct));
        assert_eq!(RoomKind::from_db("group"), Some(RoomKind::Group));
        assert_eq!(RoomKind::from_db("channel"), None);
        assert_eq!(RoomKind::Direct.to_db(), "direct");
        assert_eq!(RoomKind::Group.to_db(), "group");
    }

    #[test]
    fn test_direct_pair_is_order_independent() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(direct_pair(a, b), direct_pair(b, a));
    }

    #[test]
    fn test_direct_pair_same_user() {
        let a = Uuid::new_v4();
        assert_eq!(direct_pair(a, a), (a, a));
    }
}
