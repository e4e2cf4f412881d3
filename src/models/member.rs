//! Member role and related data structures
//!
//! Roles have a natural ordering: Member < Admin < Owner

use serde::{Deserialize, Serialize};
use std::fmt;

/// Member role in a room with natural hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    /// Regular member - can send messages
    Member = 0,
    /// Admin - can manage members (add, remove, change roles except owner)
    Admin = 1,
    /// Owner - full control (can remove admins, dissolve the room)
    Owner = 2,
}

impl MemberRole {
    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Self::Member),
            "admin" => Some(Self::Admin),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    pub fn to_db(&self) -> &'static str {
        match self {
            Self::Member => "member",
            Self::Admin => "admin",
            Self::Owner => "owner",
        }
    }

    /// Check if this role can manage another role
    /// Rule: You can only manage roles strictly below yours
    pub fn can_manage(&self, target: MemberRole) -> bool {
        *self > target
    }

    /// Check if this role can perform admin actions
    pub fn is_privileged(&self) -> bool {
        *self >= MemberRole::Admin
    }
}

impl fmt::Display for MemberRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db())
    }
}

impl std::str::FromStr for MemberRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db(s).ok_or_else(|| format!("Invalid role: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(MemberRole::Member < MemberRole::Admin);
        assert!(MemberRole::Admin < MemberRole::Owner);
    }

    #[test]
    fn test_can_manage() {
        let owner = MemberRole::Owner;
        let admin = MemberRole::Admin;
        let member = MemberRole::Member;

        // Owner can manage everyone below
        assert!(owner.can_manage(admin));
        assert!(owner.can_manage(member));

        // Admin can manage members only
        assert!(admin.can_manage(member));
        assert!(!admin.can_manage(admin)); // Cannot manage same level
        assert!(!admin.can_manage(owner)); // Cannot manage higher

        // Member cannot manage anyone
        assert!(!member.can_manage(member));
    }

    #[test]
    fn test_is_privileged() {
        assert!(!MemberRole::Member.is_privileged());
        assert!(MemberRole::Admin.is_privileged());
        assert!(MemberRole::Owner.is_privileged());
    }

    #[test]
    fn test_from_db() {
        assert_eq!(MemberRole::from_db("member"), Some(MemberRole::Member));
        assert_eq!(MemberRole::from_db("admin"), Some(MemberRole::Admin));
        assert_eq!(MemberRole::from_db("owner"), Some(MemberRole::Owner));
        assert_eq!(MemberRole::from_db("invalid"), None);
    }

    #[test]
    fn test_to_db() {
        assert_eq!(MemberRole::Member.to_db(), "member");
        assert_eq!(MemberRole::Admin.to_db(), "admin");
        assert_eq!(MemberRole::Owner.to_db(), "owner");
    }
}
