use serde::{Deserialize, Serialize};

/// Integer rowids from SQLite. Friendships and streaks canonicalize pairs by
/// ordering these, so they stay plain comparable integers.
pub type UserId = i64;
pub type GroupId = i64;
pub type MessageId = i64;

/// Which message table a reaction, receipt, edit, or delete targets.
/// Direct and group messages live in separate tables but share id-keyed
/// reaction and read-receipt tables, disambiguated by this kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Direct,
    Group,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    /// Table holding messages of this kind.
    pub fn table(self) -> &'static str {
        match self {
            Self::Direct => "messages",
            Self::Group => "group_messages",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRole {
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Member => "member",
        }
    }

    pub fn from_str(s: &str) -> Self {
        if s == "admin" {
            Self::Admin
        } else {
            Self::Member
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        assert_eq!(MessageKind::Direct.as_str(), "direct");
        assert_eq!(MessageKind::Group.table(), "group_messages");
        assert_eq!(GroupRole::from_str("admin"), GroupRole::Admin);
        assert_eq!(GroupRole::from_str("member"), GroupRole::Member);
    }
}
