//! Database row types — these map directly to SQLite rows.
//! Distinct from the ember-types API models to keep the DB layer independent.

use chrono::NaiveDate;

pub struct UserRow {
    pub user_id: i64,
    pub username: String,
    pub password_hash: String,
    pub display_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
    pub created_at: String,
}

/// A pending friend request, joined with the requester's identity.
pub struct PendingRequestRow {
    pub request_id: i64,
    pub requester_id: i64,
    pub requester_username: String,
    pub requester_display_name: Option<String>,
    pub requested_at: String,
}

pub struct BlockedUserRow {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub blocked_at: String,
}

/// Group joined with creator identity and member count. `role` is filled
/// when listing a particular user's groups.
#[derive(Debug)]
pub struct GroupRow {
    pub group_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub avatar: String,
    pub created_by: i64,
    pub creator_username: String,
    pub member_count: i64,
    pub role: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct MemberRow {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub joined_at: String,
}

pub struct InviteRow {
    pub invite_id: i64,
    pub group_id: i64,
    pub group_name: String,
    pub group_avatar: String,
    pub inviter_id: i64,
    pub inviter_username: String,
    pub invited_at: String,
}

/// A direct or group message joined with the sender's preferred name
/// (display name when set, username otherwise).
pub struct MessageRow {
    pub message_id: i64,
    pub sender_id: i64,
    pub sender_name: String,
    pub text: String,
    pub image_path: Option<String>,
    pub sent_at: String,
    pub is_edited: bool,
    pub edited_at: Option<String>,
    pub forwarded_from_id: Option<i64>,
}

pub struct ReactionRow {
    pub user_id: i64,
    pub username: String,
    pub glyph: String,
    pub created_at: String,
}

pub struct StreakRow {
    pub user1_id: i64,
    pub user2_id: i64,
    pub streak_count: u32,
    pub last_active_date: Option<NaiveDate>,
    pub user1_last_message_date: Option<NaiveDate>,
    pub user2_last_message_date: Option<NaiveDate>,
}
