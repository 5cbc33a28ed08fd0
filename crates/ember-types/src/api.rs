use serde::{Deserialize, Serialize};

use crate::models::{GroupId, MessageId, MessageKind, UserId};

// -- JWT Claims --

/// Canonical claims definition, shared by the REST middleware and the auth
/// handlers that mint tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: UserId,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: UserId,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: UserId,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub date_of_birth: Option<String>,
    pub country: Option<String>,
    pub bio: Option<String>,
}

// -- Social graph --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FriendRequestCreate {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct FriendRequestResponse {
    pub id: i64,
    pub requester_id: UserId,
    pub requester_username: String,
    pub requester_display_name: Option<String>,
    pub requested_at: String,
}

/// Accept or decline a pending friend request or group invite.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RespondRequest {
    pub accept: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockRequest {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct BlockedUserResponse {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub blocked_at: String,
}

// -- Groups --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    pub name: String,
    pub description: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: GroupId,
    pub name: String,
    pub description: Option<String>,
    pub avatar: String,
    pub created_by: UserId,
    pub creator_username: String,
    pub member_count: i64,
    /// Caller's role, present when listing the caller's own groups.
    pub role: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct MemberResponse {
    pub user_id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub role: String,
    pub joined_at: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InviteCreate {
    pub invitee_id: UserId,
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub id: i64,
    pub group_id: GroupId,
    pub group_name: String,
    pub group_avatar: String,
    pub inviter_username: String,
    pub invited_at: String,
}

// -- Messaging --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub text: String,
    /// Attachment locator from POST /attachments, if any.
    pub image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendDirectMessageResponse {
    pub message_id: MessageId,
    pub streak: u32,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub text: String,
    pub image: Option<String>,
    pub sent_at: String,
    pub edited: bool,
    pub edited_at: Option<String>,
    pub forwarded_from: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardRequest {
    pub destination_kind: MessageKind,
    /// Receiving user for direct forwards, group for group forwards.
    pub destination_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub chat_with: Option<UserId>,
    pub group_id: Option<GroupId>,
}

// -- Reactions and read receipts --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionRequest {
    pub glyph: String,
}

#[derive(Debug, Serialize)]
pub struct ReactionResponse {
    pub user_id: UserId,
    pub username: String,
    pub glyph: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct StreakResponse {
    pub count: u32,
    pub last_active_date: Option<String>,
}
