//! Friend requests, friendships, and blocks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use ember_types::api::{
    BlockRequest, BlockedUserResponse, Claims, FriendRequestCreate, FriendRequestResponse,
    RespondRequest, StreakResponse, UserResponse,
};

use crate::error::ApiError;
use crate::{blocking, AppState};

pub async fn send_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<FriendRequestCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let request_id =
        blocking(move || db.db.send_friend_request(claims.sub, &req.username)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "request_id": request_id })),
    ))
}

pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.pending_friend_requests(claims.sub)).await?;
    let out: Vec<FriendRequestResponse> = rows
        .into_iter()
        .map(|r| FriendRequestResponse {
            id: r.request_id,
            requester_id: r.requester_id,
            requester_username: r.requester_username,
            requester_display_name: r.requester_display_name,
            requested_at: r.requested_at,
        })
        .collect();
    Ok(Json(out))
}

pub async fn respond_to_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.respond_to_friend_request(request_id, claims.sub, req.accept)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_friends(claims.sub)).await?;
    let out: Vec<UserResponse> = rows
        .into_iter()
        .map(|u| UserResponse {
            id: u.user_id,
            username: u.username,
            display_name: u.display_name,
            date_of_birth: u.date_of_birth,
            country: u.country,
            bio: u.bio,
        })
        .collect();
    Ok(Json(out))
}

pub async fn unfriend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.remove_friendship(claims.sub, friend_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn block(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<BlockRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.block_user(claims.sub, &req.username)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn unblock(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(blocked_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.unblock_user(claims.sub, blocked_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn blocked_list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.blocked_users(claims.sub)).await?;
    let out: Vec<BlockedUserResponse> = rows
        .into_iter()
        .map(|b| BlockedUserResponse {
            user_id: b.user_id,
            username: b.username,
            display_name: b.display_name,
            blocked_at: b.blocked_at,
        })
        .collect();
    Ok(Json(out))
}

/// Current streak with a particular friend. A pair with no streak row yet
/// reads as zero.
pub async fn streak_with(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(friend_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let row = blocking(move || db.db.streak(claims.sub, friend_id)).await?;
    let out = match row {
        Some(s) => StreakResponse {
            count: s.streak_count,
            last_active_date: s.last_active_date.map(|d| d.to_string()),
        },
        None => StreakResponse {
            count: 0,
            last_active_date: None,
        },
    };
    Ok(Json(out))
}
