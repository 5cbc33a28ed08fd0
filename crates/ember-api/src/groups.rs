//! Group lifecycle: creation, invites, membership, admin actions.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use ember_db::models::GroupRow;
use ember_types::api::{
    Claims, CreateGroupRequest, GroupResponse, InviteCreate, InviteResponse, MemberResponse,
    RespondRequest,
};

use crate::error::ApiError;
use crate::{blocking, AppState};

fn group_response(g: GroupRow) -> GroupResponse {
    GroupResponse {
        id: g.group_id,
        name: g.name,
        description: g.description,
        avatar: g.avatar,
        created_by: g.created_by,
        creator_username: g.creator_username,
        member_count: g.member_count,
        role: g.role,
        created_at: g.created_at,
    }
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("group name must not be empty"));
    }

    let db = state.clone();
    let group_id = blocking(move || {
        db.db.create_group(
            req.name.trim(),
            req.description.as_deref(),
            req.avatar.as_deref(),
            claims.sub,
        )
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "group_id": group_id })),
    ))
}

pub async fn my_groups(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_user_groups(claims.sub)).await?;
    let out: Vec<GroupResponse> = rows.into_iter().map(group_response).collect();
    Ok(Json(out))
}

pub async fn detail(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let group = blocking(move || db.db.group_detail(group_id, claims.sub)).await?;
    Ok(Json(group_response(group)))
}

pub async fn members(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_members(group_id, claims.sub)).await?;
    let out: Vec<MemberResponse> = rows
        .into_iter()
        .map(|m| MemberResponse {
            user_id: m.user_id,
            username: m.username,
            display_name: m.display_name,
            role: m.role,
            joined_at: m.joined_at,
        })
        .collect();
    Ok(Json(out))
}

pub async fn invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
    Json(req): Json<InviteCreate>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let invite_id =
        blocking(move || db.db.invite_to_group(group_id, claims.sub, req.invitee_id)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "invite_id": invite_id })),
    ))
}

pub async fn pending_invites(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.pending_invites(claims.sub)).await?;
    let out: Vec<InviteResponse> = rows
        .into_iter()
        .map(|i| InviteResponse {
            id: i.invite_id,
            group_id: i.group_id,
            group_name: i.group_name,
            group_avatar: i.group_avatar,
            inviter_username: i.inviter_username,
            invited_at: i.invited_at,
        })
        .collect();
    Ok(Json(out))
}

pub async fn respond_to_invite(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(invite_id): Path<i64>,
    Json(req): Json<RespondRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.respond_to_invite(invite_id, claims.sub, req.accept)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((group_id, target_id)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.remove_member(group_id, claims.sub, target_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn leave(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.leave_group(group_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
