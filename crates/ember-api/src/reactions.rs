//! Emoji reactions and read receipts.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use ember_types::api::{Claims, ReactionRequest, ReactionResponse};
use ember_types::MessageKind;

use crate::error::ApiError;
use crate::{blocking, AppState};

pub async fn add(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
    Json(req): Json<ReactionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.glyph.is_empty() {
        return Err(ApiError::BadRequest("reaction glyph must not be empty"));
    }

    let db = state.clone();
    blocking(move || db.db.add_reaction(message_id, claims.sub, &req.glyph, kind)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.remove_reaction(message_id, claims.sub, kind)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list(
    State(state): State<AppState>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.reactions(message_id, kind)).await?;
    let out: Vec<ReactionResponse> = rows
        .into_iter()
        .map(|r| ReactionResponse {
            user_id: r.user_id,
            username: r.username,
            glyph: r.glyph,
            created_at: r.created_at,
        })
        .collect();
    Ok(Json(out))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.mark_read(message_id, claims.sub, kind)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark every message the peer has sent to the caller as read.
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.mark_conversation_read(claims.sub, peer_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn is_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let read = blocking(move || db.db.is_read(message_id, claims.sub, kind)).await?;
    Ok(Json(serde_json::json!({ "read": read })))
}
