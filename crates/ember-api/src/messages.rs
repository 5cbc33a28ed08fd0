//! Direct and group messaging: send, history, edit, delete, forward, search.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};

use ember_db::models::MessageRow;
use ember_types::api::{
    Claims, EditMessageRequest, ForwardRequest, MessageResponse, SearchQuery,
    SendDirectMessageResponse, SendMessageRequest,
};
use ember_types::MessageKind;

use crate::error::ApiError;
use crate::{blocking, AppState};

fn message_response(m: MessageRow) -> MessageResponse {
    MessageResponse {
        id: m.message_id,
        sender_id: m.sender_id,
        sender_name: m.sender_name,
        text: m.text,
        image: m.image_path,
        sent_at: m.sent_at,
        edited: m.is_edited,
        edited_at: m.edited_at,
        forwarded_from: m.forwarded_from_id,
    }
}

fn validate_text(text: &str) -> Result<(), ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::BadRequest("message text must not be empty"));
    }
    Ok(())
}

pub async fn send_direct(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(receiver_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text(&req.text)?;

    let db = state.clone();
    let (message_id, streak) = blocking(move || {
        db.db
            .send_direct_message(claims.sub, receiver_id, &req.text, req.image.as_deref())
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(SendDirectMessageResponse { message_id, streak }),
    ))
}

pub async fn conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.conversation(claims.sub, peer_id)).await?;
    let out: Vec<MessageResponse> = rows.into_iter().map(message_response).collect();
    Ok(Json(out))
}

pub async fn send_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text(&req.text)?;

    let db = state.clone();
    let message_id = blocking(move || {
        db.db
            .send_group_message(group_id, claims.sub, &req.text, req.image.as_deref())
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message_id": message_id })),
    ))
}

pub async fn group_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.group_messages(group_id, claims.sub)).await?;
    let out: Vec<MessageResponse> = rows.into_iter().map(message_response).collect();
    Ok(Json(out))
}

pub async fn edit(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
    Json(req): Json<EditMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_text(&req.text)?;

    let db = state.clone();
    blocking(move || db.db.edit_message(message_id, claims.sub, &req.text, kind)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((kind, message_id)): Path<(MessageKind, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.delete_message(message_id, claims.sub, kind)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn forward(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((source_kind, message_id)): Path<(MessageKind, i64)>,
    Json(req): Json<ForwardRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let new_id = blocking(move || {
        db.db.forward_message(
            message_id,
            claims.sub,
            req.destination_id,
            source_kind,
            req.destination_kind,
        )
    })
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message_id": new_id })),
    ))
}

/// Case-insensitive substring search; `chat_with` selects a direct
/// conversation, `group_id` a group chat. Exactly one must be given.
pub async fn search(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, ApiError> {
    if query.q.is_empty() {
        return Err(ApiError::BadRequest("search query must not be empty"));
    }

    let db = state.clone();
    let rows = match (query.chat_with, query.group_id) {
        (Some(peer_id), None) => {
            blocking(move || db.db.search_conversation(claims.sub, peer_id, &query.q)).await?
        }
        (None, Some(group_id)) => {
            blocking(move || db.db.search_group_messages(group_id, claims.sub, &query.q)).await?
        }
        _ => {
            return Err(ApiError::BadRequest(
                "exactly one of chat_with or group_id is required",
            ))
        }
    };

    let out: Vec<MessageResponse> = rows.into_iter().map(message_response).collect();
    Ok(Json(out))
}

pub async fn clear_conversation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(peer_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.clear_conversation(claims.sub, peer_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear_group(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(group_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    blocking(move || db.db.clear_group_chat(group_id, claims.sub)).await?;
    Ok(StatusCode::NO_CONTENT)
}
