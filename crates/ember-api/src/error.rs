use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use ember_types::StoreError;

/// HTTP-facing error. Domain rejections keep their structured kind and
/// human-readable reason in the body; storage faults are logged and returned
/// as an opaque 500.
pub enum ApiError {
    Store(StoreError),
    BadRequest(&'static str),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Store(e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                StoreError::NotFriends
                | StoreError::Blocked
                | StoreError::NotMember
                | StoreError::PermissionDenied => StatusCode::FORBIDDEN,
                StoreError::DuplicateUsername
                | StoreError::AlreadyFriends
                | StoreError::DuplicateRequest
                | StoreError::AlreadyBlocked
                | StoreError::AlreadyMember
                | StoreError::DuplicateInvite => StatusCode::CONFLICT,
                StoreError::SelfTarget => StatusCode::BAD_REQUEST,
                StoreError::PasswordHash(_) | StoreError::Sqlite(_) | StoreError::Internal(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Store(e) => match e {
                StoreError::NotFound(_) => "not_found",
                StoreError::DuplicateUsername => "duplicate_username",
                StoreError::InvalidCredentials => "invalid_credentials",
                StoreError::SelfTarget => "self_target",
                StoreError::AlreadyFriends => "already_friends",
                StoreError::DuplicateRequest => "duplicate_request",
                StoreError::NotFriends => "not_friends",
                StoreError::Blocked => "blocked",
                StoreError::AlreadyBlocked => "already_blocked",
                StoreError::AlreadyMember => "already_member",
                StoreError::DuplicateInvite => "duplicate_invite",
                StoreError::NotMember => "not_member",
                StoreError::PermissionDenied => "permission_denied",
                StoreError::PasswordHash(_) | StoreError::Sqlite(_) | StoreError::Internal(_) => {
                    "internal"
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            Self::BadRequest(msg) => (*msg).to_string(),
            Self::Store(e) if e.is_domain() => e.to_string(),
            Self::Store(e) => {
                // Storage faults must not leak internals to the client.
                error!("storage fault: {e}");
                "internal error".to_string()
            }
        };

        let body = Json(json!({ "error": self.kind(), "message": message }));
        (status, body).into_response()
    }
}
