use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};

use ember_db::models::UserRow;
use ember_db::users::Profile;
use ember_types::api::{
    ChangePasswordRequest, Claims, LoginRequest, LoginResponse, RegisterRequest, RegisterResponse,
    UpdateProfileRequest, UserResponse,
};
use ember_types::StoreError;

use crate::error::ApiError;
use crate::{blocking, AppState};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest("username must be 3-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let profile = Profile {
        display_name: req.display_name,
        date_of_birth: req.date_of_birth,
        country: req.country,
        bio: req.bio,
    };

    let db = state.clone();
    let username = req.username.clone();
    let password = req.password.clone();
    let user_id = blocking(move || db.db.register(&username, &password, profile)).await?;

    let token = create_token(&state.jwt_secret, user_id, &req.username)
        .map_err(|e| StoreError::Internal(e.to_string()))
        .map_err(ApiError::from)?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { user_id, token })))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let username = req.username.clone();
    let password = req.password.clone();
    let user = blocking(move || db.db.authenticate(&username, &password))
        .await?
        .ok_or(ApiError::Store(StoreError::InvalidCredentials))?;

    let token = create_token(&state.jwt_secret, user.user_id, &user.username)
        .map_err(|e| StoreError::Internal(e.to_string()))
        .map_err(ApiError::from)?;

    Ok(Json(LoginResponse {
        user_id: user.user_id,
        username: user.username,
        token,
    }))
}

fn user_response(u: UserRow) -> UserResponse {
    UserResponse {
        id: u.user_id,
        username: u.username,
        display_name: u.display_name,
        date_of_birth: u.date_of_birth,
        country: u.country,
        bio: u.bio,
    }
}

pub async fn me(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let user = blocking(move || db.db.get_user(claims.sub))
        .await?
        .ok_or(ApiError::Store(StoreError::NotFound("user")))?;
    Ok(Json(user_response(user)))
}

pub async fn list_users(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let db = state.clone();
    let rows = blocking(move || db.db.list_users()).await?;
    let out: Vec<UserResponse> = rows.into_iter().map(user_response).collect();
    Ok(Json(out))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let profile = Profile {
        display_name: req.display_name,
        date_of_birth: req.date_of_birth,
        country: req.country,
        bio: req.bio,
    };

    let db = state.clone();
    blocking(move || db.db.update_profile(claims.sub, profile)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if req.new_password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let db = state.clone();
    blocking(move || db.db.change_password(claims.sub, &req.new_password)).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn create_token(secret: &str, user_id: i64, username: &str) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + chrono::Duration::days(30)).timestamp() as usize,
    };

    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}
