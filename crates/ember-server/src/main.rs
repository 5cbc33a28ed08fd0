use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use ember_api::attachments::AttachmentStore;
use ember_api::middleware::require_auth;
use ember_api::{attachments, auth, friends, groups, messages, reactions, AppState, AppStateInner};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ember=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("EMBER_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("EMBER_DB_PATH").unwrap_or_else(|_| "ember.db".into());
    let image_dir = std::env::var("EMBER_IMAGE_DIR").unwrap_or_else(|_| "ember_images".into());
    let host = std::env::var("EMBER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("EMBER_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = ember_db::Database::open(&PathBuf::from(&db_path))?;

    let state: AppState = Arc::new(AppStateInner {
        db,
        jwt_secret,
        attachments: AttachmentStore::new(PathBuf::from(&image_dir)),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        // Profile
        .route("/users", get(auth::list_users))
        .route("/users/me", get(auth::me))
        .route("/users/me/profile", put(auth::update_profile))
        .route("/users/me/password", put(auth::change_password))
        // Social graph
        .route("/friends", get(friends::list_friends))
        .route("/friends/{friend_id}", delete(friends::unfriend))
        .route("/friends/{friend_id}/streak", get(friends::streak_with))
        .route("/friend-requests", post(friends::send_request))
        .route("/friend-requests", get(friends::pending_requests))
        .route("/friend-requests/{request_id}", post(friends::respond_to_request))
        .route("/blocks", post(friends::block))
        .route("/blocks", get(friends::blocked_list))
        .route("/blocks/{blocked_id}", delete(friends::unblock))
        // Groups
        .route("/groups", post(groups::create))
        .route("/groups", get(groups::my_groups))
        .route("/groups/{group_id}", get(groups::detail))
        .route("/groups/{group_id}/members", get(groups::members))
        .route("/groups/{group_id}/members/{user_id}", delete(groups::remove_member))
        .route("/groups/{group_id}/leave", post(groups::leave))
        .route("/groups/{group_id}/invites", post(groups::invite))
        .route("/invites", get(groups::pending_invites))
        .route("/invites/{invite_id}", post(groups::respond_to_invite))
        // Messaging
        .route("/conversations/{peer_id}/messages", post(messages::send_direct))
        .route("/conversations/{peer_id}/messages", get(messages::conversation))
        .route("/conversations/{peer_id}/messages", delete(messages::clear_conversation))
        .route("/conversations/{peer_id}/read", post(reactions::mark_conversation_read))
        .route("/groups/{group_id}/messages", post(messages::send_group))
        .route("/groups/{group_id}/messages", get(messages::group_history))
        .route("/groups/{group_id}/messages", delete(messages::clear_group))
        .route("/messages/search", get(messages::search))
        .route("/messages/{kind}/{message_id}", put(messages::edit))
        .route("/messages/{kind}/{message_id}", delete(messages::delete))
        .route("/messages/{kind}/{message_id}/forward", post(messages::forward))
        // Reactions and read receipts
        .route("/messages/{kind}/{message_id}/reactions", post(reactions::add))
        .route("/messages/{kind}/{message_id}/reactions", get(reactions::list))
        .route("/messages/{kind}/{message_id}/reactions", delete(reactions::remove))
        .route("/messages/{kind}/{message_id}/read", post(reactions::mark_read))
        .route("/messages/{kind}/{message_id}/read", get(reactions::is_read))
        // Attachments
        .route("/attachments", post(attachments::upload))
        .route("/attachments/{locator}", get(attachments::download))
        .layer(middleware::from_fn(require_auth))
        .with_state(state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
