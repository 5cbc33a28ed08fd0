//! HTTP surface for the Ember backend: axum handlers over the ember-db
//! stores, JWT bearer auth, and attachment storage.

pub mod attachments;
pub mod auth;
pub mod error;
pub mod friends;
pub mod groups;
pub mod messages;
pub mod middleware;
pub mod reactions;

use std::sync::Arc;

use ember_db::Database;

use attachments::AttachmentStore;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub attachments: AttachmentStore,
}

/// Run a blocking store call off the async runtime and map both join and
/// store failures into an API error.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, error::ApiError>
where
    F: FnOnce() -> Result<T, ember_types::StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            tracing::error!("spawn_blocking join error: {e}");
            error::ApiError::from(ember_types::StoreError::Internal(e.to_string()))
        })?
        .map_err(error::ApiError::from)
}
