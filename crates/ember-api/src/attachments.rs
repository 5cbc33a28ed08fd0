//! Attachment storage: given bytes and a suggested name, store them and
//! return a stable locator string usable later to retrieve the same bytes.
//!
//! Locators are `{utc timestamp}_{sanitized original name}`, which keeps them
//! collision-resistant, filesystem-safe, and human-traceable.

use std::path::PathBuf;

use anyhow::{bail, Result};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::{error, info};

/// 10 MB upload limit for images.
const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

pub struct AttachmentStore {
    dir: PathBuf,
}

impl AttachmentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Store bytes under a fresh locator derived from the suggested name.
    pub async fn save(&self, bytes: &[u8], suggested_name: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S_%f");
        let locator = format!("{}_{}", timestamp, sanitize_name(suggested_name));

        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.dir.join(&locator), bytes).await?;

        info!(locator, size = bytes.len(), "attachment stored");
        Ok(locator)
    }

    /// Read the bytes back; `None` when the locator has no file.
    pub async fn read(&self, locator: &str) -> Result<Option<Vec<u8>>> {
        if !is_valid_locator(locator) {
            bail!("invalid attachment locator: {locator}");
        }

        match tokio::fs::read(self.dir.join(locator)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keep locators to one path segment of safe characters.
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

fn is_valid_locator(locator: &str) -> bool {
    !locator.is_empty()
        && locator
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        && !locator.contains("..")
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// Original file name; folded into the locator.
    pub name: Option<String>,
}

/// POST /attachments — raw bytes in, `{ "locator": ... }` out.
pub async fn upload(
    State(state): State<crate::AppState>,
    Query(query): Query<UploadQuery>,
    bytes: Bytes,
) -> Result<impl IntoResponse, StatusCode> {
    if bytes.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(StatusCode::PAYLOAD_TOO_LARGE);
    }

    let name = query.name.as_deref().unwrap_or("attachment");
    let locator = state.attachments.save(&bytes, name).await.map_err(|e| {
        error!("attachment save failed: {e}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "locator": locator }))))
}

/// GET /attachments/{locator} — streams the stored bytes back.
pub async fn download(
    State(state): State<crate::AppState>,
    Path(locator): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    let bytes = state
        .attachments
        .read(&locator)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok((
        [(axum::http::header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let locator = store.save(b"png bytes", "holiday photo.png").await.unwrap();
        assert!(locator.ends_with("holiday_photo.png"));

        let bytes = store.read(&locator).await.unwrap().unwrap();
        assert_eq!(bytes, b"png bytes");
    }

    #[tokio::test]
    async fn same_name_gets_distinct_locators() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        let a = store.save(b"one", "cat.jpg").await.unwrap();
        let b = store.save(b"two", "cat.jpg").await.unwrap();
        assert_ne!(a, b);

        assert_eq!(store.read(&a).await.unwrap().unwrap(), b"one");
        assert_eq!(store.read(&b).await.unwrap().unwrap(), b"two");
    }

    #[tokio::test]
    async fn traversal_locators_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = AttachmentStore::new(dir.path().to_path_buf());

        assert!(store.read("../etc/passwd").await.is_err());
        assert!(store.read("").await.is_err());
        assert!(store.read("no-such-file.png").await.unwrap().is_none());
    }
}
