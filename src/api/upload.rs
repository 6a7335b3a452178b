//! Upload API endpoints
//!
//! - POST /api/v1/upload/cover - Upload an article cover image
//! - POST /api/v1/upload/attachment - Upload an article manuscript (PDF, DOC, DOCX)
//!
//! Files land in `<upload.path>/covers/` or `<upload.path>/attachments/`
//! under a random name and are served from `/media/`.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::Serialize;
use std::path::Path;
use tokio::fs;
use uuid::Uuid;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::config::UploadConfig;

const COVER_DIR: &str = "covers";
const ATTACHMENT_DIR: &str = "attachments";

/// Response for successful upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Public URL, usable as an article's `cover_image` or `attachment`
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

/// POST /api/v1/upload/cover
///
/// Accepts multipart/form-data with a single file field named "file".
pub async fn upload_cover(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    if !(user.0.is_author() || user.0.is_admin()) {
        return Err(ApiError::permission_denied(
            "Only authors can upload cover images",
        ));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let response = store_cover(&state.upload_config, &content_type, &data).await?;
        tracing::info!(user_id = user.0.id, file = %response.filename, "Cover image uploaded");
        return Ok(Json(response));
    }

    Err(ApiError::validation_error("No file provided"))
}

/// POST /api/v1/upload/attachment
///
/// Accepts multipart/form-data with a single file field named "file". The
/// type is taken from the file name's extension.
pub async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    if !user.0.is_author() {
        return Err(ApiError::permission_denied(
            "Only authors can upload article files",
        ));
    }

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        let response =
            store_attachment(&state.upload_config, &filename, &content_type, &data).await?;
        tracing::info!(user_id = user.0.id, file = %response.filename, "Article file uploaded");
        return Ok(Json(response));
    }

    Err(ApiError::validation_error("No file provided"))
}

/// Validate and write one article attachment
pub(crate) async fn store_attachment(
    config: &UploadConfig,
    original_name: &str,
    content_type: &str,
    data: &[u8],
) -> Result<UploadResponse, ApiError> {
    let Some(extension) = config.attachment_extension(original_name) else {
        return Err(ApiError::validation_error(format!(
            "Allowed file types: {}",
            config.attachment_extensions.join(", ")
        )));
    };
    if data.is_empty() {
        return Err(ApiError::validation_error("File is empty"));
    }
    if data.len() as u64 > config.max_attachment_size {
        return Err(ApiError::validation_error(format!(
            "File size must not exceed {} MB",
            config.max_attachment_size / 1024 / 1024
        )));
    }

    let dir = config.path.join(ATTACHMENT_DIR);
    ensure_upload_dir(&dir).await?;

    let filename = format!("{}.{}", Uuid::new_v4(), extension);
    fs::write(dir.join(&filename), data)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    Ok(UploadResponse {
        url: format!("/media/{}/{}", ATTACHMENT_DIR, filename),
        filename,
        size: data.len() as u64,
        content_type: content_type.to_string(),
    })
}

/// Validate and write one cover image
pub(crate) async fn store_cover(
    config: &UploadConfig,
    content_type: &str,
    data: &[u8],
) -> Result<UploadResponse, ApiError> {
    if !config.is_type_allowed(content_type) {
        return Err(ApiError::validation_error(format!(
            "Invalid file type: {}. Allowed types: {:?}",
            content_type, config.allowed_types
        )));
    }
    if data.is_empty() {
        return Err(ApiError::validation_error("File is empty"));
    }
    if data.len() as u64 > config.max_file_size {
        return Err(ApiError::validation_error(format!(
            "File too large. Maximum size: {} MB",
            config.max_file_size / 1024 / 1024
        )));
    }

    let dir = config.path.join(COVER_DIR);
    ensure_upload_dir(&dir).await?;

    let filename = format!("{}.{}", Uuid::new_v4(), config.get_extension(content_type));
    fs::write(dir.join(&filename), data)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to save file: {}", e)))?;

    Ok(UploadResponse {
        url: format!("/media/{}/{}", COVER_DIR, filename),
        filename,
        size: data.len() as u64,
        content_type: content_type.to_string(),
    })
}

async fn ensure_upload_dir(path: &Path) -> Result<(), ApiError> {
    fs::create_dir_all(path)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to create upload dir: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> UploadConfig {
        UploadConfig {
            path: dir.path().to_path_buf(),
            max_file_size: 16,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_store_cover_writes_file() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let response = store_cover(&config, "image/png", b"\x89PNG").await.unwrap();
        assert!(response.url.starts_with("/media/covers/"));
        assert!(response.filename.ends_with(".png"));
        assert_eq!(response.size, 4);

        let saved = dir.path().join("covers").join(&response.filename);
        assert_eq!(std::fs::read(saved).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_store_cover_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let err = store_cover(&config, "text/html", b"<html>").await.unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");

        let err = store_cover(&config, "image/png", &[0u8; 17]).await.unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");

        let err = store_cover(&config, "image/png", &[]).await.unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_store_attachment_checks_extension_and_size() {
        let dir = TempDir::new().unwrap();
        let config = UploadConfig {
            max_attachment_size: 8,
            ..config(&dir)
        };

        let response = store_attachment(&config, "Maqola.PDF", "application/pdf", b"%PDF-1.7")
            .await
            .unwrap();
        assert!(response.url.starts_with("/media/attachments/"));
        assert!(response.filename.ends_with(".pdf"));
        let saved = dir.path().join("attachments").join(&response.filename);
        assert_eq!(std::fs::read(saved).unwrap(), b"%PDF-1.7");

        let err = store_attachment(&config, "rasm.png", "image/png", b"\x89PNG")
            .await
            .unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");

        let err = store_attachment(&config, "katta.docx", "application/msword", &[0u8; 9])
            .await
            .unwrap_err();
        assert_eq!(err.error.code, "VALIDATION_ERROR");
        assert!(err.error.message.contains("must not exceed"));
    }
}
