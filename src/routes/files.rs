//! Artifact retrieval routes
//!
//! Endpoints:
//! - GET /api/v1/files/:handle - Download a stored artifact
//! - DELETE /api/v1/files/:handle - Release an artifact early

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::Result;
use crate::state::AppState;

/// Create the files router
pub fn router() -> Router<AppState> {
    Router::new().route("/:handle", get(download).delete(delete_artifact))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteResponse {
    handle: String,
    deleted: bool,
}

/// GET /api/v1/files/:handle
async fn download(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<impl IntoResponse> {
    let (artifact, content) = state.artifacts().read(&handle).await?;

    tracing::debug!(handle = %handle, size = content.len(), "Serving artifact");

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&artifact.media_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content.len()));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&artifact.display_name)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok((headers, content))
}

/// DELETE /api/v1/files/:handle
///
/// Idempotent: deleting an unknown or already-released handle still
/// reports success.
async fn delete_artifact(
    State(state): State<AppState>,
    Path(handle): Path<String>,
) -> Result<Json<DeleteResponse>> {
    state.artifacts().delete(&handle).await;

    Ok(Json(DeleteResponse {
        handle,
        deleted: true,
    }))
}

/// Build a Content-Disposition header value with both the ASCII fallback
/// and the RFC 5987 encoded form.
fn content_disposition(file_name: &str) -> String {
    let ascii: String = file_name
        .chars()
        .map(|c| if c.is_ascii() && c != '"' && c != '\\' { c } else { '_' })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii,
        urlencoding::encode(file_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_escapes_non_ascii() {
        let value = content_disposition("résumé.pdf");
        assert!(value.starts_with("attachment; filename=\"r_sum_.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }

    #[test]
    fn content_disposition_passes_plain_names_through() {
        let value = content_disposition("merged.pdf");
        assert!(value.contains("filename=\"merged.pdf\""));
    }
}
