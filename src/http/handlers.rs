//! HTTP request handlers.

use std::path::Path;

use axum::body::{Body, Bytes};
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

use crate::error::{ErrorCode, ServerError};
use crate::types::GenerationRequest;

use super::server::AppState;
use super::types::{ApiError, ErrorBody, GenerateResponse, HealthResponse};

/// `POST /generate3D`
///
/// Parses the body by hand so a malformed body gets the same JSON error
/// shape as every other failure. Generation itself runs on a blocking
/// thread.
pub async fn generate_3d(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenerateResponse>, ApiError> {
    let request = parse_request(&body)?;

    let pipeline = state.pipeline.clone();
    let asset = tokio::task::spawn_blocking(move || pipeline.generate(&request))
        .await
        .map_err(|e| {
            ApiError::generation(ServerError::with_source(
                ErrorCode::ModelInferenceFailed,
                "Inference failed: generation task aborted",
                e,
            ))
        })?
        .map_err(ApiError::generation)?;

    info!(asset_id = %asset.id, prompt_chars = asset.params.prompt.chars().count(), "generate3D ok");
    Ok(Json(GenerateResponse { id: asset.id }))
}

fn parse_request(body: &[u8]) -> Result<GenerationRequest, ApiError> {
    let invalid = || ServerError::invalid_request("Invalid JSON body");
    match serde_json::from_slice::<Value>(body) {
        Ok(value @ Value::Object(_)) => {
            serde_json::from_value(value).map_err(|_| ApiError::from(invalid()))
        }
        _ => Err(invalid().into()),
    }
}

/// `GET /data/assets/{id}/{*filename}`
pub async fn get_asset(
    State(state): State<AppState>,
    UrlPath((id, filename)): UrlPath<(String, String)>,
) -> Result<Response, ApiError> {
    let path = state.pipeline.store().resolve(&id, &filename)?;

    let len = match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => meta.len(),
        _ => {
            debug!(asset_id = %id, filename = %filename, "asset file not found");
            return Err(ServerError::asset_not_found().into());
        }
    };
    let file = tokio::fs::File::open(&path).await.map_err(|e| {
        ServerError::with_source(ErrorCode::StorageFailed, "Failed to read asset", e)
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type(&path).to_string()),
            (header::CONTENT_LENGTH, len.to_string()),
            (header::CONTENT_DISPOSITION, "inline".to_string()),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        device: state.pipeline.model().device().to_string(),
    })
}

/// Fallback for unknown routes.
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            error: "Not found".to_string(),
            details: None,
        }),
    )
}

/// MIME type for a served asset file.
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("glb") => "model/gltf-binary",
        Some("gltf") => "model/gltf+json",
        Some("obj") => "model/obj",
        Some("mtl") => "model/mtl",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type(Path::new("a/mesh.glb")), "model/gltf-binary");
        assert_eq!(content_type(Path::new("a/mesh.OBJ")), "model/obj");
        assert_eq!(content_type(Path::new("a/mesh.mtl")), "model/mtl");
        assert_eq!(content_type(Path::new("a/mesh.ply")), "application/octet-stream");
        assert_eq!(content_type(Path::new("a/noext")), "application/octet-stream");
    }

    #[test]
    fn request_body_must_be_an_object() {
        assert!(parse_request(br#"{"prompt": "a hat"}"#).is_ok());
        for bad in [&b"not json"[..], b"[1,2]", b"\"prompt\"", b""] {
            let err = parse_request(bad).unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidRequest);
        }
    }
}
