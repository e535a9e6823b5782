//! Response bodies and error mapping for the HTTP surface.
//!
//! Every failure is a JSON object with an `error` field and, for server
//! errors, a `details` field. Bodies never carry stack traces or paths.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::ServerError;

/// Headline for failures after validation on `/generate3D`.
pub const GENERATION_FAILED: &str = "Failed to generate 3D model";

/// Headline for other internal failures.
pub const INTERNAL_ERROR: &str = "Internal server error";

/// Body of a successful `POST /generate3D`.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub id: String,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub device: String,
}

/// Body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A [`ServerError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError {
    inner: ServerError,
    headline: &'static str,
}

impl ApiError {
    /// Wraps an error raised while generating an asset.
    pub fn generation(inner: ServerError) -> Self {
        Self {
            inner,
            headline: GENERATION_FAILED,
        }
    }

    pub fn code(&self) -> crate::error::ErrorCode {
        self.inner.code
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.inner.code.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Builds the JSON body.
    ///
    /// Client errors show their own message; server errors show the
    /// headline with the message as details.
    pub fn body(&self) -> ErrorBody {
        if self.inner.is_client_error() {
            ErrorBody {
                error: self.inner.message.clone(),
                details: None,
            }
        } else {
            ErrorBody {
                error: self.headline.to_string(),
                details: Some(self.inner.message.clone()),
            }
        }
    }
}

impl From<ServerError> for ApiError {
    fn from(inner: ServerError) -> Self {
        Self {
            inner,
            headline: INTERNAL_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
