//! Error types for the meshgen-server.
//!
//! Defines all error codes and types used throughout the server for
//! consistent error handling and reporting.

use std::fmt;

/// Error codes carried by every server error.
///
/// Each code maps to exactly one HTTP status so handlers never have to
/// decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Request body is not a JSON object.
    InvalidRequest,

    /// Prompt is missing, not a string, or outside 1-500 characters.
    InvalidPrompt,

    /// Guidance scale is not a number in [1.0, 50.0].
    InvalidGuidanceScale,

    /// Step count is not an integer in [16, 128].
    InvalidSteps,

    /// Frame size is not one of 64, 128, 256, 512.
    InvalidFrameSize,

    /// A requested path escapes the assets root.
    AccessDenied,

    /// The requested asset file does not exist.
    AssetNotFound,

    /// The assets directory could not be created or written.
    StorageFailed,

    /// The generative model failed or returned an unusable mesh.
    ModelInferenceFailed,

    /// A mandatory export step failed, or an optional one under the strict policy.
    ExportFailed,

    /// The configured model backend could not be reached or constructed.
    ModelUnavailable,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::InvalidPrompt => "INVALID_PROMPT",
            ErrorCode::InvalidGuidanceScale => "INVALID_GUIDANCE_SCALE",
            ErrorCode::InvalidSteps => "INVALID_STEPS",
            ErrorCode::InvalidFrameSize => "INVALID_FRAME_SIZE",
            ErrorCode::AccessDenied => "ACCESS_DENIED",
            ErrorCode::AssetNotFound => "ASSET_NOT_FOUND",
            ErrorCode::StorageFailed => "STORAGE_FAILED",
            ErrorCode::ModelInferenceFailed => "MODEL_INFERENCE_FAILED",
            ErrorCode::ExportFailed => "EXPORT_FAILED",
            ErrorCode::ModelUnavailable => "MODEL_UNAVAILABLE",
        }
    }

    /// Returns a human-readable description of the error.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "Request body must be a JSON object",
            ErrorCode::InvalidPrompt => "Prompt must be a string of 1 to 500 characters",
            ErrorCode::InvalidGuidanceScale => "guidanceScale must be between 1.0 and 50.0",
            ErrorCode::InvalidSteps => "steps must be between 16 and 128",
            ErrorCode::InvalidFrameSize => "frameSize must be 64, 128, 256, or 512",
            ErrorCode::AccessDenied => "Requested path is outside the assets directory",
            ErrorCode::AssetNotFound => "Requested asset file does not exist",
            ErrorCode::StorageFailed => "Failed to create or write the asset directory",
            ErrorCode::ModelInferenceFailed => "Mesh generation failed",
            ErrorCode::ExportFailed => "Failed to export the generated mesh",
            ErrorCode::ModelUnavailable => "The mesh generation backend is unavailable",
        }
    }

    /// Returns the HTTP status code used when this error reaches a client.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest
            | ErrorCode::InvalidPrompt
            | ErrorCode::InvalidGuidanceScale
            | ErrorCode::InvalidSteps
            | ErrorCode::InvalidFrameSize
            | ErrorCode::AccessDenied => 400,
            ErrorCode::AssetNotFound => 404,
            ErrorCode::StorageFailed
            | ErrorCode::ModelInferenceFailed
            | ErrorCode::ExportFailed
            | ErrorCode::ModelUnavailable => 500,
        }
    }

    /// Returns true for codes caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for server operations.
#[derive(Debug)]
pub struct ServerError {
    /// The error code identifying the type of error.
    pub code: ErrorCode,
    /// Human-readable error message. Never contains absolute paths.
    pub message: String,
    /// Optional underlying cause of the error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ServerError {
    /// Creates a new ServerError with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Creates a new ServerError with an underlying cause.
    pub fn with_source(
        code: ErrorCode,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates an INVALID_REQUEST error.
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, reason)
    }

    /// Creates an INVALID_PROMPT error for missing or non-string prompts.
    pub fn missing_prompt() -> Self {
        Self::new(ErrorCode::InvalidPrompt, "Missing prompt")
    }

    /// Creates an INVALID_PROMPT error for prompts that are too long.
    pub fn prompt_too_long(len: usize) -> Self {
        Self::new(
            ErrorCode::InvalidPrompt,
            format!("Prompt too long: {} characters (max 500 characters)", len),
        )
    }

    /// Creates an INVALID_GUIDANCE_SCALE error.
    pub fn invalid_guidance_scale() -> Self {
        Self::new(
            ErrorCode::InvalidGuidanceScale,
            ErrorCode::InvalidGuidanceScale.description(),
        )
    }

    /// Creates an INVALID_STEPS error.
    pub fn invalid_steps() -> Self {
        Self::new(ErrorCode::InvalidSteps, ErrorCode::InvalidSteps.description())
    }

    /// Creates an INVALID_FRAME_SIZE error.
    pub fn invalid_frame_size() -> Self {
        Self::new(
            ErrorCode::InvalidFrameSize,
            ErrorCode::InvalidFrameSize.description(),
        )
    }

    /// Creates an ACCESS_DENIED error.
    pub fn access_denied() -> Self {
        Self::new(ErrorCode::AccessDenied, "Invalid path")
    }

    /// Creates an ASSET_NOT_FOUND error.
    pub fn asset_not_found() -> Self {
        Self::new(ErrorCode::AssetNotFound, "Not found")
    }

    /// Creates a STORAGE_FAILED error.
    pub fn storage_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::StorageFailed,
            format!("Storage failed: {}", reason.into()),
        )
    }

    /// Creates a MODEL_INFERENCE_FAILED error.
    pub fn model_inference_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelInferenceFailed,
            format!("Inference failed: {}", reason.into()),
        )
    }

    /// Creates an EXPORT_FAILED error.
    pub fn export_failed(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ExportFailed,
            format!("Export failed: {}", reason.into()),
        )
    }

    /// Creates a MODEL_UNAVAILABLE error.
    pub fn model_unavailable(reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ModelUnavailable,
            format!("Model unavailable: {}", reason.into()),
        )
    }

    /// Returns true if this error was caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Result type alias using ServerError.
pub type Result<T> = std::result::Result<T, ServerError>;
