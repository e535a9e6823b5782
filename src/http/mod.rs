//! HTTP module for the mesh generation service.
//!
//! Routes:
//! - `POST /generate3D`: generate an asset, returns `{"id": ...}`
//! - `GET /data/assets/{id}/{filename}`: serve one file of an asset
//! - `GET /health`: liveness and active compute device

pub mod handlers;
pub mod server;
pub mod types;

// Re-export commonly used types
pub use server::{build_router, run_server, AppState};
pub use types::{ApiError, ErrorBody, GenerateResponse, HealthResponse};
