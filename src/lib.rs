//! meshgen-server: text-to-3D mesh generation service.
//!
//! Turns a text prompt into a set of mesh files (PLY, OBJ+MTL, GLB) stored
//! under a per-asset directory, and serves those files back over HTTP.
//!
//! # Modules
//!
//! - [`types`]: Requests, validated parameters and the in-memory mesh
//! - [`config`]: Runtime configuration (ServerConfig, Device, ExportPolicy)
//! - [`error`]: Error types and codes (ServerError, ErrorCode)
//! - [`store`]: Asset directories with path containment checks
//! - [`models`]: Mesh generation backends behind a serialized handle
//! - [`export`]: Mesh file writers and the web-viewer converter
//! - [`generation`]: The request-to-asset pipeline
//! - [`http`]: axum router and handlers
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use meshgen_server::{
//!     config::ServerConfig,
//!     generation::GenerationPipeline,
//!     models::ModelHandle,
//!     store::ArtifactStore,
//!     types::GenerationRequest,
//! };
//!
//! let config = ServerConfig::from_env();
//! let store = Arc::new(ArtifactStore::open(&config.assets_dir)?);
//! let model = Arc::new(ModelHandle::from_config(&config)?);
//! let pipeline = GenerationPipeline::from_config(&config, store, model);
//!
//! let request = GenerationRequest::from_parts("a low-poly fox", None, Some(32), Some(128));
//! let asset = pipeline.generate(&request)?;
//! println!("{}", asset.id);
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod generation;
pub mod http;
pub mod models;
pub mod store;
pub mod types;

// Re-export commonly used types at crate root for convenience
pub use config::{Device, ExportPolicy, ModelBackend, ServerConfig};
pub use error::{ErrorCode, Result, ServerError};
pub use types::{GenerationParams, GenerationRequest, TriMesh};
