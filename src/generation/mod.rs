//! Mesh generation module.
//!
//! Provides the request-to-asset pipeline.

pub mod pipeline;

// Re-export commonly used items
pub use pipeline::{GeneratedAsset, GenerationPipeline};
