//! Core types for the meshgen-server.
//!
//! This module re-exports all the core data types used throughout the server:
//! - [`GenerationRequest`]: A raw, possibly incomplete generation request
//! - [`GenerationParams`]: The validated parameters handed to the model
//! - [`TriMesh`]: The in-memory mesh produced by the model

mod mesh;
mod request;

// Re-export all types at the module level
pub use mesh::TriMesh;
pub use request::{
    GenerationParams, GenerationRequest, FRAME_SIZES, GUIDANCE_RANGE, MAX_PROMPT_CHARS,
    STEPS_RANGE,
};
