//! Artifact store for generated assets.
//!
//! Owns the assets root directory: one subdirectory per asset, with every
//! path handed out checked to stay inside the root.

pub mod assets;

// Re-export commonly used types
pub use assets::ArtifactStore;
