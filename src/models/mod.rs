//! Mesh generation backends.
//!
//! - [`ProceduralModel`](procedural::ProceduralModel): deterministic built-in generator
//! - [`RemoteModel`](remote::RemoteModel): HTTP client for an external inference server
//! - [`ModelHandle`](backend::ModelHandle): process-wide, serialized access to one backend

pub mod backend;
pub mod procedural;
pub mod remote;

pub use backend::{MeshModel, ModelHandle};
pub use procedural::{compute_seed, ProceduralModel};
pub use remote::RemoteModel;
