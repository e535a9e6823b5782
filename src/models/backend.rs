//! Model abstraction for mesh generation backends.
//!
//! The generative model is a black box: validated parameters in, mesh out.
//! A [`ModelHandle`] owns exactly one backend for the life of the process
//! and serializes calls into it, since the compute device cannot run two
//! generations at once.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use tracing::{error, info};

use crate::config::{ModelBackend, ServerConfig};
use crate::error::{Result, ServerError};
use crate::types::{GenerationParams, TriMesh};

use super::procedural::ProceduralModel;
use super::remote::RemoteModel;

/// A text-to-mesh generator.
pub trait MeshModel: Send {
    /// Backend name used in logs.
    fn name(&self) -> &str;

    /// Compute device the backend runs on.
    fn device(&self) -> &str;

    /// Generates a mesh for the given parameters. Blocks until done.
    fn generate(&mut self, params: &GenerationParams) -> Result<TriMesh>;
}

/// Single-owner handle to the process-wide model.
pub struct ModelHandle {
    model: Mutex<Box<dyn MeshModel>>,
    name: String,
    device: String,
}

impl ModelHandle {
    /// Wraps a model. The device string is captured once here.
    pub fn new(model: Box<dyn MeshModel>) -> Self {
        let name = model.name().to_string();
        let device = model.device().to_string();
        Self {
            model: Mutex::new(model),
            name,
            device,
        }
    }

    /// Builds the backend selected by `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        let model: Box<dyn MeshModel> = match config.backend {
            ModelBackend::Procedural => Box::new(ProceduralModel::new()),
            ModelBackend::Remote => Box::new(RemoteModel::connect(&config.model_url, config.device)?),
        };
        Ok(Self::new(model))
    }

    /// Backend name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Device reported at construction; stable for the process lifetime.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Runs one generation while holding the model lock.
    ///
    /// Concurrent callers queue on the lock. The returned mesh has passed
    /// structural validation. A panicking backend is reported as an
    /// inference failure and the lock stays usable for the next caller.
    pub fn invoke(&self, params: &GenerationParams) -> Result<TriMesh> {
        let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        let outcome = catch_unwind(AssertUnwindSafe(|| model.generate(params)));
        drop(model);

        let mesh = match outcome {
            Ok(result) => result?,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                error!(backend = %self.name, reason = %reason, "model panicked");
                return Err(ServerError::model_inference_failed("model backend crashed"));
            }
        };

        mesh.validate().map_err(ServerError::model_inference_failed)?;

        info!(
            backend = %self.name,
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "model produced mesh"
        );
        Ok(mesh)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("name", &self.name)
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Device;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn params() -> GenerationParams {
        GenerationParams {
            prompt: "a teapot".to_string(),
            guidance_scale: 15.0,
            steps: 16,
            frame_size: 64,
        }
    }

    /// Records how many generate calls overlap.
    struct CountingModel {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl MeshModel for CountingModel {
        fn name(&self) -> &str {
            "counting"
        }

        fn device(&self) -> &str {
            "cpu"
        }

        fn generate(&mut self, _params: &GenerationParams) -> Result<TriMesh> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(TriMesh::new(
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                vec![[0, 1, 2]],
            ))
        }
    }

    struct BrokenModel;

    impl MeshModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        fn device(&self) -> &str {
            "cpu"
        }

        fn generate(&mut self, _params: &GenerationParams) -> Result<TriMesh> {
            Ok(TriMesh::new(vec![[0.0, 0.0, 0.0]], vec![[0, 1, 2]]))
        }
    }

    #[test]
    fn invocations_never_overlap() {
        let peak = Arc::new(AtomicUsize::new(0));
        let handle = Arc::new(ModelHandle::new(Box::new(CountingModel {
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::clone(&peak),
        })));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = Arc::clone(&handle);
                thread::spawn(move || handle.invoke(&params()).unwrap())
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    struct PanickingModel {
        calls: usize,
    }

    impl MeshModel for PanickingModel {
        fn name(&self) -> &str {
            "panicking"
        }

        fn device(&self) -> &str {
            "cpu"
        }

        fn generate(&mut self, _params: &GenerationParams) -> Result<TriMesh> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("device fault");
            }
            Ok(TriMesh::new(
                vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
                vec![[0, 1, 2]],
            ))
        }
    }

    #[test]
    fn panic_is_an_inference_failure_and_lock_recovers() {
        let handle = ModelHandle::new(Box::new(PanickingModel { calls: 0 }));

        let err = handle.invoke(&params()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelInferenceFailed);
        assert!(err.message.contains("crashed"));

        let mesh = handle.invoke(&params()).unwrap();
        assert_eq!(mesh.face_count(), 1);
    }

    #[test]
    fn invalid_mesh_is_an_inference_failure() {
        let handle = ModelHandle::new(Box::new(BrokenModel));
        let err = handle.invoke(&params()).unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::ModelInferenceFailed);
    }

    #[test]
    fn procedural_backend_from_default_config() {
        let mut config = ServerConfig::new();
        config.device = Device::Cpu;
        let handle = ModelHandle::from_config(&config).unwrap();
        assert_eq!(handle.name(), "procedural");
        assert_eq!(handle.device(), "cpu");
    }
}
