//! HTTP server over axum.
//!
//! Builds the router around shared state and runs it until Ctrl-C.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::generation::GenerationPipeline;

use super::handlers::{generate_3d, get_asset, health, not_found};

/// State shared across all request handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Pipeline, which also owns the artifact store and the model handle.
    pub pipeline: Arc<GenerationPipeline>,
}

impl AppState {
    pub fn new(pipeline: GenerationPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

/// Creates the application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/generate3D", post(generate_3d))
        .route("/data/assets/:id/*filename", get(get_asset))
        .route("/health", get(health))
        .fallback(not_found)
        .with_state(state)
}

/// Binds `addr` and serves until the process receives Ctrl-C.
pub async fn run_server(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %listener.local_addr()?,
        device = state.pipeline.model().device(),
        root = %state.pipeline.store().root().display(),
        "HTTP server listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    // If the handler cannot be installed, run until killed.
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExportPolicy, GenerationDefaults};
    use crate::error::{Result, ServerError};
    use crate::export::{MeshConverter, MeshExporter};
    use crate::models::{MeshModel, ModelHandle, ProceduralModel};
    use crate::types::{GenerationParams, TriMesh};
    use crate::store::ArtifactStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    struct FailingConverter;

    impl MeshConverter for FailingConverter {
        fn name(&self) -> &str {
            "failing"
        }

        fn convert(&self, _source: &Path, _target: &Path) -> Result<()> {
            Err(ServerError::export_failed("converter unavailable"))
        }
    }

    /// Panics on the first call, then behaves.
    struct FlakyModel {
        calls: usize,
    }

    impl MeshModel for FlakyModel {
        fn name(&self) -> &str {
            "flaky"
        }

        fn device(&self) -> &str {
            "cpu"
        }

        fn generate(&mut self, params: &GenerationParams) -> Result<TriMesh> {
            self.calls += 1;
            if self.calls == 1 {
                panic!("kernel launch failed");
            }
            ProceduralModel::new().generate(params)
        }
    }

    fn app_with(exporter: MeshExporter) -> (TempDir, Router) {
        app_with_model(Box::new(ProceduralModel::new()), exporter)
    }

    fn app_with_model(model: Box<dyn MeshModel>, exporter: MeshExporter) -> (TempDir, Router) {
        let dir = tempdir().unwrap();
        let pipeline = GenerationPipeline::new(
            Arc::new(ArtifactStore::open(dir.path().join("assets")).unwrap()),
            Arc::new(ModelHandle::new(model)),
            exporter,
            GenerationDefaults::default(),
            ExportPolicy::Strict,
        );
        (dir, build_router(AppState::new(pipeline)))
    }

    fn app() -> (TempDir, Router) {
        app_with(MeshExporter::new())
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/generate3D")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn asset_count(dir: &TempDir) -> usize {
        std::fs::read_dir(dir.path().join("assets")).unwrap().count()
    }

    #[tokio::test]
    async fn health_is_stable_across_calls() {
        let (_dir, app) = app();
        let mut bodies = Vec::new();
        for _ in 0..3 {
            let response = app.clone().oneshot(get("/health")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            bodies.push(json_body(response).await);
        }
        assert_eq!(bodies[0], json!({"ok": true, "device": "cpu"}));
        assert!(bodies.iter().all(|b| *b == bodies[0]));
    }

    #[tokio::test]
    async fn generate_then_fetch_files() {
        let (dir, app) = app();

        let response = app
            .clone()
            .oneshot(post_json(r#"{"prompt": "a wooden stool", "frameSize": 64, "steps": 16}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let id = json_body(response).await["id"].as_str().unwrap().to_string();

        for (file, mime) in [
            ("mesh.glb", "model/gltf-binary"),
            ("mesh.obj", "model/obj"),
            ("mesh.mtl", "model/mtl"),
            ("mesh.ply", "application/octet-stream"),
        ] {
            let response = app
                .clone()
                .oneshot(get(&format!("/data/assets/{}/{}", id, file)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{}", file);
            assert_eq!(response.headers()[header::CONTENT_TYPE], mime);
            assert_eq!(response.headers()[header::CONTENT_DISPOSITION], "inline");

            let on_disk = std::fs::read(dir.path().join("assets").join(&id).join(file)).unwrap();
            assert_eq!(
                response.headers()[header::CONTENT_LENGTH],
                on_disk.len().to_string().as_str()
            );
            let served = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(served.as_ref(), on_disk.as_slice(), "{}", file);
        }
    }

    #[tokio::test]
    async fn model_panic_is_500_and_service_recovers() {
        let (dir, app) = app_with_model(Box::new(FlakyModel { calls: 0 }), MeshExporter::new());
        let body = r#"{"prompt": "a clay pot", "frameSize": 64}"#;

        let response = app.clone().oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let error = json_body(response).await;
        assert_eq!(error["error"], "Failed to generate 3D model");
        assert_eq!(asset_count(&dir), 0);

        let response = app.oneshot(post_json(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(json_body(response).await["id"].is_string());
        assert_eq!(asset_count(&dir), 1);
    }

    #[tokio::test]
    async fn validation_errors_are_400_without_side_effects() {
        let (dir, app) = app();
        let cases = [
            (r#"{}"#, "Missing prompt"),
            (r#"{"prompt": 12}"#, "Missing prompt"),
            (r#"{"prompt": "x", "guidanceScale": 51}"#, "guidanceScale must be between 1.0 and 50.0"),
            (r#"{"prompt": "x", "steps": 8}"#, "steps must be between 16 and 128"),
            (r#"{"prompt": "x", "frameSize": 300}"#, "frameSize must be 64, 128, 256, or 512"),
            ("not json", "Invalid JSON body"),
        ];
        for (body, message) in cases {
            let response = app.clone().oneshot(post_json(body)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
            assert_eq!(json_body(response).await, json!({"error": message}));
        }
        assert_eq!(asset_count(&dir), 0);
    }

    #[tokio::test]
    async fn strict_export_failure_is_500_and_cleans_up() {
        let (dir, app) = app_with(MeshExporter::with_converter(Box::new(FailingConverter)));
        let response = app
            .oneshot(post_json(r#"{"prompt": "a lamp", "frameSize": 64}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "Failed to generate 3D model");
        assert!(body["details"].as_str().unwrap().contains("converter unavailable"));
        assert_eq!(asset_count(&dir), 0);
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let (dir, app) = app();
        std::fs::write(dir.path().join("secret.txt"), "top secret").unwrap();

        for uri in [
            "/data/assets/../../etc/passwd",
            "/data/assets/../secret.txt",
            "/data/assets/abc/..%2F..%2Fsecret.txt",
            "/data/assets/abc/%2Fetc%2Fpasswd",
        ] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);
            assert_eq!(json_body(response).await, json!({"error": "Invalid path"}));
        }
    }

    #[tokio::test]
    async fn missing_files_are_404() {
        let (_dir, app) = app();
        for uri in ["/data/assets/0000/mesh.glb", "/nope"] {
            let response = app.clone().oneshot(get(uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
            assert_eq!(json_body(response).await, json!({"error": "Not found"}));
        }
    }
}
