//! Remote inference backend.
//!
//! Forwards generation to an HTTP inference server that runs the actual
//! text-to-3D model on an accelerator:
//!
//! - `GET {url}/health` returns `{"device": "..."}`
//! - `POST {url}/generate` takes the validated parameters and returns
//!   `{"vertices": [[x,y,z],...], "faces": [[a,b,c],...], "colors": [...]}`
//!
//! Uses the blocking reqwest client. Never call into this type from an
//! async context; the server runs generation on blocking threads.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Device;
use crate::error::{ErrorCode, Result, ServerError};
use crate::types::{GenerationParams, TriMesh};

use super::backend::MeshModel;

/// Upper bound on one generation; large frame sizes can take minutes.
const GENERATE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Timeout for the startup health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    prompt: &'a str,
    guidance_scale: f64,
    steps: u32,
    frame_size: u32,
    output_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct HealthBody {
    device: Option<String>,
}

/// Client for a remote inference server.
pub struct RemoteModel {
    client: reqwest::blocking::Client,
    base_url: String,
    device: String,
}

impl RemoteModel {
    /// Creates a client and asks the server which device it runs on.
    ///
    /// An unreachable server is not fatal here: the configured device is
    /// reported instead and generation requests fail until it comes up.
    pub fn connect(base_url: &str, fallback: Device) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(GENERATE_TIMEOUT)
            .build()
            .map_err(|e| {
                ServerError::with_source(
                    ErrorCode::ModelUnavailable,
                    "Failed to create HTTP client",
                    e,
                )
            })?;

        let base_url = base_url.trim_end_matches('/').to_string();
        let device = match probe_device(&client, &base_url) {
            Ok(device) => device,
            Err(e) => {
                warn!(error = %e, "inference server health probe failed");
                fallback.as_str().to_string()
            }
        };

        Ok(Self {
            client,
            base_url,
            device,
        })
    }
}

fn probe_device(client: &reqwest::blocking::Client, base_url: &str) -> Result<String> {
    let response = client
        .get(format!("{}/health", base_url))
        .timeout(HEALTH_TIMEOUT)
        .send()
        .map_err(|e| {
            ServerError::with_source(
                ErrorCode::ModelUnavailable,
                "Model unavailable: inference server unreachable",
                e,
            )
        })?;

    if !response.status().is_success() {
        return Err(ServerError::model_unavailable(format!(
            "health check returned HTTP {}",
            response.status().as_u16()
        )));
    }

    let body: HealthBody = response.json().map_err(|e| {
        ServerError::with_source(
            ErrorCode::ModelUnavailable,
            "Model unavailable: malformed health response",
            e,
        )
    })?;

    body.device
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| ServerError::model_unavailable("health response has no device"))
}

impl MeshModel for RemoteModel {
    fn name(&self) -> &str {
        "remote"
    }

    fn device(&self) -> &str {
        &self.device
    }

    fn generate(&mut self, params: &GenerationParams) -> Result<TriMesh> {
        let body = GenerateBody {
            prompt: &params.prompt,
            guidance_scale: params.guidance_scale,
            steps: params.steps,
            frame_size: params.frame_size,
            output_type: "mesh",
        };

        debug!(steps = params.steps, frame_size = params.frame_size, "forwarding generation");

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&body)
            .send()
            .map_err(|e| {
                ServerError::with_source(
                    ErrorCode::ModelUnavailable,
                    "Model unavailable: inference server unreachable",
                    e,
                )
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServerError::model_inference_failed(format!(
                "inference server returned HTTP {}",
                status.as_u16()
            )));
        }

        response.json::<TriMesh>().map_err(|e| {
            ServerError::with_source(
                ErrorCode::ModelInferenceFailed,
                "Inference failed: malformed mesh response",
                e,
            )
        })
    }
}

impl std::fmt::Debug for RemoteModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteModel")
            .field("base_url", &self.base_url)
            .field("device", &self.device)
            .finish()
    }
}
