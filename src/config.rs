//! Server configuration module.
//!
//! Contains the runtime configuration for the meshgen-server: the assets
//! root, request defaults, device and backend selection, and the export
//! policy for the optional web-viewer step.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::GenerationRequest;

/// Execution device reported by the model backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Let the backend pick the best available device.
    #[default]
    Auto,

    /// Force CPU execution.
    Cpu,

    /// NVIDIA GPU acceleration.
    Cuda,

    /// Apple Silicon acceleration.
    Metal,
}

impl Device {
    /// Returns the string representation of the device.
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Auto => "auto",
            Device::Cpu => "cpu",
            Device::Cuda => "cuda",
            Device::Metal => "metal",
        }
    }

    /// Parses a device from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Some(Device::Auto),
            "cpu" => Some(Device::Cpu),
            "cuda" | "gpu" => Some(Device::Cuda),
            "metal" | "mps" => Some(Device::Metal),
            _ => None,
        }
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which mesh generation backend the server drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelBackend {
    /// Built-in deterministic generator, no external service required.
    #[default]
    Procedural,

    /// External inference server reached over HTTP.
    Remote,
}

impl ModelBackend {
    /// Returns the string representation of the backend.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelBackend::Procedural => "procedural",
            ModelBackend::Remote => "remote",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "procedural" | "local" => Some(ModelBackend::Procedural),
            "remote" | "http" => Some(ModelBackend::Remote),
            _ => None,
        }
    }
}

/// What happens to an asset when the optional web-viewer export fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportPolicy {
    /// Any export failure invalidates the asset; its directory is removed.
    #[default]
    Strict,

    /// The asset is kept with the mandatory files; the failure is logged.
    Permissive,
}

impl ExportPolicy {
    /// Returns the string representation of the policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportPolicy::Strict => "strict",
            ExportPolicy::Permissive => "permissive",
        }
    }

    /// Parses a policy from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "strict" => Some(ExportPolicy::Strict),
            "permissive" | "lenient" => Some(ExportPolicy::Permissive),
            _ => None,
        }
    }
}

/// Values substituted for fields a request omits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    pub guidance_scale: f64,
    pub steps: i64,
    pub frame_size: i64,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            guidance_scale: 15.0,
            steps: 64,
            frame_size: 256,
        }
    }
}

/// Runtime configuration for the server.
///
/// Loaded once at startup from environment variables, then optionally
/// overridden by command-line flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Root directory holding one subdirectory per asset.
    pub assets_dir: PathBuf,

    /// Defaults for omitted request fields.
    pub defaults: GenerationDefaults,

    /// Execution device hint passed to the backend.
    pub device: Device,

    /// Mesh generation backend.
    pub backend: ModelBackend,

    /// Base URL of the remote inference server (remote backend only).
    pub model_url: String,

    /// Fate of an asset whose web-viewer export failed.
    pub export_policy: ExportPolicy,

    /// Listen address for the HTTP server.
    pub bind: String,
}

impl ServerConfig {
    /// Creates a new ServerConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ServerConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `MESHGEN_ASSETS_DIR` - Assets root directory
    /// - `MESHGEN_GUIDANCE_DEFAULT` - Default guidance scale
    /// - `MESHGEN_STEPS_DEFAULT` - Default inference steps
    /// - `MESHGEN_FRAME_DEFAULT` - Default frame size
    /// - `MESHGEN_DEVICE` - Device selection (auto, cpu, cuda, metal)
    /// - `MESHGEN_BACKEND` - Model backend (procedural, remote)
    /// - `MESHGEN_MODEL_URL` - Remote inference server base URL
    /// - `MESHGEN_EXPORT_POLICY` - strict or permissive
    /// - `MESHGEN_BIND` - HTTP listen address
    ///
    /// Falls back to defaults for unset or unparsable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("MESHGEN_ASSETS_DIR") {
            if !path.trim().is_empty() {
                config.assets_dir = PathBuf::from(path);
            }
        }

        if let Some(guidance) = lookup("MESHGEN_GUIDANCE_DEFAULT").and_then(|s| s.parse().ok()) {
            config.defaults.guidance_scale = guidance;
        }

        if let Some(steps) = lookup("MESHGEN_STEPS_DEFAULT").and_then(|s| s.parse().ok()) {
            config.defaults.steps = steps;
        }

        if let Some(frame) = lookup("MESHGEN_FRAME_DEFAULT").and_then(|s| s.parse().ok()) {
            config.defaults.frame_size = frame;
        }

        if let Some(device) = lookup("MESHGEN_DEVICE").and_then(|s| Device::parse(&s)) {
            config.device = device;
        }

        if let Some(backend) = lookup("MESHGEN_BACKEND").and_then(|s| ModelBackend::parse(&s)) {
            config.backend = backend;
        }

        if let Some(url) = lookup("MESHGEN_MODEL_URL") {
            if !url.trim().is_empty() {
                config.model_url = url.trim_end_matches('/').to_string();
            }
        }

        if let Some(policy) = lookup("MESHGEN_EXPORT_POLICY").and_then(|s| ExportPolicy::parse(&s))
        {
            config.export_policy = policy;
        }

        if let Some(bind) = lookup("MESHGEN_BIND") {
            if !bind.trim().is_empty() {
                config.bind = bind;
            }
        }

        config
    }

    /// Validates the configuration.
    ///
    /// The defaults are run through request validation so a bad default
    /// stops the process at startup instead of failing every request.
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.assets_dir.as_os_str().is_empty() {
            return Some("assets directory must not be empty".to_string());
        }

        let sample = GenerationRequest {
            prompt: Some(serde_json::Value::String("sample".to_string())),
            ..Default::default()
        };
        if let Err(e) = sample.validate(&self.defaults) {
            return Some(format!("invalid generation default: {}", e.message));
        }

        if self.backend == ModelBackend::Remote && !self.model_url.starts_with("http") {
            return Some(format!("model url must be http(s): {}", self.model_url));
        }

        None
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("./data/assets"),
            defaults: GenerationDefaults::default(),
            device: Device::Auto,
            backend: ModelBackend::default(),
            model_url: "http://127.0.0.1:5001".to_string(),
            export_policy: ExportPolicy::default(),
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}
