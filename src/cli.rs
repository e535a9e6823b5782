//! Command-line interface.
//!
//! Without `--prompt` the binary serves HTTP. With `--prompt` it runs the
//! generation pipeline once and prints the asset id. Flags override the
//! values loaded from the environment.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{Device, ExportPolicy, ModelBackend, ServerConfig};
use crate::types::GenerationRequest;

/// Available mesh generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Deterministic built-in generator, runs on the CPU
    Procedural,
    /// External inference server reached over HTTP
    Remote,
}

impl From<BackendArg> for ModelBackend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Procedural => ModelBackend::Procedural,
            BackendArg::Remote => ModelBackend::Remote,
        }
    }
}

/// What to do when the web-viewer export fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PolicyArg {
    /// Discard the whole asset
    Strict,
    /// Keep the asset without the GLB file
    Permissive,
}

impl From<PolicyArg> for ExportPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Strict => ExportPolicy::Strict,
            PolicyArg::Permissive => ExportPolicy::Permissive,
        }
    }
}

/// Compute device hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Auto,
    Cpu,
    Cuda,
    Metal,
}

impl From<DeviceArg> for Device {
    fn from(arg: DeviceArg) -> Self {
        match arg {
            DeviceArg::Auto => Device::Auto,
            DeviceArg::Cpu => Device::Cpu,
            DeviceArg::Cuda => Device::Cuda,
            DeviceArg::Metal => Device::Metal,
        }
    }
}

/// meshgen-server: text-to-3D mesh generation service
#[derive(Parser, Debug)]
#[command(name = "meshgen-server")]
#[command(about = "Text-to-3D mesh generation over HTTP")]
#[command(version)]
pub struct Cli {
    /// Generate one asset for this prompt and exit instead of serving
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Classifier-free guidance scale (1.0-50.0)
    #[arg(short, long)]
    pub guidance_scale: Option<f64>,

    /// Number of inference steps (16-128)
    #[arg(short, long)]
    pub steps: Option<i64>,

    /// Render frame size (64, 128, 256 or 512)
    #[arg(short, long)]
    pub frame_size: Option<i64>,

    /// Root directory for generated assets
    #[arg(short, long)]
    pub assets_dir: Option<PathBuf>,

    /// Listen address for serve mode
    #[arg(long)]
    pub bind: Option<String>,

    /// Mesh generation backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Base URL of the inference server (remote backend)
    #[arg(long)]
    pub model_url: Option<String>,

    /// Compute device hint
    #[arg(long, value_enum)]
    pub device: Option<DeviceArg>,

    /// Web-viewer export failure policy
    #[arg(long, value_enum)]
    pub policy: Option<PolicyArg>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Overrides `config` with every flag that was given.
    pub fn apply_to(&self, config: &mut ServerConfig) {
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(backend) = self.backend {
            config.backend = backend.into();
        }
        if let Some(url) = &self.model_url {
            config.model_url = url.trim_end_matches('/').to_string();
        }
        if let Some(device) = self.device {
            config.device = device.into();
        }
        if let Some(policy) = self.policy {
            config.export_policy = policy.into();
        }
    }

    /// Builds the one-shot generation request, if a prompt was given.
    pub fn request(&self) -> Option<GenerationRequest> {
        self.prompt.as_deref().map(|prompt| {
            GenerationRequest::from_parts(prompt, self.guidance_scale, self.steps, self.frame_size)
        })
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationDefaults;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("meshgen-server").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_prompt_means_serve_mode() {
        let cli = parse(&[]);
        assert!(cli.request().is_none());
        assert_eq!(cli.log_filter(), "info");
    }

    #[test]
    fn prompt_builds_request() {
        let cli = parse(&["--prompt", "a chair", "--steps", "32", "--frame-size", "128"]);

        let params = cli
            .request()
            .unwrap()
            .validate(&GenerationDefaults::default())
            .unwrap();
        assert_eq!(params.prompt, "a chair");
        assert_eq!(params.steps, 32);
        assert_eq!(params.frame_size, 128);
        assert_eq!(params.guidance_scale, 15.0);
    }

    #[test]
    fn flags_override_config() {
        let cli = parse(&[
            "--assets-dir",
            "/tmp/meshes",
            "--bind",
            "127.0.0.1:8080",
            "--backend",
            "remote",
            "--model-url",
            "http://gpu-box:5001/",
            "--device",
            "cuda",
            "--policy",
            "permissive",
            "-v",
        ]);
        let mut config = ServerConfig::new();
        cli.apply_to(&mut config);

        assert_eq!(config.assets_dir, PathBuf::from("/tmp/meshes"));
        assert_eq!(config.bind, "127.0.0.1:8080");
        assert_eq!(config.backend, ModelBackend::Remote);
        assert_eq!(config.model_url, "http://gpu-box:5001");
        assert_eq!(config.device, Device::Cuda);
        assert_eq!(config.export_policy, ExportPolicy::Permissive);
        assert_eq!(cli.log_filter(), "debug");
    }

    #[test]
    fn absent_flags_leave_config_alone() {
        let mut config = ServerConfig::new();
        let before = config.clone();
        parse(&[]).apply_to(&mut config);
        assert_eq!(config.assets_dir, before.assets_dir);
        assert_eq!(config.bind, before.bind);
        assert_eq!(config.export_policy, before.export_policy);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        assert!(Cli::try_parse_from(["meshgen-server", "--backend", "shap-e"]).is_err());
    }
}
