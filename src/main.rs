//! meshgen-server: text-to-3D mesh generation service.
//!
//! This binary can run in two modes:
//! - Serve mode: HTTP server exposing `/generate3D`, asset files and `/health`
//! - Generate mode: one pipeline run for `--prompt`, then exit

use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::info;
use tracing_subscriber::EnvFilter;

use meshgen_server::cli::Cli;
use meshgen_server::config::ServerConfig;
use meshgen_server::generation::GenerationPipeline;
use meshgen_server::http::{run_server, AppState};
use meshgen_server::models::ModelHandle;
use meshgen_server::store::ArtifactStore;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_logging(cli.log_filter());

    let mut config = ServerConfig::from_env();
    cli.apply_to(&mut config);
    if let Some(problem) = config.validate() {
        bail!("invalid configuration: {}", problem);
    }

    let store = Arc::new(
        ArtifactStore::open(&config.assets_dir).context("cannot open assets directory")?,
    );

    // Built before any runtime exists: the remote backend uses a blocking
    // HTTP client, which must not be created or dropped on an async thread.
    let model = Arc::new(ModelHandle::from_config(&config).context("cannot load model backend")?);
    info!(
        backend = model.name(),
        device = model.device(),
        policy = config.export_policy.as_str(),
        "model ready"
    );

    let pipeline = GenerationPipeline::from_config(&config, store, Arc::clone(&model));

    match cli.request() {
        Some(request) => run_generate_mode(&pipeline, &request),
        None => run_serve_mode(&config, pipeline),
    }
}

fn init_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Runs the pipeline once and prints the asset id on stdout.
fn run_generate_mode(
    pipeline: &GenerationPipeline,
    request: &meshgen_server::types::GenerationRequest,
) -> anyhow::Result<()> {
    let asset = pipeline.generate(request).context("generation failed")?;

    eprintln!("Asset directory: {}", asset.dir.display());
    for file in &asset.report.files {
        eprintln!("  {}", file);
    }
    if let meshgen_server::export::StepOutcome::Failed(reason) = &asset.report.web_viewer {
        eprintln!("Web viewer file skipped: {}", reason);
    }
    println!("{}", asset.id);
    Ok(())
}

/// Runs the HTTP server until Ctrl-C.
fn run_serve_mode(config: &ServerConfig, pipeline: GenerationPipeline) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("cannot start async runtime")?;

    // The last pipeline reference is dropped after the runtime, so the
    // blocking HTTP client inside a remote model never drops on a worker.
    let pipeline = Arc::new(pipeline);
    let state = AppState {
        pipeline: Arc::clone(&pipeline),
    };
    let served = runtime.block_on(run_server(&config.bind, state));
    drop(runtime);
    drop(pipeline);

    served.with_context(|| format!("HTTP server on {} failed", config.bind))
}
