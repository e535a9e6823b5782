//! Generation pipeline.
//!
//! Validates a request, allocates an asset directory, runs the model and
//! exports the mesh. On failure after allocation the directory is removed,
//! so a failed request never leaves a half-populated asset behind and an
//! asset id is only handed out once every file is in place.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::{ExportPolicy, GenerationDefaults, ServerConfig};
use crate::error::{Result, ServerError};
use crate::export::{ExportReport, MeshExporter, StepOutcome};
use crate::models::ModelHandle;
use crate::store::ArtifactStore;
use crate::types::{GenerationParams, GenerationRequest};

/// A successfully created asset.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    /// Opaque asset identifier.
    pub id: String,
    /// Asset directory.
    pub dir: PathBuf,
    /// Parameters the model ran with, defaults applied.
    pub params: GenerationParams,
    /// Files written by the exporter.
    pub report: ExportReport,
}

/// Request-to-asset orchestration shared by the HTTP handlers and the CLI.
pub struct GenerationPipeline {
    store: Arc<ArtifactStore>,
    model: Arc<ModelHandle>,
    exporter: MeshExporter,
    defaults: GenerationDefaults,
    policy: ExportPolicy,
}

impl GenerationPipeline {
    pub fn new(
        store: Arc<ArtifactStore>,
        model: Arc<ModelHandle>,
        exporter: MeshExporter,
        defaults: GenerationDefaults,
        policy: ExportPolicy,
    ) -> Self {
        Self {
            store,
            model,
            exporter,
            defaults,
            policy,
        }
    }

    /// Builds a pipeline with the default exporter from `config`.
    pub fn from_config(
        config: &ServerConfig,
        store: Arc<ArtifactStore>,
        model: Arc<ModelHandle>,
    ) -> Self {
        Self::new(
            store,
            model,
            MeshExporter::new(),
            config.defaults,
            config.export_policy,
        )
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    /// Runs one generation end to end. Blocks for the model call.
    ///
    /// Validation errors are returned before anything touches the disk.
    pub fn generate(&self, request: &GenerationRequest) -> Result<GeneratedAsset> {
        let params = request.validate(&self.defaults)?;

        let id = ArtifactStore::new_asset_id();
        let dir = self.store.allocate(&id)?;
        let start = Instant::now();

        match self.run(&params, &dir) {
            Ok(report) => {
                info!(
                    asset_id = %id,
                    files = report.files.len(),
                    complete = report.is_complete(),
                    placeholder_material = report.material_synthesized,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "generated asset"
                );
                Ok(GeneratedAsset {
                    id,
                    dir,
                    params,
                    report,
                })
            }
            Err(e) => {
                error!(asset_id = %id, error = %e, "generation failed, removing asset");
                self.store.remove(&id);
                if self.store.contains(&id) {
                    warn!(asset_id = %id, "asset directory survived cleanup");
                }
                Err(e)
            }
        }
    }

    fn run(&self, params: &GenerationParams, dir: &std::path::Path) -> Result<ExportReport> {
        let mesh = self.model.invoke(params)?;
        let report = self.exporter.export(&mesh, dir)?;

        if report.is_complete() {
            return Ok(report);
        }

        let reason = match &report.web_viewer {
            StepOutcome::Failed(reason) => reason.as_str(),
            StepOutcome::Written => "web viewer file missing",
        };
        match self.policy {
            ExportPolicy::Strict => Err(ServerError::export_failed(reason)),
            ExportPolicy::Permissive => {
                warn!(reason = %reason, "keeping asset without web viewer file");
                Ok(report)
            }
        }
    }
}

impl std::fmt::Debug for GenerationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationPipeline")
            .field("root", &self.store.root())
            .field("model", &self.model)
            .field("policy", &self.policy)
            .finish()
    }
}
