//! Mesh exporter driving the per-format writers.
//!
//! Steps run in a fixed order. The PLY and OBJ/MTL steps are mandatory and
//! abort the export with an error. The GLB step is optional: its failure is
//! reported in the [`ExportReport`] and the caller decides what to do.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Result;
use crate::types::TriMesh;

use super::glb::{GlbConverter, MeshConverter};
use super::obj::{ensure_material_library, write_obj};
use super::ply::write_ply;

/// Point-cloud/mesh intermediate file.
pub const PLY_FILE: &str = "mesh.ply";

/// Wavefront geometry file.
pub const OBJ_FILE: &str = "mesh.obj";

/// Wavefront material library referenced by [`OBJ_FILE`].
pub const MTL_FILE: &str = "mesh.mtl";

/// Web-viewer binary file.
pub const GLB_FILE: &str = "mesh.glb";

/// Outcome of an export step that is allowed to fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The file was written.
    Written,
    /// The step failed; the reason is safe to show to clients.
    Failed(String),
}

impl StepOutcome {
    /// Returns true if the step succeeded.
    pub fn is_written(&self) -> bool {
        matches!(self, StepOutcome::Written)
    }
}

/// What an export produced.
#[derive(Debug, Clone)]
pub struct ExportReport {
    /// File names written into the target directory, in order.
    pub files: Vec<String>,
    /// True when the MTL file is the generated placeholder.
    pub material_synthesized: bool,
    /// Result of the optional web-viewer conversion.
    pub web_viewer: StepOutcome,
}

impl ExportReport {
    /// Returns true if every step, optional ones included, succeeded.
    pub fn is_complete(&self) -> bool {
        self.web_viewer.is_written()
    }
}

/// Writes a mesh as the fixed set of sibling files.
pub struct MeshExporter {
    converter: Box<dyn MeshConverter>,
}

impl MeshExporter {
    /// Creates an exporter using the PLY-to-GLB converter.
    pub fn new() -> Self {
        Self::with_converter(Box::new(GlbConverter))
    }

    /// Creates an exporter with a custom web-viewer converter.
    pub fn with_converter(converter: Box<dyn MeshConverter>) -> Self {
        Self { converter }
    }

    /// Exports `mesh` into `dir`.
    ///
    /// Returns an error only when a mandatory step fails.
    pub fn export(&self, mesh: &TriMesh, dir: &Path) -> Result<ExportReport> {
        let mut files = Vec::with_capacity(4);

        let ply_path = dir.join(PLY_FILE);
        write_ply(mesh, &ply_path)?;
        files.push(PLY_FILE.to_string());

        write_obj(mesh, &dir.join(OBJ_FILE), MTL_FILE)?;
        files.push(OBJ_FILE.to_string());

        let material_synthesized = ensure_material_library(&dir.join(MTL_FILE))?;
        files.push(MTL_FILE.to_string());

        let web_viewer = match self.converter.convert(&ply_path, &dir.join(GLB_FILE)) {
            Ok(()) => {
                files.push(GLB_FILE.to_string());
                StepOutcome::Written
            }
            Err(e) => {
                warn!(converter = self.converter.name(), error = %e, "web viewer export failed");
                // A converter may leave a truncated file behind.
                let _ = fs::remove_file(dir.join(GLB_FILE));
                StepOutcome::Failed(e.message)
            }
        };

        info!(
            vertices = mesh.vertex_count(),
            faces = mesh.face_count(),
            files = files.len(),
            "exported mesh"
        );

        Ok(ExportReport {
            files,
            material_synthesized,
            web_viewer,
        })
    }
}

impl Default for MeshExporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use tempfile::tempdir;

    struct FailingConverter;

    impl MeshConverter for FailingConverter {
        fn name(&self) -> &str {
            "failing"
        }

        fn convert(&self, _source: &Path, _target: &Path) -> Result<()> {
            Err(ServerError::export_failed("unsupported primitive"))
        }
    }

    /// Writes a few bytes of the target, then gives up.
    struct TruncatingConverter;

    impl MeshConverter for TruncatingConverter {
        fn name(&self) -> &str {
            "truncating"
        }

        fn convert(&self, _source: &Path, target: &Path) -> Result<()> {
            fs::write(target, b"glTF\x02\x00").unwrap();
            Err(ServerError::export_failed("disk full"))
        }
    }

    fn cube() -> TriMesh {
        let p = |x: f32, y: f32, z: f32| [x, y, z];
        TriMesh::new(
            vec![
                p(0.0, 0.0, 0.0),
                p(1.0, 0.0, 0.0),
                p(1.0, 1.0, 0.0),
                p(0.0, 1.0, 0.0),
                p(0.0, 0.0, 1.0),
                p(1.0, 0.0, 1.0),
                p(1.0, 1.0, 1.0),
                p(0.0, 1.0, 1.0),
            ],
            vec![
                [0, 2, 1],
                [0, 3, 2],
                [4, 5, 6],
                [4, 6, 7],
                [0, 1, 5],
                [0, 5, 4],
                [3, 7, 6],
                [3, 6, 2],
                [0, 4, 7],
                [0, 7, 3],
                [1, 2, 6],
                [1, 6, 5],
            ],
        )
    }

    #[test]
    fn writes_all_four_files() {
        let dir = tempdir().unwrap();
        let report = MeshExporter::new().export(&cube(), dir.path()).unwrap();

        assert_eq!(report.files, vec![PLY_FILE, OBJ_FILE, MTL_FILE, GLB_FILE]);
        assert!(report.is_complete());
        assert!(report.material_synthesized);
        for name in &report.files {
            let len = fs::metadata(dir.path().join(name)).unwrap().len();
            assert!(len > 0, "{} is empty", name);
        }
    }

    #[test]
    fn material_library_declares_a_material() {
        let dir = tempdir().unwrap();
        MeshExporter::new().export(&cube(), dir.path()).unwrap();

        let obj = fs::read_to_string(dir.path().join(OBJ_FILE)).unwrap();
        let mtl = fs::read_to_string(dir.path().join(MTL_FILE)).unwrap();
        assert!(obj.contains("mtllib mesh.mtl"));
        assert!(mtl.lines().any(|l| l.starts_with("newmtl ")));
    }

    #[test]
    fn optional_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let exporter = MeshExporter::with_converter(Box::new(FailingConverter));
        let report = exporter.export(&cube(), dir.path()).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.files, vec![PLY_FILE, OBJ_FILE, MTL_FILE]);
        match report.web_viewer {
            StepOutcome::Failed(reason) => assert!(reason.contains("unsupported primitive")),
            StepOutcome::Written => panic!("expected failure"),
        }
        assert!(!dir.path().join(GLB_FILE).exists());
    }

    #[test]
    fn partial_web_viewer_file_is_removed() {
        let dir = tempdir().unwrap();
        let exporter = MeshExporter::with_converter(Box::new(TruncatingConverter));
        let report = exporter.export(&cube(), dir.path()).unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.files, vec![PLY_FILE, OBJ_FILE, MTL_FILE]);
        assert!(!dir.path().join(GLB_FILE).exists());
    }

    #[test]
    fn mandatory_failure_is_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("not-there");
        assert!(MeshExporter::new().export(&cube(), &missing).is_err());
    }
}
