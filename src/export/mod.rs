//! Mesh export module.
//!
//! Writes a generated mesh as a set of sibling files: PLY, OBJ with its
//! MTL companion, and GLB for web viewers.

pub mod exporter;
pub mod glb;
pub mod obj;
pub mod ply;

// Re-export commonly used items
pub use exporter::{
    ExportReport, MeshExporter, StepOutcome, GLB_FILE, MTL_FILE, OBJ_FILE, PLY_FILE,
};
pub use glb::{encode_glb, write_glb, GlbConverter, MeshConverter};
pub use obj::{ensure_material_library, write_obj, PLACEHOLDER_MTL};
pub use ply::{read_ply, write_ply};
