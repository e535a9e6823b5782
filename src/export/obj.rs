//! Wavefront OBJ writer and MTL companion.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{ErrorCode, Result, ServerError};
use crate::types::TriMesh;

use super::ply::file_label;

/// Material library written when the exporter produced none.
pub const PLACEHOLDER_MTL: &str = "# Minimal MTL generated\nnewmtl default\nKd 0.8 0.8 0.8\n";

/// Name of the material every face uses.
pub const DEFAULT_MATERIAL: &str = "default";

/// Writes `mesh` as OBJ, referencing `material_lib` by file name.
///
/// Vertex colours, when present, follow the position on each `v` line.
pub fn write_obj(mesh: &TriMesh, path: &Path, material_lib: &str) -> Result<()> {
    let name = file_label(path);
    let file = fs::File::create(path).map_err(|e| {
        ServerError::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to create {}", name),
            e,
        )
    })?;
    let mut out = BufWriter::new(file);
    encode_obj(mesh, material_lib, &mut out)
        .and_then(|_| out.flush())
        .map_err(|e| {
            ServerError::with_source(
                ErrorCode::ExportFailed,
                format!("Failed to write {}", name),
                e,
            )
        })
}

fn encode_obj<W: Write>(mesh: &TriMesh, material_lib: &str, out: &mut W) -> std::io::Result<()> {
    writeln!(out, "# meshgen-server")?;
    writeln!(out, "mtllib {}", material_lib)?;
    writeln!(out, "usemtl {}", DEFAULT_MATERIAL)?;

    match &mesh.colors {
        Some(colors) => {
            for (p, c) in mesh.positions.iter().zip(colors) {
                writeln!(
                    out,
                    "v {} {} {} {} {} {}",
                    p[0], p[1], p[2], c[0], c[1], c[2]
                )?;
            }
        }
        None => {
            for p in &mesh.positions {
                writeln!(out, "v {} {} {}", p[0], p[1], p[2])?;
            }
        }
    }

    for f in &mesh.faces {
        writeln!(out, "f {} {} {}", f[0] + 1, f[1] + 1, f[2] + 1)?;
    }

    Ok(())
}

/// Makes sure the material library at `path` exists.
///
/// Returns true when a placeholder had to be synthesized.
pub fn ensure_material_library(path: &Path) -> Result<bool> {
    if path.is_file() {
        return Ok(false);
    }
    fs::write(path, PLACEHOLDER_MTL).map_err(|e| {
        ServerError::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to write {}", file_label(path)),
            e,
        )
    })?;
    Ok(true)
}
