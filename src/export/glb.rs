//! glTF 2.0 binary (GLB) conversion for web viewers.
//!
//! The converter reloads the PLY that was already written and re-encodes
//! it, so the GLB always matches the canonical intermediate file.

use std::fs;
use std::path::Path;

use serde_json::json;

use crate::error::{ErrorCode, Result, ServerError};
use crate::types::TriMesh;

use super::ply::{file_label, read_ply};

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_VERSION: u32 = 2;
const CHUNK_JSON: u32 = 0x4E4F_534A;
const CHUNK_BIN: u32 = 0x004E_4942;

const COMPONENT_FLOAT: u32 = 5126;
const COMPONENT_UNSIGNED_INT: u32 = 5125;
const TARGET_ARRAY_BUFFER: u32 = 34962;
const TARGET_ELEMENT_ARRAY_BUFFER: u32 = 34963;
const MODE_POINTS: u32 = 0;
const MODE_TRIANGLES: u32 = 4;

/// A format-conversion step from one mesh file to another.
pub trait MeshConverter: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Converts the file at `source` into `target`.
    fn convert(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Converts a PLY file into GLB.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlbConverter;

impl MeshConverter for GlbConverter {
    fn name(&self) -> &str {
        "ply-to-glb"
    }

    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let mesh = read_ply(source)?;
        write_glb(&mesh, target)
    }
}

/// Writes `mesh` to `path` as GLB.
pub fn write_glb(mesh: &TriMesh, path: &Path) -> Result<()> {
    let bytes = encode_glb(mesh)?;
    fs::write(path, bytes).map_err(|e| {
        ServerError::with_source(
            ErrorCode::ExportFailed,
            format!("Failed to write {}", file_label(path)),
            e,
        )
    })
}

/// Encodes `mesh` as a GLB byte buffer.
///
/// Emits POSITION, NORMAL (when the mesh has faces), COLOR_0 (when the mesh
/// has colours) and u32 indices. A mesh without faces becomes a point cloud.
pub fn encode_glb(mesh: &TriMesh) -> Result<Vec<u8>> {
    mesh.validate()
        .map_err(|e| ServerError::export_failed(format!("cannot encode GLB: {}", e)))?;

    let vertex_count = mesh.vertex_count();
    let has_faces = mesh.face_count() > 0;

    let mut bin: Vec<u8> = Vec::new();
    let mut views = Vec::new();
    let mut accessors = Vec::new();
    let mut attributes = serde_json::Map::new();

    let (min, max) = mesh.bounds();
    let view = push_view(&mut bin, &mut views, &mesh.positions, TARGET_ARRAY_BUFFER);
    attributes.insert("POSITION".into(), json!(accessors.len()));
    accessors.push(json!({
        "bufferView": view,
        "componentType": COMPONENT_FLOAT,
        "count": vertex_count,
        "type": "VEC3",
        "min": min,
        "max": max,
    }));

    if has_faces {
        let normals = mesh.vertex_normals();
        let view = push_view(&mut bin, &mut views, &normals, TARGET_ARRAY_BUFFER);
        attributes.insert("NORMAL".into(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
        }));
    }

    if let Some(colors) = &mesh.colors {
        let clamped: Vec<[f32; 3]> = colors.iter().map(|c| c.map(|v| v.clamp(0.0, 1.0))).collect();
        let view = push_view(&mut bin, &mut views, &clamped, TARGET_ARRAY_BUFFER);
        attributes.insert("COLOR_0".into(), json!(accessors.len()));
        accessors.push(json!({
            "bufferView": view,
            "componentType": COMPONENT_FLOAT,
            "count": vertex_count,
            "type": "VEC3",
        }));
    }

    let mode = if has_faces { MODE_TRIANGLES } else { MODE_POINTS };
    let mut primitive = json!({
        "attributes": attributes,
        "mode": mode,
    });

    if has_faces {
        let start = bin.len();
        for face in &mesh.faces {
            for i in face {
                bin.extend_from_slice(&i.to_le_bytes());
            }
        }
        views.push(json!({
            "buffer": 0,
            "byteOffset": start,
            "byteLength": bin.len() - start,
            "target": TARGET_ELEMENT_ARRAY_BUFFER,
        }));
        primitive["indices"] = json!(accessors.len());
        accessors.push(json!({
            "bufferView": views.len() - 1,
            "componentType": COMPONENT_UNSIGNED_INT,
            "count": mesh.face_count() * 3,
            "type": "SCALAR",
        }));
    }

    let document = json!({
        "asset": { "version": "2.0", "generator": "meshgen-server" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }],
        "meshes": [{ "primitives": [primitive] }],
        "accessors": accessors,
        "bufferViews": views,
        "buffers": [{ "byteLength": bin.len() }],
    });

    let mut json_chunk = serde_json::to_vec(&document)
        .map_err(|e| ServerError::export_failed(format!("cannot serialize GLB JSON: {}", e)))?;
    pad_to_four(&mut json_chunk, b' ');
    pad_to_four(&mut bin, 0);

    let total_len = 12 + 8 + json_chunk.len() + 8 + bin.len();
    let total_len = u32::try_from(total_len)
        .map_err(|_| ServerError::export_failed("mesh too large for GLB"))?;

    let mut out = Vec::with_capacity(total_len as usize);
    out.extend_from_slice(GLB_MAGIC);
    out.extend_from_slice(&GLB_VERSION.to_le_bytes());
    out.extend_from_slice(&total_len.to_le_bytes());

    out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_JSON.to_le_bytes());
    out.extend_from_slice(&json_chunk);

    out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
    out.extend_from_slice(&CHUNK_BIN.to_le_bytes());
    out.extend_from_slice(&bin);

    Ok(out)
}

/// Appends a VEC3 float array and its buffer view; returns the view index.
fn push_view(
    bin: &mut Vec<u8>,
    views: &mut Vec<serde_json::Value>,
    data: &[[f32; 3]],
    target: u32,
) -> usize {
    let start = bin.len();
    for v in data {
        for c in v {
            bin.extend_from_slice(&c.to_le_bytes());
        }
    }
    views.push(json!({
        "buffer": 0,
        "byteOffset": start,
        "byteLength": bin.len() - start,
        "target": target,
    }));
    views.len() - 1
}

fn pad_to_four(buf: &mut Vec<u8>, fill: u8) {
    let padded = (buf.len() + 3) & !3;
    buf.resize(padded, fill);
}
