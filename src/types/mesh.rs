//! In-memory triangle mesh produced by the generative model.

use serde::{Deserialize, Serialize};

/// A triangle mesh with optional per-vertex colours.
///
/// Colours are linear RGB in `[0, 1]`. When present there is exactly one
/// colour per vertex.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TriMesh {
    /// Vertex positions.
    #[serde(rename = "vertices")]
    pub positions: Vec<[f32; 3]>,

    /// Triangles as zero-based vertex indices.
    pub faces: Vec<[u32; 3]>,

    /// Optional per-vertex colours.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<[f32; 3]>>,
}

impl TriMesh {
    /// Creates an uncoloured mesh.
    pub fn new(positions: Vec<[f32; 3]>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            positions,
            faces,
            colors: None,
        }
    }

    /// Attaches per-vertex colours.
    pub fn with_colors(mut self, colors: Vec<[f32; 3]>) -> Self {
        self.colors = Some(colors);
        self
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Number of triangles.
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Checks structural consistency.
    ///
    /// Returns an error message if validation fails.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.positions.is_empty() {
            return Err("mesh has no vertices".to_string());
        }

        if self
            .positions
            .iter()
            .any(|p| p.iter().any(|c| !c.is_finite()))
        {
            return Err("mesh has non-finite vertex coordinates".to_string());
        }

        let count = self.positions.len() as u32;
        if let Some(face) = self.faces.iter().find(|f| f.iter().any(|&i| i >= count)) {
            return Err(format!(
                "face {:?} references a vertex beyond {}",
                face, count
            ));
        }

        if let Some(colors) = &self.colors {
            if colors.len() != self.positions.len() {
                return Err(format!(
                    "mesh has {} colours for {} vertices",
                    colors.len(),
                    self.positions.len()
                ));
            }
        }

        Ok(())
    }

    /// Axis-aligned bounding box as `(min, max)`.
    pub fn bounds(&self) -> ([f32; 3], [f32; 3]) {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in &self.positions {
            for axis in 0..3 {
                min[axis] = min[axis].min(p[axis]);
                max[axis] = max[axis].max(p[axis]);
            }
        }
        if self.positions.is_empty() {
            return ([0.0; 3], [0.0; 3]);
        }
        (min, max)
    }

    /// Area-weighted vertex normals.
    ///
    /// Vertices not referenced by any face get `+Y`.
    pub fn vertex_normals(&self) -> Vec<[f32; 3]> {
        let mut normals = vec![[0.0f32; 3]; self.positions.len()];

        for face in &self.faces {
            let [a, b, c] = face.map(|i| self.positions[i as usize]);
            let e1 = sub(b, a);
            let e2 = sub(c, a);
            let n = cross(e1, e2);
            for &i in face {
                let acc = &mut normals[i as usize];
                acc[0] += n[0];
                acc[1] += n[1];
                acc[2] += n[2];
            }
        }

        normals
            .into_iter()
            .map(|n| {
                let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
                if len > f32::EPSILON {
                    [n[0] / len, n[1] / len, n[2] / len]
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect()
    }
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}
