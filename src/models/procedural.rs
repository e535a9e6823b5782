//! Deterministic procedural mesh backend.
//!
//! Produces a closed, coloured blob whose shape is derived from a hash of
//! the prompt and parameters. Needs no external service, so it backs the
//! CLI, offline deployments and tests.

use std::f32::consts::{PI, TAU};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::{GenerationParams, TriMesh};

use super::backend::MeshModel;

/// Built-in generator that runs on the CPU.
#[derive(Debug, Default, Clone)]
pub struct ProceduralModel;

impl ProceduralModel {
    /// Creates the generator.
    pub fn new() -> Self {
        Self
    }
}

impl MeshModel for ProceduralModel {
    fn name(&self) -> &str {
        "procedural"
    }

    fn device(&self) -> &str {
        "cpu"
    }

    fn generate(&mut self, params: &GenerationParams) -> Result<TriMesh> {
        Ok(build_blob(params))
    }
}

/// Computes the generation seed for a parameter set.
///
/// The seed is the first 8 bytes of SHA256 over
/// `{prompt}:{guidance_scale}:{steps}:{frame_size}`.
pub fn compute_seed(params: &GenerationParams) -> u64 {
    let input = format!(
        "{}:{}:{}:{}",
        params.prompt, params.guidance_scale, params.steps, params.frame_size
    );
    let digest = Sha256::digest(input.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Latitude rings for a frame size; longitude segments are twice this.
pub fn ring_count(frame_size: u32) -> u32 {
    (frame_size / 8).clamp(8, 64)
}

struct Harmonic {
    direction: [f32; 3],
    weight: f32,
    phase: f32,
}

fn build_blob(params: &GenerationParams) -> TriMesh {
    let mut rng = ChaCha8Rng::seed_from_u64(compute_seed(params));

    let rings = ring_count(params.frame_size);
    let segments = rings * 2;

    // More steps, more detail; higher guidance, stronger features.
    let harmonic_count = (params.steps / 16).clamp(1, 8);
    let amplitude = 0.05 + 0.25 * ((params.guidance_scale as f32 - 1.0) / 49.0);
    let harmonics: Vec<Harmonic> = (0..harmonic_count)
        .map(|_| Harmonic {
            direction: [
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
                rng.gen_range(-3.0..3.0),
            ],
            weight: rng.gen_range(0.3..1.0),
            phase: rng.gen_range(0.0..TAU),
        })
        .collect();
    let stretch = rng.gen_range(0.7f32..1.3);
    let base_color = [
        rng.gen_range(0.2f32..1.0),
        rng.gen_range(0.2f32..1.0),
        rng.gen_range(0.2f32..1.0),
    ];

    let total_weight: f32 = harmonics.iter().map(|h| h.weight).sum();
    let radius = |dir: [f32; 3]| {
        let bump: f32 = harmonics
            .iter()
            .map(|h| {
                let d = h.direction;
                h.weight * (d[0] * dir[0] + d[1] * dir[1] + d[2] * dir[2] + h.phase).sin()
            })
            .sum();
        1.0 + amplitude * bump / total_weight
    };

    let mut positions = Vec::with_capacity((2 + (rings - 1) * segments) as usize);
    let mut push_vertex = |dir: [f32; 3]| {
        let r = radius(dir);
        positions.push([dir[0] * r, dir[1] * r * stretch, dir[2] * r]);
    };

    push_vertex([0.0, 1.0, 0.0]);
    for ring in 1..rings {
        let theta = PI * ring as f32 / rings as f32;
        for seg in 0..segments {
            let phi = TAU * seg as f32 / segments as f32;
            push_vertex([theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()]);
        }
    }
    push_vertex([0.0, -1.0, 0.0]);

    let top = 0u32;
    let bottom = positions.len() as u32 - 1;
    let row = |ring: u32, seg: u32| 1 + (ring - 1) * segments + seg % segments;

    let mut faces = Vec::with_capacity((2 * segments * (rings - 1)) as usize);
    for seg in 0..segments {
        faces.push([top, row(1, seg + 1), row(1, seg)]);
    }
    for ring in 1..rings - 1 {
        for seg in 0..segments {
            let a = row(ring, seg);
            let b = row(ring, seg + 1);
            let c = row(ring + 1, seg);
            let d = row(ring + 1, seg + 1);
            faces.push([a, b, c]);
            faces.push([b, d, c]);
        }
    }
    for seg in 0..segments {
        faces.push([row(rings - 1, seg), row(rings - 1, seg + 1), bottom]);
    }

    let (min, max) = {
        let ys = positions.iter().map(|p| p[1]);
        let min = ys.clone().fold(f32::MAX, f32::min);
        let max = ys.fold(f32::MIN, f32::max);
        (min, max)
    };
    let span = (max - min).max(f32::EPSILON);
    let colors = positions
        .iter()
        .map(|p| {
            let shade = 0.6 + 0.4 * (p[1] - min) / span;
            base_color.map(|c| (c * shade).clamp(0.0, 1.0))
        })
        .collect();

    TriMesh::new(positions, faces).with_colors(colors)
}
