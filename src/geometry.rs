//! CPU-side geometry with multiple UV sets and tangent generation.
//!
//! Shader-based rendering needs more vertex data than the fixed-function
//! path: every texture unit referenced by a permutation must have a UV set,
//! and normal mapping needs a per-vertex tangent frame. [`Geometry`] keeps
//! that data host-side so the shading visitor can backfill missing UV sets
//! and generate tangents before a mesh is uploaded.
//!
//! Tangents live in an explicit field rather than a spare UV channel, with
//! the handedness of the bitangent in `w`.

use glam::{Vec2, Vec3, Vec4};

/// Indexed triangle geometry with per-unit UV sets.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    /// Vertex positions.
    pub positions: Vec<Vec3>,
    /// Per-vertex normals, parallel to `positions`.
    pub normals: Vec<Vec3>,
    /// UV sets indexed by texture unit; `None` for units without
    /// coordinates.
    pub uv_sets: Vec<Option<Vec<Vec2>>>,
    /// Per-vertex tangents (`xyz` = tangent, `w` = bitangent handedness).
    pub tangents: Option<Vec<Vec4>>,
    /// Triangle indices.
    pub indices: Vec<u32>,
}

impl Geometry {
    /// Creates geometry from positions, normals, a base UV set and indices.
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        uvs: Vec<Vec2>,
        indices: Vec<u32>,
    ) -> Self {
        Self {
            positions,
            normals,
            uv_sets: vec![Some(uvs)],
            tangents: None,
            indices,
        }
    }

    /// A textured quad in the XY plane starting at `corner`.
    ///
    /// UVs run from (0,0) at the corner to `uv_scale` at the opposite side.
    /// Used for full-screen combine passes and debug display quads.
    pub fn textured_quad(corner: Vec3, width: f32, height: f32, uv_scale: Vec2) -> Self {
        let positions = vec![
            corner,
            corner + Vec3::new(width, 0.0, 0.0),
            corner + Vec3::new(width, height, 0.0),
            corner + Vec3::new(0.0, height, 0.0),
        ];
        let normals = vec![Vec3::Z; 4];
        let uvs = vec![
            Vec2::new(0.0, 0.0),
            Vec2::new(uv_scale.x, 0.0),
            Vec2::new(uv_scale.x, uv_scale.y),
            Vec2::new(0.0, uv_scale.y),
        ];
        Self::new(positions, normals, uvs, vec![0, 1, 2, 0, 2, 3])
    }

    /// Returns the UV set for `unit`, if present.
    pub fn uv_set(&self, unit: u32) -> Option<&[Vec2]> {
        self.uv_sets
            .get(unit as usize)
            .and_then(|set| set.as_deref())
    }

    /// Stores a UV set at `unit`, growing the set list as needed.
    pub fn set_uv_set(&mut self, unit: u32, uvs: Vec<Vec2>) {
        let index = unit as usize;
        if self.uv_sets.len() <= index {
            self.uv_sets.resize(index + 1, None);
        }
        self.uv_sets[index] = Some(uvs);
    }

    /// Copies UV set 0 into `unit` when `unit` has no coordinates.
    ///
    /// Returns `true` when the geometry changed. No-op when set 0 itself is
    /// missing or when `unit` is already populated.
    pub fn backfill_uv_set(&mut self, unit: u32) -> bool {
        if unit == 0 || self.uv_set(unit).is_some() {
            return false;
        }
        let Some(base) = self.uv_set(0).map(<[Vec2]>::to_vec) else {
            return false;
        };
        self.set_uv_set(unit, base);
        true
    }

    /// Generates per-vertex tangents from the UV set at `unit`.
    ///
    /// Accumulates the triangle tangent/bitangent directions, then
    /// orthonormalizes against the vertex normal. Returns `false` (leaving
    /// the geometry untouched) when the UV set is missing or does not cover
    /// every vertex.
    pub fn generate_tangents(&mut self, unit: u32) -> bool {
        let Some(uvs) = self.uv_set(unit) else {
            return false;
        };
        if uvs.len() < self.positions.len() || self.normals.len() < self.positions.len() {
            return false;
        }
        let uvs = uvs.to_vec();

        let mut tan = vec![Vec3::ZERO; self.positions.len()];
        let mut bitan = vec![Vec3::ZERO; self.positions.len()];

        for tri in self.indices.chunks_exact(3) {
            let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
            let edge1 = self.positions[i1] - self.positions[i0];
            let edge2 = self.positions[i2] - self.positions[i0];
            let duv1 = uvs[i1] - uvs[i0];
            let duv2 = uvs[i2] - uvs[i0];

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = (edge1 * duv2.y - edge2 * duv1.y) * r;
            let b = (edge2 * duv1.x - edge1 * duv2.x) * r;

            for &i in &[i0, i1, i2] {
                tan[i] += t;
                bitan[i] += b;
            }
        }

        let mut tangents = Vec::with_capacity(self.positions.len());
        for i in 0..self.positions.len() {
            let n = self.normals[i];
            let t = (tan[i] - n * n.dot(tan[i])).normalize_or_zero();
            let w = if n.cross(t).dot(bitan[i]) < 0.0 {
                -1.0
            } else {
                1.0
            };
            tangents.push(t.extend(w));
        }
        self.tangents = Some(tangents);
        true
    }
}
