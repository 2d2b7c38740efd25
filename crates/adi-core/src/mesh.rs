//! Procedural mesh generation for the attitude ball.
//!
//! The ball is a band of a UV sphere: columns walk a latitude band across the
//! face of the instrument, rows walk the full circle around the pitch axis.
//! All attributes and indices live in one allocation so the renderer can
//! upload the vertex region and the index region from a single buffer.

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Highest vertex count a u16 strip can address without emitting the
/// strip-restart value `0xFFFF`.
pub const MAX_VERTICES: u64 = u16::MAX as u64;

const POSITION_FLOATS: usize = 3;
const NORMAL_FLOATS: usize = 3;
const TEX_COORD_FLOATS: usize = 2;
const FLOATS_PER_VERTEX: usize = POSITION_FLOATS + NORMAL_FLOATS + TEX_COORD_FLOATS;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BallOptions {
    /// Ball radius in display inches
    pub radius: f32,
    /// Subdivisions across the latitude band
    pub columns: u32,
    /// Subdivisions around the pitch axis
    pub rows: u32,
    /// Latitude where the band starts (degrees)
    pub band_start_deg: f32,
    /// Angular width of the band (degrees)
    pub band_span_deg: f32,
}

impl Default for BallOptions {
    fn default() -> Self {
        Self {
            radius: 1.75,
            columns: 12,
            rows: 48,
            band_start_deg: -45.0,
            band_span_deg: 90.0,
        }
    }
}

impl BallOptions {
    pub fn vertex_count(&self) -> u64 {
        (self.columns as u64 + 1) * (self.rows as u64 + 1)
    }

    /// Strip length including the degenerate bridges between columns.
    pub fn index_count(&self) -> u64 {
        let row_verts = self.rows as u64 + 1;
        ((row_verts * 2) + 2) * self.columns as u64 - 1
    }
}

/// Vertex and index data for the ball, packed into one buffer:
/// positions, then normals, then texture coordinates, then u16 indices.
#[derive(Clone, Debug)]
pub struct InstrumentMesh {
    // u32 words keep every region 4-byte aligned for the f32 casts
    words: Vec<u32>,
    num_verts: u32,
    num_indexes: u32,
}

/// Generate the ball with the default latitude band.
pub fn generate(radius: f32, columns: u32, rows: u32) -> InstrumentMesh {
    InstrumentMesh::from_options(&BallOptions {
        radius,
        columns,
        rows,
        ..BallOptions::default()
    })
}

impl InstrumentMesh {
    /// Build the mesh.
    ///
    /// # Panics
    ///
    /// Panics when `columns == 0`, `rows < 3`, or the grid needs more
    /// vertices than a u16 index can address. These are programming errors;
    /// user supplied options go through `AdiConfig::validate` first.
    pub fn from_options(opts: &BallOptions) -> Self {
        assert!(opts.columns >= 1, "ball mesh needs at least one column");
        assert!(opts.rows >= 3, "ball mesh needs at least three rows");
        assert!(
            opts.vertex_count() <= MAX_VERTICES,
            "ball mesh of {} vertices exceeds u16 indexing",
            opts.vertex_count()
        );

        let columns = opts.columns;
        let rows = opts.rows;
        let col_verts = columns + 1;
        let row_verts = rows + 1;
        let num_verts = col_verts * row_verts;
        let num_indexes = opts.index_count() as u32;

        let n = num_verts as usize;
        let vertex_words = n * FLOATS_PER_VERTEX;
        let index_words = (num_indexes as usize).div_ceil(2);
        let mut words = vec![0u32; vertex_words + index_words];

        let (vertex_region, index_region) = words.split_at_mut(vertex_words);
        let floats: &mut [f32] = bytemuck::cast_slice_mut(vertex_region);
        let (positions, rest) = floats.split_at_mut(n * POSITION_FLOATS);
        let (normals, tex_coords) = rest.split_at_mut(n * NORMAL_FLOATS);
        let positions: &mut [[f32; 3]] = bytemuck::cast_slice_mut(positions);
        let normals: &mut [[f32; 3]] = bytemuck::cast_slice_mut(normals);
        let tex_coords: &mut [[f32; 2]] = bytemuck::cast_slice_mut(tex_coords);

        let band_start = opts.band_start_deg.to_radians();
        let rads_per_column = opts.band_span_deg.to_radians() / columns as f32;
        let rads_per_row = std::f32::consts::TAU / rows as f32;

        let mut v = 0usize;
        for c in 0..col_verts {
            let col_rad = band_start + c as f32 * rads_per_column;
            let (col_x, col_unit_radius) = col_rad.sin_cos();

            for r in 0..row_verts {
                // The closing row reuses angle 0 so the seam matches bit for bit.
                let row_rad = if r == rows { 0.0 } else { r as f32 * rads_per_row };
                let (row_y, row_z) = row_rad.sin_cos();

                let normal =
                    Vec3::new(col_x, row_y * col_unit_radius, row_z * col_unit_radius).normalize();

                normals[v] = normal.to_array();
                positions[v] = (normal * opts.radius).to_array();
                tex_coords[v] = [r as f32 / rows as f32, c as f32 / columns as f32];
                v += 1;
            }
        }
        debug_assert_eq!(v, n);

        let indexes: &mut [u16] = bytemuck::cast_slice_mut(index_region);
        let mut i = 0usize;
        for c in 0..columns {
            let base = c * row_verts;

            // Bridge from the previous column's trailing duplicate.
            if c > 0 {
                indexes[i] = base as u16;
                i += 1;
            }

            for r in 0..row_verts {
                indexes[i] = (base + r) as u16;
                indexes[i + 1] = (base + r + row_verts) as u16;
                i += 2;
            }

            indexes[i] = indexes[i - 1];
            i += 1;
        }
        debug_assert_eq!(i, num_indexes as usize);

        Self {
            words,
            num_verts,
            num_indexes,
        }
    }

    pub fn num_verts(&self) -> u32 {
        self.num_verts
    }

    pub fn num_indexes(&self) -> u32 {
        self.num_indexes
    }

    /// Byte offset of the position region.
    pub fn positions_offset(&self) -> u64 {
        0
    }

    /// Byte offset of the normal region.
    pub fn normals_offset(&self) -> u64 {
        self.region_offset(POSITION_FLOATS)
    }

    /// Byte offset of the texture coordinate region.
    pub fn tex_coords_offset(&self) -> u64 {
        self.region_offset(POSITION_FLOATS + NORMAL_FLOATS)
    }

    /// Byte offset of the index region.
    pub fn indexes_offset(&self) -> u64 {
        self.region_offset(FLOATS_PER_VERTEX)
    }

    fn region_offset(&self, floats_before: usize) -> u64 {
        (self.num_verts as usize * floats_before * std::mem::size_of::<f32>()) as u64
    }

    /// The whole allocation, index region padded to a 4-byte boundary.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.words)
    }

    /// Positions, normals and texture coordinates.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.as_bytes()[..self.indexes_offset() as usize]
    }

    /// Exactly `num_indexes` u16 values.
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(self.indexes())
    }

    fn floats(&self) -> &[f32] {
        let vertex_words = self.num_verts as usize * FLOATS_PER_VERTEX;
        bytemuck::cast_slice(&self.words[..vertex_words])
    }

    pub fn positions(&self) -> &[[f32; 3]] {
        let n = self.num_verts as usize;
        bytemuck::cast_slice(&self.floats()[..n * POSITION_FLOATS])
    }

    pub fn normals(&self) -> &[[f32; 3]] {
        let n = self.num_verts as usize;
        let start = n * POSITION_FLOATS;
        bytemuck::cast_slice(&self.floats()[start..start + n * NORMAL_FLOATS])
    }

    pub fn tex_coords(&self) -> &[[f32; 2]] {
        let n = self.num_verts as usize;
        let start = n * (POSITION_FLOATS + NORMAL_FLOATS);
        bytemuck::cast_slice(&self.floats()[start..start + n * TEX_COORD_FLOATS])
    }

    pub fn indexes(&self) -> &[u16] {
        let vertex_words = self.num_verts as usize * FLOATS_PER_VERTEX;
        let all: &[u16] = bytemuck::cast_slice(&self.words[vertex_words..]);
        &all[..self.num_indexes as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle_area(mesh: &InstrumentMesh, tri: [u16; 3]) -> f32 {
        let p = mesh.positions();
        let a = Vec3::from_array(p[tri[0] as usize]);
        let b = Vec3::from_array(p[tri[1] as usize]);
        let c = Vec3::from_array(p[tri[2] as usize]);
        (b - a).cross(c - a).length() * 0.5
    }

    #[test]
    fn test_default_ball_counts() {
        let mesh = InstrumentMesh::from_options(&BallOptions::default());
        assert_eq!(mesh.num_verts(), 13 * 49);
        assert_eq!(mesh.num_indexes(), 100 * 12 - 1);
    }

    #[test]
    fn test_seam_closes_exactly() {
        for rows in [3, 4, 7, 48, 100] {
            let mesh = generate(1.75, 5, rows);
            let row_verts = (rows + 1) as usize;
            for c in 0..6 {
                let first = c * row_verts;
                let last = first + rows as usize;
                assert_eq!(mesh.positions()[first], mesh.positions()[last], "rows={rows} col={c}");
                assert_eq!(mesh.normals()[first], mesh.normals()[last], "rows={rows} col={c}");
            }
        }
    }

    #[test]
    fn test_index_count_and_bounds() {
        for (columns, rows) in [(1, 3), (2, 5), (12, 48), (30, 64)] {
            let mesh = generate(1.0, columns, rows);
            let expected = ((rows + 2) * 2) * columns - 1;
            assert_eq!(mesh.num_indexes(), expected);
            assert_eq!(mesh.indexes().len(), expected as usize);
            assert!(mesh.indexes().iter().all(|&i| (i as u32) < mesh.num_verts()));
        }
    }

    #[test]
    fn test_normals_are_radial_unit_vectors() {
        let radius = 2.5;
        let mesh = generate(radius, 12, 48);
        for (n, p) in mesh.normals().iter().zip(mesh.positions()) {
            let n = Vec3::from_array(*n);
            let p = Vec3::from_array(*p);
            assert!((n.length() - 1.0).abs() < 1e-5);
            assert!((p - n * radius).length() < 1e-5);
        }
    }

    #[test]
    fn test_band_is_restricted() {
        let mesh = generate(1.0, 12, 48);
        let limit = 45.0_f32.to_radians().sin() + 1e-5;
        assert!(mesh.normals().iter().all(|n| n[0].abs() <= limit));
    }

    #[test]
    fn test_tex_coords_span_unit_square() {
        let mesh = generate(1.0, 4, 8);
        let tex = mesh.tex_coords();
        assert_eq!(tex[0], [0.0, 0.0]);
        assert_eq!(tex[8], [1.0, 0.0]);
        assert_eq!(*tex.last().unwrap(), [1.0, 1.0]);
    }

    #[test]
    fn test_columns_bridged_by_degenerates() {
        let columns = 4;
        let rows = 6;
        let mesh = generate(1.0, columns, rows);
        let idx = mesh.indexes();

        let mut real = 0;
        for w in idx.windows(3) {
            let tri = [w[0], w[1], w[2]];
            let repeated = tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2];
            if repeated {
                assert_eq!(triangle_area(&mesh, tri), 0.0);
            } else {
                assert!(triangle_area(&mesh, tri) > 0.0);
                real += 1;
            }
        }
        // two triangles per quad, nothing else carries area
        assert_eq!(real, (columns * rows * 2) as usize);
    }

    #[test]
    fn test_byte_layout() {
        let mesh = generate(1.0, 2, 4);
        let n = mesh.num_verts() as u64;
        assert_eq!(mesh.normals_offset(), n * 12);
        assert_eq!(mesh.tex_coords_offset(), n * 24);
        assert_eq!(mesh.indexes_offset(), n * 32);
        assert_eq!(mesh.vertex_bytes().len() as u64, n * 32);
        assert_eq!(mesh.index_bytes().len(), mesh.num_indexes() as usize * 2);
        assert!(mesh.as_bytes().len() % 4 == 0);
    }

    #[test]
    #[should_panic(expected = "three rows")]
    fn test_too_few_rows_panics() {
        generate(1.0, 4, 2);
    }

    #[test]
    #[should_panic(expected = "one column")]
    fn test_zero_columns_panics() {
        generate(1.0, 0, 8);
    }
}
