// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building-model mesh with per-triangle element identifiers

use nalgebra::Point3;

use crate::error::{Error, Result};

/// Triangle mesh as produced by the IFC geometry pipeline
///
/// Every triangle may carry the expressID of the building element it was
/// generated from. `element_ids` is either empty (untagged mesh) or holds
/// exactly one id per triangle.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
    /// Per-triangle element id (expressID)
    pub element_ids: Vec<u32>,
}

impl TriangleMesh {
    /// Create a new empty mesh
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mesh with capacity
    pub fn with_capacity(vertex_count: usize, triangle_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(triangle_count * 3),
            element_ids: Vec::with_capacity(triangle_count),
        }
    }

    /// Build a mesh from flat GPU buffers and validate it
    ///
    /// An empty `indices` buffer means the positions are a triangle soup
    /// (three consecutive vertices per triangle).
    pub fn from_flat(positions: Vec<f32>, indices: Vec<u32>, element_ids: Vec<u32>) -> Result<Self> {
        if positions.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "position buffer length {} is not a multiple of 3",
                positions.len()
            )));
        }
        let indices = if indices.is_empty() {
            let vertex_count = (positions.len() / 3) as u32;
            if vertex_count % 3 != 0 {
                return Err(Error::InvalidMesh(format!(
                    "triangle soup needs a multiple of 3 vertices, got {}",
                    vertex_count
                )));
            }
            (0..vertex_count).collect()
        } else {
            indices
        };
        let mesh = Self {
            positions,
            indices,
            element_ids,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Add a vertex and return its index
    #[inline]
    pub fn add_vertex(&mut self, position: Point3<f64>) -> u32 {
        let index = self.vertex_count() as u32;
        self.positions.push(position.x as f32);
        self.positions.push(position.y as f32);
        self.positions.push(position.z as f32);
        index
    }

    /// Add an untagged triangle
    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Add a triangle that belongs to a building element
    #[inline]
    pub fn add_element_triangle(&mut self, i0: u32, i1: u32, i2: u32, element_id: u32) {
        self.add_triangle(i0, i1, i2);
        self.element_ids.push(element_id);
    }

    /// Merge one element's geometry into this mesh, tagging all its triangles
    ///
    /// `positions` / `indices` are the element-local buffers as emitted per
    /// IFC product.
    pub fn merge_element(&mut self, element_id: u32, positions: &[f32], indices: &[u32]) {
        if positions.is_empty() || indices.is_empty() {
            return;
        }
        let vertex_offset = self.vertex_count() as u32;

        self.positions.reserve(positions.len());
        self.indices.reserve(indices.len());
        self.element_ids.reserve(indices.len() / 3);

        self.positions.extend_from_slice(positions);
        self.indices
            .extend(indices.iter().map(|&i| i + vertex_offset));
        self.element_ids
            .extend(std::iter::repeat(element_id).take(indices.len() / 3));
    }

    /// Get vertex count
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Get triangle count
    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Check if mesh has no triangles
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Whether triangles carry element ids
    #[inline]
    pub fn has_element_ids(&self) -> bool {
        !self.element_ids.is_empty()
    }

    /// Vertex position in f64
    #[inline]
    pub fn vertex(&self, index: u32) -> Point3<f64> {
        let i = index as usize * 3;
        Point3::new(
            self.positions[i] as f64,
            self.positions[i + 1] as f64,
            self.positions[i + 2] as f64,
        )
    }

    /// Corner positions of a triangle
    #[inline]
    pub fn triangle(&self, triangle_index: usize) -> [Point3<f64>; 3] {
        let i = triangle_index * 3;
        [
            self.vertex(self.indices[i]),
            self.vertex(self.indices[i + 1]),
            self.vertex(self.indices[i + 2]),
        ]
    }

    /// Corner positions of a triangle, `None` if any index is out of range
    pub fn get_triangle(&self, triangle_index: usize) -> Option<[Point3<f64>; 3]> {
        let corners = self.indices.get(triangle_index * 3..triangle_index * 3 + 3)?;
        let vertex_count = self.vertex_count();
        if corners.iter().any(|&v| v as usize >= vertex_count) {
            return None;
        }
        Some([
            self.vertex(corners[0]),
            self.vertex(corners[1]),
            self.vertex(corners[2]),
        ])
    }

    /// Element id of a triangle, if the mesh is tagged
    #[inline]
    pub fn element_id(&self, triangle_index: usize) -> Option<u32> {
        self.element_ids.get(triangle_index).copied()
    }

    /// Check buffer consistency
    pub fn validate(&self) -> Result<()> {
        if self.indices.len() % 3 != 0 {
            return Err(Error::InvalidMesh(format!(
                "index buffer length {} is not a multiple of 3",
                self.indices.len()
            )));
        }
        let vertex_count = self.vertex_count() as u32;
        if let Some(&bad) = self.indices.iter().find(|&&i| i >= vertex_count) {
            return Err(Error::InvalidMesh(format!(
                "index {} out of range for {} vertices",
                bad, vertex_count
            )));
        }
        if self.has_element_ids() && self.element_ids.len() != self.triangle_count() {
            return Err(Error::InvalidMesh(format!(
                "{} element ids for {} triangles",
                self.element_ids.len(),
                self.triangle_count()
            )));
        }
        Ok(())
    }

    /// Calculate bounds (min, max)
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        if self.positions.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            min.x = min.x.min(chunk[0]);
            min.y = min.y.min(chunk[1]);
            min.z = min.z.min(chunk[2]);
            max.x = max.x.max(chunk[0]);
            max.y = max.y.max(chunk[1]);
            max.z = max.z.max(chunk[2]);
        });

        (min, max)
    }

    /// Move every vertex by a rigid offset, e.g. to bring the model into the
    /// frame of a centered point cloud
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        for chunk in self.positions.chunks_exact_mut(3) {
            chunk[0] = (chunk[0] as f64 + dx) as f32;
            chunk[1] = (chunk[1] as f64 + dy) as f32;
            chunk[2] = (chunk[2] as f64 + dz) as f32;
        }
    }
}
