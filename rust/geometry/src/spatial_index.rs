// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial index over a building mesh
//!
//! The index owns its [`TriangleMesh`]. The BVH and the per-element area
//! table are built on first use and cached in `OnceLock`s, so a shared
//! `&SpatialIndex` can be queried from many threads. Any mutation of the
//! mesh goes through `&mut self` and drops both caches.

use crate::aabb::Aabb;
use crate::bvh::{Bvh, BvhStats};
use crate::triangle::Triangle;
use nalgebra::{Point3, Vector3};
use rustc_hash::FxHashMap;
use scan_lite_core::{Error, Result, TriangleMesh};
use std::sync::OnceLock;

/// Nearest point on the mesh surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestPoint {
    pub point: Point3<f64>,
    pub distance: f64,
    pub triangle_index: usize,
    /// Owning element, if the mesh carries element ids
    pub element_id: Option<u32>,
}

/// First surface hit along a ray
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point3<f64>,
    pub distance: f64,
    pub triangle_index: usize,
    pub element_id: Option<u32>,
}

/// Lazily built BVH over an owned triangle mesh
#[derive(Debug, Default)]
pub struct SpatialIndex {
    mesh: TriangleMesh,
    bvh: OnceLock<Bvh>,
    element_areas: OnceLock<FxHashMap<u32, f64>>,
}

/// Wrap a mesh in a spatial index. The BVH is built on the first query.
///
/// The mesh is not validated: triangles with out-of-range indices are left
/// out of every query. Use [`SpatialIndex::try_new`] to reject such meshes.
pub fn build_index(mesh: TriangleMesh) -> SpatialIndex {
    SpatialIndex::new(mesh)
}

impl SpatialIndex {
    pub fn new(mesh: TriangleMesh) -> Self {
        Self {
            mesh,
            bvh: OnceLock::new(),
            element_areas: OnceLock::new(),
        }
    }

    /// Like [`SpatialIndex::new`], rejecting meshes with out-of-range
    /// indices or a mismatched element id buffer
    pub fn try_new(mesh: TriangleMesh) -> Result<Self> {
        mesh.validate()?;
        Ok(Self::new(mesh))
    }

    /// Build the BVH now instead of on the first query
    pub fn prepare(&self) -> &Self {
        self.bvh();
        self
    }

    fn bvh(&self) -> &Bvh {
        self.bvh.get_or_init(|| Bvh::build(&self.mesh))
    }

    /// Whether the BVH has been built
    pub fn is_built(&self) -> bool {
        self.bvh.get().is_some()
    }

    pub fn mesh(&self) -> &TriangleMesh {
        &self.mesh
    }

    /// Mutable access to the mesh. Drops the cached BVH and area table.
    pub fn mesh_mut(&mut self) -> &mut TriangleMesh {
        self.invalidate();
        &mut self.mesh
    }

    /// Give the mesh back, discarding the index
    pub fn into_mesh(self) -> TriangleMesh {
        self.mesh
    }

    /// Replace vertex positions (same vertex count). Drops the caches.
    pub fn set_positions(&mut self, positions: Vec<f32>) -> Result<()> {
        if positions.len() != self.mesh.positions.len() {
            return Err(Error::InvalidMesh(format!(
                "expected {} position values, got {}",
                self.mesh.positions.len(),
                positions.len()
            )));
        }
        self.invalidate();
        self.mesh.positions = positions;
        Ok(())
    }

    /// Translate every vertex. Drops the caches.
    pub fn translate(&mut self, dx: f64, dy: f64, dz: f64) {
        self.invalidate();
        self.mesh.translate(dx, dy, dz);
    }

    fn invalidate(&mut self) {
        self.bvh.take();
        self.element_areas.take();
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// Index with no triangles; every query returns `None`
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.mesh.is_empty()
    }

    /// Bounds of all triangles, `None` for an empty index
    pub fn bounds(&self) -> Option<Aabb> {
        self.bvh().bounds().copied()
    }

    pub fn stats(&self) -> BvhStats {
        self.bvh().stats()
    }

    /// Nearest point on the mesh surface (not the nearest vertex)
    pub fn closest_point(&self, query: &Point3<f64>) -> Option<ClosestPoint> {
        if self.mesh.is_empty() {
            return None;
        }
        let nearest = self.bvh().closest_point(query)?;
        Some(ClosestPoint {
            point: nearest.point,
            distance: nearest.distance_squared.sqrt(),
            triangle_index: nearest.triangle_index,
            element_id: self.mesh.element_id(nearest.triangle_index),
        })
    }

    /// First triangle hit by the ray from `origin` along `direction`
    ///
    /// The distance is in model units regardless of the length of
    /// `direction`. A zero direction never hits.
    pub fn raycast(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<RayHit> {
        if self.mesh.is_empty() {
            return None;
        }
        let dir = direction.try_normalize(1e-12)?;
        let (triangle_index, t) = self.bvh().raycast(origin, &dir)?;
        Some(RayHit {
            point: origin + dir * t,
            distance: t,
            triangle_index,
            element_id: self.mesh.element_id(triangle_index),
        })
    }

    /// Surface area per element id, summed over its triangles
    ///
    /// Computed once and cached. Triangles without an id are not counted.
    pub fn element_areas(&self) -> &FxHashMap<u32, f64> {
        self.element_areas.get_or_init(|| {
            let mut areas: FxHashMap<u32, f64> = FxHashMap::default();
            for i in 0..self.mesh.triangle_count() {
                if let (Some(id), Some(corners)) = (self.mesh.element_id(i), self.mesh.get_triangle(i)) {
                    *areas.entry(id).or_insert(0.0) += Triangle::from_corners(corners).area();
                }
            }
            areas
        })
    }

    /// Area of one element (0.0 if it has no triangles)
    pub fn element_area(&self, element_id: u32) -> f64 {
        self.element_areas()
            .get(&element_id)
            .copied()
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn two_elements() -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        // Element 7: unit square at z = 0
        mesh.merge_element(
            7,
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            &[0, 1, 2, 0, 2, 3],
        );
        // Element 9: 2x1 rectangle at z = 3
        mesh.merge_element(
            9,
            &[0.0, 0.0, 3.0, 2.0, 0.0, 3.0, 2.0, 1.0, 3.0, 0.0, 1.0, 3.0],
            &[0, 1, 2, 0, 2, 3],
        );
        mesh
    }

    #[test]
    fn test_lazy_build() {
        let index = build_index(two_elements());
        assert!(!index.is_built());
        let hit = index.closest_point(&Point3::new(0.5, 0.5, 1.0)).unwrap();
        assert!(index.is_built());
        assert_relative_eq!(hit.distance, 1.0, epsilon = 1e-6);
        assert_eq!(hit.element_id, Some(7));

        let hit = index.closest_point(&Point3::new(0.5, 0.5, 2.5)).unwrap();
        assert_eq!(hit.element_id, Some(9));
    }

    #[test]
    fn test_out_of_range_triangles_are_skipped() {
        let mut mesh = two_elements();
        // Element 11 points past the vertex buffer
        mesh.add_element_triangle(0, 1, 40, 11);
        assert!(SpatialIndex::try_new(mesh.clone()).is_err());

        let index = build_index(mesh);
        let hit = index.closest_point(&Point3::new(0.5, 0.5, 1.0)).unwrap();
        assert_eq!(hit.element_id, Some(7));
        let hit = index
            .raycast(&Point3::new(0.3, 0.6, 10.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_eq!(hit.element_id, Some(9));
        assert_relative_eq!(index.element_area(7), 1.0, epsilon = 1e-9);
        assert_eq!(index.element_area(11), 0.0);
    }

    #[test]
    fn test_empty_index() {
        let index = SpatialIndex::new(TriangleMesh::new());
        assert!(index.is_empty());
        assert!(index.closest_point(&Point3::origin()).is_none());
        assert!(index
            .raycast(&Point3::origin(), &Vector3::new(1.0, 0.0, 0.0))
            .is_none());
        assert!(index.bounds().is_none());
        assert!(index.element_areas().is_empty());
    }

    #[test]
    fn test_mutation_drops_cache() {
        let mut index = build_index(two_elements());
        index.prepare();
        assert!(index.is_built());
        assert_relative_eq!(index.element_area(7), 1.0, epsilon = 1e-6);

        index.translate(0.0, 0.0, 10.0);
        assert!(!index.is_built());
        let hit = index.closest_point(&Point3::new(0.5, 0.5, 0.0)).unwrap();
        assert_relative_eq!(hit.distance, 10.0, epsilon = 1e-4);

        let mut positions = index.mesh().positions.clone();
        for z in positions.iter_mut().skip(2).step_by(3) {
            *z = 0.0;
        }
        index.set_positions(positions).unwrap();
        assert!(!index.is_built());
        let hit = index.closest_point(&Point3::new(1.5, 0.5, 0.0)).unwrap();
        assert_relative_eq!(hit.distance, 0.0, epsilon = 1e-6);

        assert!(index.set_positions(vec![0.0; 3]).is_err());
    }

    #[test]
    fn test_element_areas() {
        let index = build_index(two_elements());
        let areas = index.element_areas();
        assert_eq!(areas.len(), 2);
        assert_relative_eq!(areas[&7], 1.0, epsilon = 1e-6);
        assert_relative_eq!(areas[&9], 2.0, epsilon = 1e-6);
        assert_eq!(index.element_area(42), 0.0);
    }

    #[test]
    fn test_raycast_hits_nearest_element() {
        let index = build_index(two_elements());
        let hit = index
            .raycast(&Point3::new(0.5, 0.5, 5.0), &Vector3::new(0.0, 0.0, -4.0))
            .unwrap();
        assert_eq!(hit.element_id, Some(9));
        assert_relative_eq!(hit.distance, 2.0, epsilon = 1e-6);
        assert_relative_eq!(hit.point, Point3::new(0.5, 0.5, 3.0), epsilon = 1e-6);

        assert!(index
            .raycast(&Point3::new(0.5, 0.5, 5.0), &Vector3::zeros())
            .is_none());
    }

    #[test]
    fn test_index_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SpatialIndex>();
    }
}
