// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bounding volume hierarchy over mesh triangles
//!
//! Median split along the longest axis of the centroid bounds, leaves of at
//! most [`MAX_LEAF_SIZE`] triangles. Closest-point queries walk the tree
//! best-first (min-heap keyed by AABB distance) and stop as soon as the
//! nearest unvisited box is farther than the best hit.

use crate::aabb::Aabb;
use crate::triangle::Triangle;
use nalgebra::{Point3, Vector3};
use scan_lite_core::TriangleMesh;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Maximum triangles per leaf
pub const MAX_LEAF_SIZE: usize = 8;

/// BVH node
#[derive(Debug, Clone)]
pub enum BvhNode {
    Leaf {
        bounds: Aabb,
        triangles: SmallVec<[u32; MAX_LEAF_SIZE]>,
    },
    Internal {
        bounds: Aabb,
        left: Box<BvhNode>,
        right: Box<BvhNode>,
    },
}

impl BvhNode {
    #[inline]
    pub fn bounds(&self) -> &Aabb {
        match self {
            Self::Leaf { bounds, .. } | Self::Internal { bounds, .. } => bounds,
        }
    }
}

/// Nearest surface hit found by a BVH query
#[derive(Debug, Clone, Copy)]
pub struct NearestTriangle {
    pub triangle_index: usize,
    pub point: Point3<f64>,
    pub distance_squared: f64,
}

/// Heap entry ordered so that `BinaryHeap` pops the smallest distance first
struct QueueEntry<'a> {
    distance_squared: f64,
    node: &'a BvhNode,
}

impl PartialEq for QueueEntry<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.distance_squared.total_cmp(&other.distance_squared) == Ordering::Equal
    }
}

impl Eq for QueueEntry<'_> {}

impl PartialOrd for QueueEntry<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        other.distance_squared.total_cmp(&self.distance_squared)
    }
}

/// Bounding volume hierarchy
#[derive(Debug, Clone)]
pub struct Bvh {
    root: Option<BvhNode>,
    /// Triangles in mesh order, converted to f64 once
    triangles: Vec<Triangle>,
}

impl Bvh {
    /// Build from a mesh. An empty mesh gives a BVH with no root.
    pub fn build(mesh: &TriangleMesh) -> Self {
        // Triangles with out-of-range indices keep their slot but stay out of the tree
        let corners: Vec<Option<[Point3<f64>; 3]>> =
            (0..mesh.triangle_count()).map(|i| mesh.get_triangle(i)).collect();
        let indices: Vec<u32> = corners
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.map(|_| i as u32))
            .collect();
        let triangles: Vec<Triangle> = corners
            .into_iter()
            .map(|c| c.map_or_else(|| Triangle::from_corners([Point3::origin(); 3]), Triangle::from_corners))
            .collect();

        if indices.is_empty() {
            return Self {
                root: None,
                triangles,
            };
        }

        let boxes: Vec<Aabb> = triangles
            .iter()
            .map(|t| Aabb::from_triangle(&t.v0, &t.v1, &t.v2))
            .collect();
        let root = Self::build_recursive(&boxes, indices);

        Self {
            root: Some(root),
            triangles,
        }
    }

    fn build_recursive(boxes: &[Aabb], mut indices: Vec<u32>) -> BvhNode {
        let mut bounds = Aabb::empty();
        let mut centroid_bounds = Aabb::empty();
        for &i in &indices {
            let b = &boxes[i as usize];
            bounds.expand(b);
            let c = b.center();
            centroid_bounds.expand(&Aabb { min: c, max: c });
        }

        if indices.len() <= MAX_LEAF_SIZE {
            return BvhNode::Leaf {
                bounds,
                triangles: indices.into_iter().collect(),
            };
        }

        let axis = centroid_bounds.longest_axis();
        indices.sort_by(|&a, &b| {
            let ca = boxes[a as usize].center()[axis];
            let cb = boxes[b as usize].center()[axis];
            ca.total_cmp(&cb)
        });

        let right_indices = indices.split_off(indices.len() / 2);
        let left = Self::build_recursive(boxes, indices);
        let right = Self::build_recursive(boxes, right_indices);

        BvhNode::Internal {
            bounds,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Bounds of the whole hierarchy
    pub fn bounds(&self) -> Option<&Aabb> {
        self.root.as_ref().map(BvhNode::bounds)
    }

    /// Triangle by mesh index
    #[inline]
    pub fn triangle(&self, index: usize) -> &Triangle {
        &self.triangles[index]
    }

    /// Nearest point on any triangle surface
    pub fn closest_point(&self, query: &Point3<f64>) -> Option<NearestTriangle> {
        let root = self.root.as_ref()?;

        let mut best: Option<NearestTriangle> = None;
        let mut best_d = f64::INFINITY;

        let mut queue = BinaryHeap::new();
        queue.push(QueueEntry {
            distance_squared: root.bounds().distance_squared(query),
            node: root,
        });

        while let Some(entry) = queue.pop() {
            if entry.distance_squared > best_d {
                break;
            }
            match entry.node {
                BvhNode::Leaf { triangles, .. } => {
                    for &tri_idx in triangles {
                        let idx = tri_idx as usize;
                        let point = self.triangles[idx].closest_point(query);
                        let d = (point - query).norm_squared();
                        // Ties keep the lower triangle index
                        let better = match best {
                            Some(b) => d < best_d || (d == best_d && idx < b.triangle_index),
                            None => true,
                        };
                        if better {
                            best_d = d;
                            best = Some(NearestTriangle {
                                triangle_index: idx,
                                point,
                                distance_squared: d,
                            });
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    for child in [left.as_ref(), right.as_ref()] {
                        let d = child.bounds().distance_squared(query);
                        if d <= best_d {
                            queue.push(QueueEntry {
                                distance_squared: d,
                                node: child,
                            });
                        }
                    }
                }
            }
        }

        best
    }

    /// First triangle hit by the ray. `direction` must be non-zero; the
    /// returned distance is in units of its length.
    pub fn raycast(
        &self,
        origin: &Point3<f64>,
        direction: &Vector3<f64>,
    ) -> Option<(usize, f64)> {
        let root = self.root.as_ref()?;
        let inv_direction = Vector3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);

        let mut best: Option<(usize, f64)> = None;
        let mut best_t = f64::INFINITY;
        let mut stack: Vec<&BvhNode> = vec![root];

        while let Some(node) = stack.pop() {
            if node.bounds().ray_entry(origin, &inv_direction, best_t).is_none() {
                continue;
            }
            match node {
                BvhNode::Leaf { triangles, .. } => {
                    for &tri_idx in triangles {
                        let idx = tri_idx as usize;
                        if let Some(t) = self.triangles[idx].intersect_ray(origin, direction) {
                            if t < best_t {
                                best_t = t;
                                best = Some((idx, t));
                            }
                        }
                    }
                }
                BvhNode::Internal { left, right, .. } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }

        best
    }

    /// Depth and leaf statistics, used by tests and debug logging
    pub fn stats(&self) -> BvhStats {
        let mut stats = BvhStats::default();
        if let Some(root) = &self.root {
            collect_stats(root, 0, &mut stats);
        }
        stats
    }
}

fn collect_stats(node: &BvhNode, depth: usize, stats: &mut BvhStats) {
    stats.max_depth = stats.max_depth.max(depth);
    match node {
        BvhNode::Leaf { triangles, .. } => {
            stats.leaf_count += 1;
            stats.max_leaf_size = stats.max_leaf_size.max(triangles.len());
            stats.triangles_in_leaves += triangles.len();
        }
        BvhNode::Internal { left, right, .. } => {
            stats.internal_count += 1;
            collect_stats(left, depth + 1, stats);
            collect_stats(right, depth + 1, stats);
        }
    }
}

/// BVH shape statistics
#[derive(Debug, Default, Clone, Copy)]
pub struct BvhStats {
    pub internal_count: usize,
    pub leaf_count: usize,
    pub max_depth: usize,
    pub max_leaf_size: usize,
    pub triangles_in_leaves: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Grid of `n x n` quads (2n² triangles) on z = 0 spanning [0, n]²
    fn floor_grid(n: u32) -> TriangleMesh {
        let mut mesh = TriangleMesh::new();
        for y in 0..=n {
            for x in 0..=n {
                mesh.add_vertex(Point3::new(x as f64, y as f64, 0.0));
            }
        }
        let row = n + 1;
        for y in 0..n {
            for x in 0..n {
                let i = y * row + x;
                mesh.add_triangle(i, i + 1, i + row + 1);
                mesh.add_triangle(i, i + row + 1, i + row);
            }
        }
        mesh
    }

    #[test]
    fn test_empty_mesh() {
        let bvh = Bvh::build(&TriangleMesh::new());
        assert!(bvh.is_empty());
        assert!(bvh.closest_point(&Point3::origin()).is_none());
        assert!(bvh
            .raycast(&Point3::origin(), &Vector3::new(0.0, 0.0, 1.0))
            .is_none());
    }

    #[test]
    fn test_leaf_sizes() {
        let bvh = Bvh::build(&floor_grid(10));
        let stats = bvh.stats();
        assert_eq!(stats.triangles_in_leaves, 200);
        assert!(stats.max_leaf_size <= MAX_LEAF_SIZE);
        assert!(stats.internal_count > 0);
    }

    #[test]
    fn test_closest_point_on_grid() {
        let bvh = Bvh::build(&floor_grid(10));

        let hit = bvh.closest_point(&Point3::new(3.3, 7.6, 2.0)).unwrap();
        assert_relative_eq!(hit.point, Point3::new(3.3, 7.6, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hit.distance_squared, 4.0, epsilon = 1e-12);

        // Outside the grid: nearest is the corner
        let hit = bvh.closest_point(&Point3::new(-1.0, -1.0, 0.0)).unwrap();
        assert_relative_eq!(hit.point, Point3::origin(), epsilon = 1e-12);
    }

    #[test]
    fn test_raycast_grid() {
        let bvh = Bvh::build(&floor_grid(10));
        let (_, t) = bvh
            .raycast(&Point3::new(4.2, 5.1, 3.0), &Vector3::new(0.0, 0.0, -1.0))
            .unwrap();
        assert_relative_eq!(t, 3.0, epsilon = 1e-12);

        assert!(bvh
            .raycast(&Point3::new(4.2, 5.1, 3.0), &Vector3::new(0.0, 0.0, 1.0))
            .is_none());
    }
}
