// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scan-Lite Geometry
//!
//! Spatial queries against a building mesh: a lazily built BVH answering
//! closest-point and ray queries, triangle math, and the rigid transforms
//! produced by registration.

pub mod aabb;
pub mod bvh;
pub mod spatial_index;
pub mod transform;
pub mod triangle;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, UnitQuaternion, Vector3};

pub use aabb::Aabb;
pub use bvh::{Bvh, BvhStats};
pub use spatial_index::{build_index, ClosestPoint, RayHit, SpatialIndex};
pub use transform::RigidTransform;
pub use triangle::Triangle;
