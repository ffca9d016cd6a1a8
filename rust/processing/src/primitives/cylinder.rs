// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RANSAC cylinder search from oriented samples
//!
//! Two surface points with normals fix a cylinder: the axis runs along
//! `n0 × n1`, both normal lines cross the axis, and the radius is the
//! distance of either sample from it.

use super::plane::canonical;
use nalgebra::{Point3, Vector3};
use rand::Rng;
use scan_lite_core::CancelToken;

/// Normals closer to parallel than this (|n0 × n1|) give no axis
const MIN_AXIS_NORM: f64 = 1e-3;

/// Smallest radius considered a cylinder at all
const MIN_RADIUS: f64 = 1e-6;

/// Infinite cylinder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CylinderModel {
    pub axis_point: Point3<f64>,
    /// Unit axis direction
    pub direction: Vector3<f64>,
    pub radius: f64,
}

impl CylinderModel {
    /// Cylinder through two oriented samples
    ///
    /// Rejected when the normals are near parallel, the two samples
    /// disagree on the radius by more than `threshold`, or the radius is
    /// outside `[min_radius, max_radius]`.
    pub fn from_oriented_samples(
        p0: &Point3<f64>,
        n0: &Vector3<f64>,
        p1: &Point3<f64>,
        n1: &Vector3<f64>,
        threshold: f64,
        min_radius: f64,
        max_radius: f64,
    ) -> Option<Self> {
        let axis = n0.cross(n1);
        if axis.norm() < MIN_AXIS_NORM {
            return None;
        }
        let direction = canonical(axis.normalize());

        // Closest points between the normal lines p0 + t n0 and p1 + u n1
        let w = p0 - p1;
        let b = n0.dot(n1);
        let d = n0.dot(&w);
        let e = n1.dot(&w);
        let denom = 1.0 - b * b;
        if denom <= f64::EPSILON {
            return None;
        }
        let t = (b * e - d) / denom;
        let u = (e - b * d) / denom;
        let c0 = p0 + n0 * t;
        let c1 = p1 + n1 * u;
        let axis_point = Point3::from((c0.coords + c1.coords) * 0.5);

        let mut model = Self {
            axis_point,
            direction,
            radius: 0.0,
        };
        let r0 = model.axis_distance(p0);
        let r1 = model.axis_distance(p1);
        if (r0 - r1).abs() > threshold {
            return None;
        }
        model.radius = (r0 + r1) * 0.5;
        if !model.radius.is_finite()
            || model.radius < MIN_RADIUS
            || model.radius < min_radius
            || model.radius > max_radius
        {
            return None;
        }
        Some(model)
    }

    /// Distance from `p` to the axis line
    #[inline]
    pub fn axis_distance(&self, p: &Point3<f64>) -> f64 {
        let v = p - self.axis_point;
        (v - self.direction * v.dot(&self.direction)).norm()
    }

    /// Distance from `p` to the cylinder surface
    #[inline]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        (self.axis_distance(p) - self.radius).abs()
    }
}

/// Search parameters shared by all trials
#[derive(Debug, Clone, Copy)]
pub struct CylinderSearch {
    pub trials: usize,
    pub threshold: f64,
    pub min_radius: f64,
    pub max_radius: f64,
}

/// Best cylinder over random pairs drawn from `pool`
///
/// `normals` is indexed like `points`; pool points without a normal are
/// never drawn as samples but can still be inliers.
pub fn find_best_cylinder<R: Rng + ?Sized>(
    points: &[Point3<f64>],
    normals: &[Option<Vector3<f64>>],
    pool: &[usize],
    search: &CylinderSearch,
    rng: &mut R,
    cancel: &CancelToken,
) -> Option<(CylinderModel, Vec<usize>)> {
    let oriented: Vec<usize> = pool.iter().copied().filter(|&i| normals[i].is_some()).collect();
    if oriented.len() < 2 {
        return None;
    }

    let mut best: Option<(CylinderModel, usize)> = None;
    for _ in 0..search.trials {
        if cancel.is_cancelled() {
            break;
        }
        let sample = rand::seq::index::sample(rng, oriented.len(), 2);
        let i0 = oriented[sample.index(0)];
        let i1 = oriented[sample.index(1)];
        let (n0, n1) = match (normals[i0], normals[i1]) {
            (Some(n0), Some(n1)) => (n0, n1),
            _ => continue,
        };

        let model = match CylinderModel::from_oriented_samples(
            &points[i0],
            &n0,
            &points[i1],
            &n1,
            search.threshold,
            search.min_radius,
            search.max_radius,
        ) {
            Some(model) => model,
            None => continue,
        };

        let count = pool
            .iter()
            .filter(|&&i| model.distance(&points[i]) <= search.threshold)
            .count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((model, count));
        }
    }

    let (model, _) = best?;
    let inliers = pool
        .iter()
        .copied()
        .filter(|&i| model.distance(&points[i]) <= search.threshold)
        .collect();
    Some((model, inliers))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_oriented_samples() {
        // Vertical cylinder of radius 2 around (1, 1)
        let p0 = Point3::new(3.0, 1.0, 0.0);
        let n0 = Vector3::new(1.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, -1.0, 5.0);
        let n1 = Vector3::new(0.0, -1.0, 0.0);

        let model = CylinderModel::from_oriented_samples(&p0, &n0, &p1, &n1, 0.01, 0.1, 5.0).unwrap();
        assert_relative_eq!(model.radius, 2.0, epsilon = 1e-12);
        assert_relative_eq!(model.direction, Vector3::new(0.0, 0.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(model.axis_point.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.axis_point.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(model.distance(&Point3::new(1.0, 3.0, -7.0)), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejections() {
        let p0 = Point3::new(3.0, 1.0, 0.0);
        let n0 = Vector3::new(1.0, 0.0, 0.0);
        let p1 = Point3::new(1.0, -1.0, 5.0);
        let n1 = Vector3::new(0.0, -1.0, 0.0);

        // Parallel normals
        assert!(CylinderModel::from_oriented_samples(&p0, &n0, &p1, &n0, 0.01, 0.1, 5.0).is_none());
        // Radius out of range
        assert!(CylinderModel::from_oriented_samples(&p0, &n0, &p1, &n1, 0.01, 0.1, 1.5).is_none());
        assert!(CylinderModel::from_oriented_samples(&p0, &n0, &p1, &n1, 0.01, 2.5, 5.0).is_none());
        // Samples disagree on the radius
        let far = Point3::new(1.0, -2.0, 5.0);
        assert!(CylinderModel::from_oriented_samples(&p0, &n0, &far, &n1, 0.01, 0.1, 5.0).is_none());
    }
}
