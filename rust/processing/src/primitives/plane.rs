// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RANSAC plane search over a pool of point indices

use nalgebra::{Point3, Vector3};
use rand::Rng;
use scan_lite_core::CancelToken;

/// Samples whose cross product is this small relative to the edge lengths
/// are treated as collinear
const COLLINEAR_EPSILON: f64 = 1e-6;

/// Plane through `point` with unit `normal`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneModel {
    pub normal: Vector3<f64>,
    pub point: Point3<f64>,
}

impl PlaneModel {
    /// Plane through three points, `None` if they are (nearly) collinear
    pub fn from_points(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> Option<Self> {
        let ab = b - a;
        let ac = c - a;
        let cross = ab.cross(&ac);
        let scale = ab.norm() * ac.norm();
        if !scale.is_normal() || cross.norm() <= COLLINEAR_EPSILON * scale {
            return None;
        }
        Some(Self {
            normal: canonical(cross.normalize()),
            point: *a,
        })
    }

    #[inline]
    pub fn distance(&self, p: &Point3<f64>) -> f64 {
        (p - self.point).dot(&self.normal).abs()
    }
}

/// Flip so the largest-magnitude component is positive
pub(crate) fn canonical(v: Vector3<f64>) -> Vector3<f64> {
    let i = v.iamax();
    if v[i] < 0.0 {
        -v
    } else {
        v
    }
}

/// Best plane over `trials` random triples drawn from `pool`
///
/// Returns the model and its inliers (indices into `points`, in pool
/// order). `None` when the pool has fewer than three points or every
/// triple was collinear.
pub fn find_best_plane<R: Rng + ?Sized>(
    points: &[Point3<f64>],
    pool: &[usize],
    trials: usize,
    threshold: f64,
    rng: &mut R,
    cancel: &CancelToken,
) -> Option<(PlaneModel, Vec<usize>)> {
    if pool.len() < 3 {
        return None;
    }

    let mut best: Option<(PlaneModel, usize)> = None;
    for _ in 0..trials {
        if cancel.is_cancelled() {
            break;
        }
        let sample = rand::seq::index::sample(rng, pool.len(), 3);
        let model = match PlaneModel::from_points(
            &points[pool[sample.index(0)]],
            &points[pool[sample.index(1)]],
            &points[pool[sample.index(2)]],
        ) {
            Some(model) => model,
            None => continue,
        };

        let count = pool
            .iter()
            .filter(|&&i| model.distance(&points[i]) <= threshold)
            .count();
        if best.map_or(true, |(_, c)| count > c) {
            best = Some((model, count));
        }
    }

    let (model, _) = best?;
    let inliers = pool
        .iter()
        .copied()
        .filter(|&i| model.distance(&points[i]) <= threshold)
        .collect();
    Some((model, inliers))
}
