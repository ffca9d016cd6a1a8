// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed-form rigid fit between paired point sets (Kabsch / SVD)

use nalgebra::{Matrix3, Point3, Vector3};
use scan_lite_core::{Error, Result};
use scan_lite_geometry::RigidTransform;

/// Minimum number of pairs for a well-posed fit
pub const MIN_CORRESPONDENCES: usize = 3;

/// Spread (sum of squared distances to the centroid) below which the
/// source set is treated as a single point
const MIN_SPREAD: f64 = 1e-12;

/// Mean of a point set (origin for an empty set)
pub fn centroid(points: &[Point3<f64>]) -> Vector3<f64> {
    if points.is_empty() {
        return Vector3::zeros();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    sum / points.len() as f64
}

/// Least-squares rigid transform mapping `source[i]` onto `target[i]`
///
/// `R = V Uᵀ` from the SVD of the cross-covariance `H = Σ sᵢ tᵢᵀ`. When
/// `det(R) < 0` the last column of `V` is negated so the result is never a
/// reflection.
///
/// Returns [`Error::DegenerateGeometry`] for fewer than three pairs, a
/// source set collapsed to one point, or a failed decomposition.
pub fn fit_rigid(source: &[Point3<f64>], target: &[Point3<f64>]) -> Result<RigidTransform> {
    if source.len() != target.len() {
        return Err(Error::invalid_input(format!(
            "paired point sets differ in length: {} vs {}",
            source.len(),
            target.len()
        )));
    }
    if source.len() < MIN_CORRESPONDENCES {
        return Err(Error::degenerate(format!(
            "{} correspondences, need at least {}",
            source.len(),
            MIN_CORRESPONDENCES
        )));
    }

    let source_centroid = centroid(source);
    let target_centroid = centroid(target);

    let mut h = Matrix3::zeros();
    let mut spread = 0.0;
    for (s, t) in source.iter().zip(target) {
        let sc = s.coords - source_centroid;
        let tc = t.coords - target_centroid;
        h += sc * tc.transpose();
        spread += sc.norm_squared();
    }
    if spread < MIN_SPREAD {
        return Err(Error::degenerate("source points coincide"));
    }

    let svd = h.svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| Error::degenerate("SVD did not produce U"))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| Error::degenerate("SVD did not produce Vᵀ"))?;

    let mut v = v_t.transpose();
    let mut rotation = v * u.transpose();
    if rotation.determinant() < 0.0 {
        for i in 0..3 {
            v[(i, 2)] = -v[(i, 2)];
        }
        rotation = v * u.transpose();
    }

    if !rotation.iter().all(|x| x.is_finite()) {
        return Err(Error::degenerate("non-finite rotation"));
    }

    let transform = RigidTransform::from_rotation_matrix(&rotation, Vector3::zeros());
    let translation = target_centroid - transform.rotation * source_centroid;
    Ok(RigidTransform::new(transform.rotation, translation))
}

/// Mean Euclidean distance between paired points
pub fn mean_residual(source: &[Point3<f64>], target: &[Point3<f64>]) -> f64 {
    if source.is_empty() {
        return 0.0;
    }
    let sum: f64 = source
        .iter()
        .zip(target)
        .map(|(s, t)| (s - t).norm())
        .sum();
    sum / source.len() as f64
}
