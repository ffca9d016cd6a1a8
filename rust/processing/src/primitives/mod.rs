// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive detection: planes, then cylinders on what is left
//!
//! Up to [`MAX_PLANES`] planes are extracted first, each removing its
//! inliers from the working pool. Up to [`MAX_CYLINDERS`] cylinders are
//! then searched in the remaining pool with half the trial budget.
//!
//! Inlier indices refer to the slice passed to [`detect_all`]; they are
//! meaningless against any other point set. `confidence` is the inlier
//! share of the pool at the moment the shape was accepted, so it is not
//! comparable between primitives.

mod cylinder;
mod normals;
mod plane;

pub use cylinder::CylinderModel;
pub use normals::{estimate_normals, pca_normal};
pub use plane::PlaneModel;

use crate::config::parse_json;
use cylinder::{find_best_cylinder, CylinderSearch};
use nalgebra::{Point3, Vector3};
use plane::find_best_plane;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scan_lite_core::{CancelToken, Error, Result};
use serde::{Deserialize, Serialize};

/// Planes extracted per run
pub const MAX_PLANES: usize = 3;
/// Cylinders extracted per run
pub const MAX_CYLINDERS: usize = 2;

/// Detection parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DetectionParams {
    /// RANSAC trials per plane (cylinders use half)
    pub max_iterations: usize,
    /// Inlier distance in meters
    pub distance_threshold: f64,
    /// Smallest accepted inlier count
    pub min_inliers: usize,
    pub plane_enabled: bool,
    pub cylinder_enabled: bool,
    pub cylinder_min_radius: f64,
    pub cylinder_max_radius: f64,
    /// Neighbourhood size for normal estimation
    pub normal_neighbors: usize,
    /// Seed for sampling; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            distance_threshold: 0.1,
            min_inliers: 100,
            plane_enabled: true,
            cylinder_enabled: true,
            cylinder_min_radius: 0.1,
            cylinder_max_radius: 5.0,
            normal_neighbors: 12,
            seed: None,
        }
    }
}

impl DetectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = threshold;
        self
    }

    pub fn with_min_inliers(mut self, min_inliers: usize) -> Self {
        self.min_inliers = min_inliers;
        self
    }

    pub fn with_planes(mut self, enabled: bool) -> Self {
        self.plane_enabled = enabled;
        self
    }

    pub fn with_cylinders(mut self, enabled: bool) -> Self {
        self.cylinder_enabled = enabled;
        self
    }

    pub fn with_radius_range(mut self, min: f64, max: f64) -> Self {
        self.cylinder_min_radius = min;
        self.cylinder_max_radius = max;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Parse from camelCase JSON (missing fields take defaults) and validate
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Self = parse_json(json)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.distance_threshold.is_finite() && self.distance_threshold > 0.0) {
            return Err(Error::config(format!(
                "distanceThreshold must be a positive number, got {}",
                self.distance_threshold
            )));
        }
        if self.min_inliers < 3 {
            return Err(Error::config(format!(
                "minInliers must be at least 3, got {}",
                self.min_inliers
            )));
        }
        if !(self.cylinder_min_radius >= 0.0 && self.cylinder_min_radius <= self.cylinder_max_radius)
            || !self.cylinder_max_radius.is_finite()
        {
            return Err(Error::config(format!(
                "cylinder radius range [{}, {}] is invalid",
                self.cylinder_min_radius, self.cylinder_max_radius
            )));
        }
        if self.normal_neighbors < 3 {
            return Err(Error::config(format!(
                "normalNeighbors must be at least 3, got {}",
                self.normal_neighbors
            )));
        }
        Ok(())
    }
}

/// Detected geometric primitive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DetectedPrimitive {
    #[serde(rename_all = "camelCase")]
    Plane {
        normal: Vector3<f64>,
        point: Point3<f64>,
        inliers: Vec<usize>,
        confidence: f64,
    },
    #[serde(rename_all = "camelCase")]
    Cylinder {
        axis_point: Point3<f64>,
        direction: Vector3<f64>,
        radius: f64,
        inliers: Vec<usize>,
        confidence: f64,
    },
}

impl DetectedPrimitive {
    pub fn inliers(&self) -> &[usize] {
        match self {
            Self::Plane { inliers, .. } | Self::Cylinder { inliers, .. } => inliers,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::Plane { confidence, .. } | Self::Cylinder { confidence, .. } => *confidence,
        }
    }

    pub fn is_plane(&self) -> bool {
        matches!(self, Self::Plane { .. })
    }

    pub fn is_cylinder(&self) -> bool {
        matches!(self, Self::Cylinder { .. })
    }
}

/// Detect planes and cylinders, seeding from `params.seed`
pub fn detect_all(points: &[Point3<f64>], params: &DetectionParams) -> Vec<DetectedPrimitive> {
    let mut rng = match params.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    detect_all_with_rng(points, params, &mut rng)
}

/// Detect planes and cylinders with a caller-provided random source
pub fn detect_all_with_rng<R: Rng + ?Sized>(
    points: &[Point3<f64>],
    params: &DetectionParams,
    rng: &mut R,
) -> Vec<DetectedPrimitive> {
    detect_all_with_cancel(points, params, rng, &CancelToken::new())
}

/// Detect planes and cylinders, checking `cancel` once per trial
///
/// A cancelled run returns the primitives accepted so far.
pub fn detect_all_with_cancel<R: Rng + ?Sized>(
    points: &[Point3<f64>],
    params: &DetectionParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Vec<DetectedPrimitive> {
    let mut primitives = Vec::new();
    if points.is_empty() {
        return primitives;
    }

    let min_inliers = params.min_inliers.max(3);
    let mut pool: Vec<usize> = (0..points.len()).collect();

    if params.plane_enabled {
        while primitives.len() < MAX_PLANES && pool.len() >= min_inliers && !cancel.is_cancelled() {
            let (model, inliers) = match find_best_plane(
                points,
                &pool,
                params.max_iterations,
                params.distance_threshold,
                rng,
                cancel,
            ) {
                Some(found) if found.1.len() >= min_inliers => found,
                _ => break,
            };

            let confidence = inliers.len() as f64 / pool.len() as f64;
            tracing::debug!(
                inliers = inliers.len(),
                pool = pool.len(),
                confidence,
                "Accepted plane"
            );
            remove_inliers(&mut pool, &inliers);
            primitives.push(DetectedPrimitive::Plane {
                normal: model.normal,
                point: model.point,
                inliers,
                confidence,
            });
        }
    }

    let plane_count = primitives.len();

    if params.cylinder_enabled && pool.len() >= min_inliers && !cancel.is_cancelled() {
        let normals = estimate_normals(points, params.normal_neighbors);
        let search = CylinderSearch {
            trials: params.max_iterations / 2,
            threshold: params.distance_threshold,
            min_radius: params.cylinder_min_radius,
            max_radius: params.cylinder_max_radius,
        };

        while primitives.len() - plane_count < MAX_CYLINDERS
            && pool.len() >= min_inliers
            && !cancel.is_cancelled()
        {
            let (model, inliers) =
                match find_best_cylinder(points, &normals, &pool, &search, rng, cancel) {
                    Some(found) if found.1.len() >= min_inliers => found,
                    _ => break,
                };

            let confidence = inliers.len() as f64 / pool.len() as f64;
            tracing::debug!(
                radius = model.radius,
                inliers = inliers.len(),
                pool = pool.len(),
                confidence,
                "Accepted cylinder"
            );
            remove_inliers(&mut pool, &inliers);
            primitives.push(DetectedPrimitive::Cylinder {
                axis_point: model.axis_point,
                direction: model.direction,
                radius: model.radius,
                inliers,
                confidence,
            });
        }
    }

    tracing::info!(
        points = points.len(),
        planes = plane_count,
        cylinders = primitives.len() - plane_count,
        unassigned = pool.len(),
        cancelled = cancel.is_cancelled(),
        "Primitive detection finished"
    );

    primitives
}

/// Drop `inliers` from `pool`. Both are in ascending index order.
fn remove_inliers(pool: &mut Vec<usize>, inliers: &[usize]) {
    let mut next = inliers.iter().peekable();
    pool.retain(|i| {
        while let Some(&&j) = next.peek() {
            if j < *i {
                next.next();
            } else {
                break;
            }
        }
        if next.peek() == Some(&i) {
            next.next();
            false
        } else {
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_inliers() {
        let mut pool = vec![0, 2, 3, 5, 8, 9];
        remove_inliers(&mut pool, &[2, 5, 9]);
        assert_eq!(pool, vec![0, 3, 8]);
        remove_inliers(&mut pool, &[]);
        assert_eq!(pool, vec![0, 3, 8]);
    }

    #[test]
    fn test_empty_input() {
        let params = DetectionParams::default().with_seed(1);
        assert!(detect_all(&[], &params).is_empty());
    }

    #[test]
    fn test_pool_smaller_than_min_inliers() {
        let points: Vec<_> = (0..50)
            .map(|i| Point3::new((i % 10) as f64, (i / 10) as f64, 0.0))
            .collect();
        let params = DetectionParams::default().with_seed(1);
        assert!(detect_all(&points, &params).is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(DetectionParams::default().validate().is_ok());
        assert!(DetectionParams::default().with_distance_threshold(0.0).validate().is_err());
        assert!(DetectionParams::default().with_min_inliers(2).validate().is_err());
        assert!(DetectionParams::default().with_radius_range(2.0, 1.0).validate().is_err());
    }

    #[test]
    fn test_params_json_defaults() {
        let params: DetectionParams =
            serde_json::from_str(r#"{"distanceThreshold": 0.05, "cylinderEnabled": false}"#).unwrap();
        assert_eq!(params.distance_threshold, 0.05);
        assert!(!params.cylinder_enabled);
        assert_eq!(params.max_iterations, 1000);
        assert_eq!(params.min_inliers, 100);
    }
}
