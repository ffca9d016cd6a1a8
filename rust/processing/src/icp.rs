// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Iterative Closest Point registration
//!
//! Each iteration moves the source by the accumulated transform, samples
//! it, pairs every sample with its closest target point, fits an
//! incremental rigid transform with Kabsch and composes it on the left of
//! the accumulated one. The loop stops when the mean residual stops
//! changing (or is already below tolerance), after `max_iterations`, or
//! when the cancel token fires.

use crate::config::parse_json;
use crate::correspondence::CorrespondenceTarget;
use crate::kabsch::{fit_rigid, mean_residual, MIN_CORRESPONDENCES};
use nalgebra::Point3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use scan_lite_core::{CancelToken, Error, Result};
use scan_lite_geometry::RigidTransform;
use serde::{Deserialize, Serialize};

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// ICP options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IcpOptions {
    /// Iteration cap (> 0)
    pub max_iterations: u32,
    /// Convergence threshold on the mean residual and its change (> 0)
    pub tolerance: f64,
    /// Fraction of source points matched per iteration, in (0, 1]
    pub sample_ratio: f64,
    /// Seed for sampling; `None` draws from OS entropy
    pub seed: Option<u64>,
}

impl Default for IcpOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-4,
            sample_ratio: 1.0,
            seed: None,
        }
    }
}

impl IcpOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_sample_ratio(mut self, ratio: f64) -> Self {
        self.sample_ratio = ratio;
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
        if self.max_iterations == 0 {
            return Err(Error::config("maxIterations must be greater than 0"));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::config(format!(
                "tolerance must be a positive number, got {}",
                self.tolerance
            )));
        }
        if !(self.sample_ratio > 0.0 && self.sample_ratio <= 1.0) {
            return Err(Error::config(format!(
                "sampleRatio must be in (0, 1], got {}",
                self.sample_ratio
            )));
        }
        Ok(())
    }
}

/// How a registration run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IcpStatus {
    Converged,
    MaxIterationsReached,
    Cancelled,
}

/// Registration result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IcpResult {
    /// Maps source coordinates into target coordinates
    pub transform: RigidTransform,
    /// Iterations performed
    pub iterations: u32,
    /// Mean residual distance of the last iteration's correspondences
    pub error: f64,
    pub status: IcpStatus,
    /// Correspondences used in the last iteration
    pub correspondences: usize,
}

impl IcpResult {
    #[inline]
    pub fn is_converged(&self) -> bool {
        self.status == IcpStatus::Converged
    }
}

/// Align `source` to `target`
pub fn register_icp<T>(source: &[Point3<f64>], target: &T, options: &IcpOptions) -> Result<IcpResult>
where
    T: CorrespondenceTarget + ?Sized,
{
    register_icp_with_cancel(source, target, options, &CancelToken::new())
}

/// Align `source` to `target`, checking `cancel` before every iteration
pub fn register_icp_with_cancel<T>(
    source: &[Point3<f64>],
    target: &T,
    options: &IcpOptions,
    cancel: &CancelToken,
) -> Result<IcpResult>
where
    T: CorrespondenceTarget + ?Sized,
{
    options.validate()?;
    if source.is_empty() {
        return Err(Error::invalid_input("source point set is empty"));
    }
    target.ensure_ready()?;

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let sample_size = sample_size(source.len(), options.sample_ratio);

    let mut accumulated = RigidTransform::identity();
    let mut previous_error = f64::INFINITY;
    let mut error = 0.0;
    let mut correspondences = 0;
    let mut iterations = 0;
    let mut status = IcpStatus::MaxIterationsReached;

    while iterations < options.max_iterations {
        if cancel.is_cancelled() {
            status = IcpStatus::Cancelled;
            break;
        }
        iterations += 1;

        let samples: Vec<Point3<f64>> = if sample_size >= source.len() {
            accumulated.transform_points(source)
        } else {
            rand::seq::index::sample(&mut rng, source.len(), sample_size)
                .into_iter()
                .map(|i| accumulated.transform_point(&source[i]))
                .collect()
        };

        let (matched_source, matched_target) = find_correspondences(&samples, target);
        correspondences = matched_source.len();

        if correspondences < MIN_CORRESPONDENCES {
            tracing::warn!(
                iteration = iterations,
                correspondences,
                "Too few correspondences, keeping transform"
            );
            error = mean_residual(&matched_source, &matched_target);
        } else {
            match fit_rigid(&matched_source, &matched_target) {
                Ok(increment) => {
                    accumulated = increment.compose(&accumulated);
                    let moved = increment.transform_points(&matched_source);
                    error = mean_residual(&moved, &matched_target);
                }
                Err(e) => {
                    tracing::warn!(iteration = iterations, error = %e, "Skipping degenerate update");
                    error = mean_residual(&matched_source, &matched_target);
                }
            }
        }

        tracing::debug!(iteration = iterations, error, correspondences, "ICP iteration");

        if error < options.tolerance || (previous_error - error).abs() < options.tolerance {
            status = IcpStatus::Converged;
            break;
        }
        previous_error = error;
    }

    tracing::info!(
        iterations,
        error,
        correspondences,
        status = ?status,
        "ICP registration finished"
    );

    Ok(IcpResult {
        transform: accumulated,
        iterations,
        error,
        status,
        correspondences,
    })
}

/// `ceil(n * ratio)`, at least one and at most `n`
fn sample_size(n: usize, ratio: f64) -> usize {
    if ratio >= 1.0 {
        return n;
    }
    ((n as f64 * ratio).ceil() as usize).clamp(1, n)
}

/// Pair each sample with its closest target point, keeping sample order
fn find_correspondences<T>(samples: &[Point3<f64>], target: &T) -> (Vec<Point3<f64>>, Vec<Point3<f64>>)
where
    T: CorrespondenceTarget + ?Sized,
{
    #[cfg(not(target_arch = "wasm32"))]
    let nearest: Vec<Option<Point3<f64>>> = samples.par_iter().map(|p| target.nearest(p)).collect();

    #[cfg(target_arch = "wasm32")]
    let nearest: Vec<Option<Point3<f64>>> = samples.iter().map(|p| target.nearest(p)).collect();

    samples
        .iter()
        .zip(nearest)
        .filter_map(|(s, t)| t.map(|t| (*s, t)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{UnitQuaternion, Vector3};

    fn grid(n: usize, spacing: f64) -> Vec<Point3<f64>> {
        let half = (n - 1) as f64 * spacing * 0.5;
        let mut points = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    points.push(Point3::new(
                        i as f64 * spacing - half,
                        j as f64 * spacing - half,
                        k as f64 * spacing - half,
                    ));
                }
            }
        }
        points
    }

    #[test]
    fn test_sample_size() {
        assert_eq!(sample_size(10, 1.0), 10);
        assert_eq!(sample_size(10, 0.25), 3);
        assert_eq!(sample_size(10, 0.01), 1);
        assert_eq!(sample_size(3, 0.999), 3);
    }

    #[test]
    fn test_validate_options() {
        assert!(IcpOptions::default().validate().is_ok());
        assert!(IcpOptions::default().with_max_iterations(0).validate().is_err());
        assert!(IcpOptions::default().with_tolerance(0.0).validate().is_err());
        assert!(IcpOptions::default().with_tolerance(f64::NAN).validate().is_err());
        assert!(IcpOptions::default().with_sample_ratio(0.0).validate().is_err());
        assert!(IcpOptions::default().with_sample_ratio(1.5).validate().is_err());
    }

    #[test]
    fn test_identity_converges_immediately() {
        let points = grid(4, 1.0);
        let result = register_icp(&points, &points, &IcpOptions::default()).unwrap();
        assert_eq!(result.status, IcpStatus::Converged);
        assert_eq!(result.iterations, 1);
        assert!(result.error < 1e-9);
        assert!(result.transform.is_identity(1e-9));
    }

    #[test]
    fn test_too_few_correspondences_keeps_identity() {
        let source = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(10.0, 0.0, 0.0)];
        let target: Vec<Point3<f64>> = source.iter().map(|p| p + Vector3::new(0.5, 0.0, 0.0)).collect();

        let result = register_icp(&source, &target, &IcpOptions::default()).unwrap();
        assert!(result.transform.is_identity(1e-12));
        assert_eq!(result.status, IcpStatus::Converged);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.correspondences, 2);
        assert_relative_eq!(result.error, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        let points = grid(3, 1.0);
        let empty: Vec<Point3<f64>> = Vec::new();
        let options = IcpOptions::default();
        assert!(matches!(
            register_icp(&empty, &points, &options),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            register_icp(&points, &empty, &options),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let points = grid(3, 1.0);
        let options = IcpOptions::default().with_sample_ratio(0.0);
        assert!(matches!(
            register_icp(&points, &points, &options),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_cancelled_before_start() {
        let points = grid(3, 1.0);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result =
            register_icp_with_cancel(&points, &points, &IcpOptions::default(), &cancel).unwrap();
        assert_eq!(result.status, IcpStatus::Cancelled);
        assert_eq!(result.iterations, 0);
        assert!(result.transform.is_identity(1e-12));
    }

    #[test]
    fn test_recovers_small_offset() {
        let target = grid(6, 0.5);
        let truth = RigidTransform::new(
            UnitQuaternion::from_euler_angles(0.0, 0.0, 2.0_f64.to_radians()),
            Vector3::new(0.05, 0.03, -0.04),
        );
        let source = truth.inverse().transform_points(&target);

        let options = IcpOptions::default().with_max_iterations(50).with_tolerance(1e-8);
        let result = register_icp(&source, &target, &options).unwrap();

        assert!(result.is_converged());
        assert!(result.error < 1e-6);
        assert_relative_eq!(
            result.transform.to_matrix4(),
            truth.to_matrix4(),
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_seeded_subsampling_is_reproducible() {
        let target = grid(5, 0.5);
        let truth = RigidTransform::from_translation(Vector3::new(0.04, -0.02, 0.03));
        let source = truth.inverse().transform_points(&target);

        let options = IcpOptions::default().with_sample_ratio(0.5).with_seed(11);
        let a = register_icp(&source, &target, &options).unwrap();
        let b = register_icp(&source, &target, &options).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.correspondences, 63);
    }
}
