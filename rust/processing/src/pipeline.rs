// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scan-to-model progress run: register, move, measure

use crate::config::PipelineConfig;
use crate::coverage::{analyze_coverage, CoverageMap};
use crate::icp::{register_icp_with_cancel, IcpResult};
use crate::primitives::{detect_all_with_cancel, DetectedPrimitive};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scan_lite_core::{CancelToken, Error, PointCloud, Result};
use scan_lite_geometry::{RigidTransform, SpatialIndex};
use serde::{Deserialize, Serialize};

/// Outcome of [`ProgressPipeline::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    /// Scan-to-model transform applied before measuring
    pub transform: RigidTransform,
    /// Column-major 4x4 form of `transform`
    pub matrix: [f64; 16],
    /// Registration summary, absent when registration is disabled
    pub icp: Option<IcpResult>,
    pub coverage: CoverageMap,
    pub matched_points: usize,
    pub unmatched_points: usize,
}

/// Runs registration and coverage with one configuration
#[derive(Debug, Clone, Default)]
pub struct ProgressPipeline {
    config: PipelineConfig,
    cancel: CancelToken,
}

impl ProgressPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
        }
    }

    /// Share an existing cancel token with this pipeline
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Align `scan` to `model` (if enabled), then compute per-element coverage
    /// of the aligned points
    pub fn run(&self, scan: &PointCloud, model: &SpatialIndex) -> Result<ProgressReport> {
        self.config.validate()?;
        if scan.is_empty() {
            return Err(Error::invalid_input("scan has no points"));
        }

        let positions = scan.positions();

        let icp = if self.config.register {
            Some(register_icp_with_cancel(
                &positions,
                model,
                &self.config.icp,
                &self.cancel,
            )?)
        } else {
            None
        };
        let transform = icp
            .as_ref()
            .map(|r| r.transform)
            .unwrap_or_else(RigidTransform::identity);

        let aligned = transform.transform_points(&positions);
        let stats = analyze_coverage(&aligned, model, self.config.coverage.tolerance);

        tracing::info!(
            points = positions.len(),
            elements = stats.elements.len(),
            matched = stats.matched_points,
            "Progress run complete"
        );

        Ok(ProgressReport {
            transform,
            matrix: transform.to_column_major(),
            icp,
            coverage: stats.elements,
            matched_points: stats.matched_points,
            unmatched_points: stats.unmatched_points,
        })
    }

    /// Detect planes and cylinders in `scan` with the configured parameters
    pub fn detect_primitives(&self, scan: &PointCloud) -> Result<Vec<DetectedPrimitive>> {
        self.config.detection.validate()?;
        let positions = scan.positions();
        let mut rng = match self.config.detection.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(detect_all_with_cancel(
            &positions,
            &self.config.detection,
            &mut rng,
            &self.cancel,
        ))
    }
}
