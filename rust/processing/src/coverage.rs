// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-element scan coverage
//!
//! Every scan point is snapped to the model surface. Points within
//! tolerance count towards the element owning the nearest triangle.
//! `coverage_percent` is a point density (matched points per square meter
//! times 100), not a bounded fraction, so it can exceed 100.

use crate::config::parse_json;
use nalgebra::Point3;
use scan_lite_core::{Error, Result};
use scan_lite_geometry::SpatialIndex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[cfg(not(target_arch = "wasm32"))]
use rayon::prelude::*;

/// Default snapping tolerance in meters
pub const DEFAULT_TOLERANCE: f64 = 0.02;

/// Coverage of one building element
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementCoverage {
    pub matched_points: usize,
    /// `matched_points / area * 100`; `None` when the element has no area
    pub coverage_percent: Option<f64>,
}

/// Element id to coverage, only for elements with at least one match
pub type CoverageMap = BTreeMap<u32, ElementCoverage>;

/// Coverage options
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverageOptions {
    pub tolerance: f64,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

impl CoverageOptions {
    pub fn from_json(json: &str) -> Result<Self> {
        let parsed: Self = parse_json(json)?;
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(Error::config(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Coverage map plus point totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageStats {
    pub elements: CoverageMap,
    /// Points attributed to some element
    pub matched_points: usize,
    /// Points too far from the model or nearest to an untagged triangle
    pub unmatched_points: usize,
}

/// Per-element coverage of `points` against the model in `index`
pub fn compute_coverage(points: &[Point3<f64>], index: &SpatialIndex, tolerance: f64) -> CoverageMap {
    analyze_coverage(points, index, tolerance).elements
}

/// Like [`compute_coverage`], also counting matched and unmatched points
pub fn analyze_coverage(points: &[Point3<f64>], index: &SpatialIndex, tolerance: f64) -> CoverageStats {
    if points.is_empty() || index.is_empty() {
        return CoverageStats {
            elements: CoverageMap::new(),
            matched_points: 0,
            unmatched_points: points.len(),
        };
    }

    let owner = |p: &Point3<f64>| -> Option<u32> {
        index
            .closest_point(p)
            .filter(|hit| hit.distance <= tolerance)
            .and_then(|hit| hit.element_id)
    };

    #[cfg(not(target_arch = "wasm32"))]
    let owners: Vec<Option<u32>> = points.par_iter().map(owner).collect();

    #[cfg(target_arch = "wasm32")]
    let owners: Vec<Option<u32>> = points.iter().map(owner).collect();

    let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
    let mut matched_points = 0;
    for id in owners.into_iter().flatten() {
        *counts.entry(id).or_insert(0) += 1;
        matched_points += 1;
    }

    let elements: CoverageMap = counts
        .into_iter()
        .map(|(id, matched)| {
            let area = index.element_area(id);
            let coverage_percent = if area.is_finite() && area > 0.0 {
                Some(matched as f64 / area * 100.0)
            } else {
                None
            };
            (
                id,
                ElementCoverage {
                    matched_points: matched,
                    coverage_percent,
                },
            )
        })
        .collect();

    tracing::info!(
        points = points.len(),
        elements = elements.len(),
        matched_points,
        tolerance,
        "Coverage computed"
    );

    CoverageStats {
        elements,
        matched_points,
        unmatched_points: points.len() - matched_points,
    }
}
