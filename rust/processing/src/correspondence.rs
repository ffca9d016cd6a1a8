// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Nearest-neighbour targets for registration
//!
//! ICP only needs "closest target point to this query". A building model
//! answers through its [`SpatialIndex`]; a reference scan answers with a
//! linear scan over its points.

use nalgebra::Point3;
use scan_lite_core::{Error, Result};
use scan_lite_geometry::SpatialIndex;

/// Something ICP can align against
pub trait CorrespondenceTarget: Sync {
    /// Fail with the error matching this kind of target when it has
    /// nothing to match against
    fn ensure_ready(&self) -> Result<()>;

    /// Closest target point to `query`
    fn nearest(&self, query: &Point3<f64>) -> Option<Point3<f64>>;
}

impl CorrespondenceTarget for SpatialIndex {
    fn ensure_ready(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::IndexUnavailable(
                "model mesh has no triangles".to_string(),
            ));
        }
        Ok(())
    }

    #[inline]
    fn nearest(&self, query: &Point3<f64>) -> Option<Point3<f64>> {
        self.closest_point(query).map(|hit| hit.point)
    }
}

impl CorrespondenceTarget for [Point3<f64>] {
    fn ensure_ready(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::invalid_input("target point set is empty"));
        }
        Ok(())
    }

    fn nearest(&self, query: &Point3<f64>) -> Option<Point3<f64>> {
        let mut best: Option<Point3<f64>> = None;
        let mut best_d = f64::INFINITY;
        for p in self {
            let d = (p - query).norm_squared();
            if d < best_d {
                best_d = d;
                best = Some(*p);
            }
        }
        best
    }
}

impl CorrespondenceTarget for Vec<Point3<f64>> {
    fn ensure_ready(&self) -> Result<()> {
        self.as_slice().ensure_ready()
    }

    #[inline]
    fn nearest(&self, query: &Point3<f64>) -> Option<Point3<f64>> {
        self.as_slice().nearest(query)
    }
}
