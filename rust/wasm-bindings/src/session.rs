// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model and options held between calls from JavaScript
//!
//! Plain Rust so it can be tested on the host. [`crate::ScanAPI`] only
//! converts errors into `JsError`.

use crate::utils::console_debug;
use nalgebra::{Point3, Vector3};
use scan_lite_core::{CoordinateShift, Error, PointCloud, Result, TriangleMesh};
use scan_lite_processing::{
    analyze_coverage, detect_all, register_icp, ClosestPoint, CoverageOptions, DetectionParams,
    IcpOptions, IcpResult, IcpStatus, PipelineConfig, ProgressPipeline, RayHit, SpatialIndex,
};
use serde::Serialize;

/// Registration result in the shape the viewer consumes
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    /// Column-major 4x4 matrix, ready for `Matrix4.fromArray`
    pub matrix: [f64; 16],
    /// Unit quaternion as `[x, y, z, w]`
    pub rotation: [f64; 4],
    pub translation: [f64; 3],
    pub iterations: u32,
    pub error: f64,
    pub status: IcpStatus,
    pub correspondences: usize,
}

impl From<&IcpResult> for Registration {
    fn from(result: &IcpResult) -> Self {
        let q = result.transform.rotation.quaternion();
        let t = result.transform.translation;
        Self {
            matrix: result.transform.to_column_major(),
            rotation: [q.i, q.j, q.k, q.w],
            translation: [t.x, t.y, t.z],
            iterations: result.iterations,
            error: result.error,
            status: result.status,
            correspondences: result.correspondences,
        }
    }
}

/// Closest point or ray hit on the model
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceHit {
    pub point: [f64; 3],
    pub distance: f64,
    pub triangle_index: usize,
    pub element_id: Option<u32>,
}

impl From<ClosestPoint> for SurfaceHit {
    fn from(hit: ClosestPoint) -> Self {
        Self {
            point: [hit.point.x, hit.point.y, hit.point.z],
            distance: hit.distance,
            triangle_index: hit.triangle_index,
            element_id: hit.element_id,
        }
    }
}

impl From<RayHit> for SurfaceHit {
    fn from(hit: RayHit) -> Self {
        Self {
            point: [hit.point.x, hit.point.y, hit.point.z],
            distance: hit.distance,
            triangle_index: hit.triangle_index,
            element_id: hit.element_id,
        }
    }
}

/// Positions moved next to the origin, plus the offset that was removed
#[derive(Debug, Clone, PartialEq)]
pub struct CenteredPoints {
    pub positions: Vec<f32>,
    pub shift: CoordinateShift,
}

/// Center survey-scale `f64` positions at their bounding-box center
///
/// The subtraction happens before the narrowing to `f32`, so millimetres
/// survive even for national grid coordinates.
pub fn center_points(positions: &[f64]) -> Result<CenteredPoints> {
    if positions.len() % 3 != 0 {
        return Err(Error::invalid_input(format!(
            "position buffer length {} is not a multiple of 3",
            positions.len()
        )));
    }
    let mut cloud =
        PointCloud::from_positions(positions.chunks_exact(3).map(|c| Point3::new(c[0], c[1], c[2])));
    let shift = cloud.center_at_origin();
    Ok(CenteredPoints {
        positions: cloud.to_flat_xyz(),
        shift,
    })
}

fn points_from_flat(positions: &[f32]) -> Result<Vec<Point3<f64>>> {
    Ok(PointCloud::from_flat_xyz(positions)?.positions())
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::invalid_input(format!("Serialization error: {}", e)))
}

/// Loaded model and current options
#[derive(Debug, Default)]
pub struct ScanSession {
    index: Option<SpatialIndex>,
    config: PipelineConfig,
}

impl ScanSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the model and build its index eagerly
    ///
    /// Returns the triangle count.
    pub fn set_model(&mut self, positions: Vec<f32>, indices: Vec<u32>, element_ids: Vec<u32>) -> Result<usize> {
        let mesh = TriangleMesh::from_flat(positions, indices, element_ids)?;
        let index = SpatialIndex::new(mesh);
        index.prepare();

        let stats = index.stats();
        console_debug(&format!(
            "model indexed: {} triangles, {} leaves, depth {}",
            index.triangle_count(),
            stats.leaf_count,
            stats.max_depth
        ));

        let count = index.triangle_count();
        self.index = Some(index);
        Ok(count)
    }

    pub fn clear_model(&mut self) {
        self.index = None;
    }

    pub fn has_model(&self) -> bool {
        self.index.is_some()
    }

    /// `[min_x, min_y, min_z, max_x, max_y, max_z]` of the loaded model
    pub fn model_bounds(&self) -> Option<[f64; 6]> {
        let bounds = self.index.as_ref()?.bounds()?;
        Some([
            bounds.min.x,
            bounds.min.y,
            bounds.min.z,
            bounds.max.x,
            bounds.max.y,
            bounds.max.z,
        ])
    }

    /// Move the model, e.g. by the negated shift returned from [`center_points`]
    pub fn translate_model(&mut self, dx: f64, dy: f64, dz: f64) -> Result<()> {
        let index = self.index.as_mut().ok_or_else(no_model)?;
        index.translate(dx, dy, dz);
        index.prepare();
        Ok(())
    }

    fn model(&self) -> Result<&SpatialIndex> {
        self.index.as_ref().ok_or_else(no_model)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn set_config(&mut self, json: &str) -> Result<()> {
        self.config = PipelineConfig::from_json(json)?;
        Ok(())
    }

    pub fn set_icp_options(&mut self, json: &str) -> Result<()> {
        self.config.icp = IcpOptions::from_json(json)?;
        Ok(())
    }

    pub fn set_detection_params(&mut self, json: &str) -> Result<()> {
        self.config.detection = DetectionParams::from_json(json)?;
        Ok(())
    }

    pub fn register_to_model(&self, positions: &[f32]) -> Result<String> {
        let model = self.model()?;
        let source = points_from_flat(positions)?;
        let result = register_icp(&source, model, &self.config.icp)?;
        to_json(&Registration::from(&result))
    }

    pub fn register_to_points(&self, source: &[f32], target: &[f32]) -> Result<String> {
        let source = points_from_flat(source)?;
        let target = points_from_flat(target)?;
        let result = register_icp(&source, target.as_slice(), &self.config.icp)?;
        to_json(&Registration::from(&result))
    }

    pub fn detect_primitives(&self, positions: &[f32]) -> Result<String> {
        self.config.detection.validate()?;
        let points = points_from_flat(positions)?;
        let primitives = detect_all(&points, &self.config.detection);
        console_debug(&format!(
            "{} primitives detected in {} points",
            primitives.len(),
            points.len()
        ));
        to_json(&primitives)
    }

    /// Coverage of already aligned points; `tolerance` overrides the
    /// configured one
    pub fn compute_coverage(&self, positions: &[f32], tolerance: Option<f64>) -> Result<String> {
        let options = CoverageOptions {
            tolerance: tolerance.unwrap_or(self.config.coverage.tolerance),
        };
        options.validate()?;
        let model = self.model()?;
        let points = points_from_flat(positions)?;
        to_json(&analyze_coverage(&points, model, options.tolerance))
    }

    /// Register, then measure coverage, with the full configuration
    pub fn track_progress(&self, positions: &[f32]) -> Result<String> {
        let model = self.model()?;
        let scan = PointCloud::from_flat_xyz(positions)?;
        let report = ProgressPipeline::new(self.config).run(&scan, model)?;
        to_json(&report)
    }

    /// Closest point on the model as JSON; `null` never occurs for a
    /// loaded non-empty model
    pub fn closest_point(&self, x: f64, y: f64, z: f64) -> Result<String> {
        let model = self.model()?;
        let query = Point3::new(x, y, z);
        if !query.coords.iter().all(|c| c.is_finite()) {
            return Err(Error::invalid_input("query point is not finite"));
        }
        to_json(&model.closest_point(&query).map(SurfaceHit::from))
    }

    /// First hit along a ray as JSON, `null` on a miss
    pub fn raycast(&self, origin: [f64; 3], direction: [f64; 3]) -> Result<String> {
        let model = self.model()?;
        let direction = Vector3::from(direction);
        if !(direction.norm() > 0.0 && direction.norm().is_finite()) {
            return Err(Error::invalid_input("ray direction must be a non-zero vector"));
        }
        let origin = Point3::from(origin);
        to_json(&model.raycast(&origin, &direction).map(SurfaceHit::from))
    }
}

fn no_model() -> Error {
    Error::IndexUnavailable("No model loaded. Call setModel first.".to_string())
}
