// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! WebAssembly bindings for scan registration, primitive detection and coverage

use crate::session::{center_points, ScanSession};
use wasm_bindgen::prelude::*;

fn js_error(e: scan_lite_core::Error) -> JsError {
    JsError::new(&e.to_string())
}

/// Scan-to-BIM progress tracking API
///
/// Options are passed as JSON strings; results come back as JSON strings.
/// Point buffers are flat `[x, y, z, ...]` arrays.
#[wasm_bindgen]
pub struct ScanAPI {
    session: ScanSession,
}

impl Default for ScanAPI {
    fn default() -> Self {
        Self::new()
    }
}

#[wasm_bindgen]
impl ScanAPI {
    /// Create a new ScanAPI instance with default options and no model
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            session: ScanSession::new(),
        }
    }

    /// Load the BIM model and build its spatial index
    ///
    /// # Arguments
    ///
    /// * `positions` - Vertex positions `[x, y, z, ...]`
    /// * `indices` - Triangle indices; empty for a triangle soup
    /// * `element_ids` - One element id per triangle, or empty
    ///
    /// # Returns
    ///
    /// Number of indexed triangles
    #[wasm_bindgen(js_name = setModel)]
    pub fn set_model(
        &mut self,
        positions: Vec<f32>,
        indices: Vec<u32>,
        element_ids: Vec<u32>,
    ) -> Result<usize, JsError> {
        self.session
            .set_model(positions, indices, element_ids)
            .map_err(js_error)
    }

    /// Drop the loaded model
    #[wasm_bindgen(js_name = clearModel)]
    pub fn clear_model(&mut self) {
        self.session.clear_model();
    }

    #[wasm_bindgen(js_name = hasModel)]
    pub fn has_model(&self) -> bool {
        self.session.has_model()
    }

    /// Model bounds as `[minX, minY, minZ, maxX, maxY, maxZ]`
    #[wasm_bindgen(js_name = getModelBounds)]
    pub fn get_model_bounds(&self) -> Option<Vec<f64>> {
        self.session.model_bounds().map(|b| b.to_vec())
    }

    /// Translate the model, typically by the negated shift of `centerPoints`
    #[wasm_bindgen(js_name = translateModel)]
    pub fn translate_model(&mut self, dx: f64, dy: f64, dz: f64) -> Result<(), JsError> {
        self.session.translate_model(dx, dy, dz).map_err(js_error)
    }

    /// Set the full pipeline configuration from JSON
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, config_json: &str) -> Result<(), JsError> {
        self.session.set_config(config_json).map_err(js_error)
    }

    /// Get the full pipeline configuration as JSON
    #[wasm_bindgen(js_name = getConfig)]
    pub fn get_config(&self) -> String {
        self.session.config().to_json()
    }

    /// Set ICP options from JSON (`maxIterations`, `tolerance`, `sampleRatio`, `seed`)
    #[wasm_bindgen(js_name = setIcpOptions)]
    pub fn set_icp_options(&mut self, options_json: &str) -> Result<(), JsError> {
        self.session.set_icp_options(options_json).map_err(js_error)
    }

    #[wasm_bindgen(js_name = getIcpOptions)]
    pub fn get_icp_options(&self) -> String {
        serde_json::to_string(&self.session.config().icp).unwrap_or_else(|_| "{}".to_string())
    }

    /// Set primitive detection parameters from JSON
    #[wasm_bindgen(js_name = setDetectionParams)]
    pub fn set_detection_params(&mut self, params_json: &str) -> Result<(), JsError> {
        self.session.set_detection_params(params_json).map_err(js_error)
    }

    #[wasm_bindgen(js_name = getDetectionParams)]
    pub fn get_detection_params(&self) -> String {
        serde_json::to_string(&self.session.config().detection).unwrap_or_else(|_| "{}".to_string())
    }

    /// Align a scan to the loaded model
    ///
    /// # Returns
    ///
    /// JSON with `matrix` (column-major), `rotation`, `translation`,
    /// `iterations`, `error`, `status` and `correspondences`
    #[wasm_bindgen(js_name = registerToModel)]
    pub fn register_to_model(&self, positions: &[f32]) -> Result<String, JsError> {
        self.session.register_to_model(positions).map_err(js_error)
    }

    /// Align one scan to another
    #[wasm_bindgen(js_name = registerToPoints)]
    pub fn register_to_points(&self, source: &[f32], target: &[f32]) -> Result<String, JsError> {
        self.session.register_to_points(source, target).map_err(js_error)
    }

    /// Detect planes and cylinders
    ///
    /// # Returns
    ///
    /// JSON array of primitives tagged by `type` (`plane` or `cylinder`)
    #[wasm_bindgen(js_name = detectPrimitives)]
    pub fn detect_primitives(&self, positions: &[f32]) -> Result<String, JsError> {
        self.session.detect_primitives(positions).map_err(js_error)
    }

    /// Per-element coverage of aligned scan points
    ///
    /// # Arguments
    ///
    /// * `positions` - Scan points already in model coordinates
    /// * `tolerance` - Snapping distance in meters; the configured value when omitted
    #[wasm_bindgen(js_name = computeCoverage)]
    pub fn compute_coverage(&self, positions: &[f32], tolerance: Option<f64>) -> Result<String, JsError> {
        self.session
            .compute_coverage(positions, tolerance)
            .map_err(js_error)
    }

    /// Register the scan to the model, then compute coverage
    #[wasm_bindgen(js_name = trackProgress)]
    pub fn track_progress(&self, positions: &[f32]) -> Result<String, JsError> {
        self.session.track_progress(positions).map_err(js_error)
    }

    /// Closest point on the model to `(x, y, z)`
    #[wasm_bindgen(js_name = closestPoint)]
    pub fn closest_point(&self, x: f64, y: f64, z: f64) -> Result<String, JsError> {
        self.session.closest_point(x, y, z).map_err(js_error)
    }

    /// First model hit along a ray, `null` on a miss
    #[wasm_bindgen]
    pub fn raycast(
        &self,
        origin_x: f64,
        origin_y: f64,
        origin_z: f64,
        dir_x: f64,
        dir_y: f64,
        dir_z: f64,
    ) -> Result<String, JsError> {
        self.session
            .raycast([origin_x, origin_y, origin_z], [dir_x, dir_y, dir_z])
            .map_err(js_error)
    }

    /// Center survey-scale coordinates at the origin
    ///
    /// Takes `f64` positions so the subtraction happens before precision
    /// is lost to `f32`.
    #[wasm_bindgen(js_name = centerPoints)]
    pub fn center_points(&self, positions: &[f64]) -> Result<CenteredPointsJs, JsError> {
        let centered = center_points(positions).map_err(js_error)?;
        Ok(CenteredPointsJs {
            positions: centered.positions,
            shift: [centered.shift.x, centered.shift.y, centered.shift.z],
        })
    }
}

/// Result of `ScanAPI.centerPoints`
#[wasm_bindgen]
pub struct CenteredPointsJs {
    positions: Vec<f32>,
    shift: [f64; 3],
}

#[wasm_bindgen]
impl CenteredPointsJs {
    /// Centered positions as Float32Array
    #[wasm_bindgen(getter)]
    pub fn positions(&self) -> Vec<f32> {
        self.positions.clone()
    }

    /// Removed offset `[x, y, z]`; add it back to get survey coordinates
    #[wasm_bindgen(getter)]
    pub fn shift(&self) -> Vec<f64> {
        self.shift.to_vec()
    }
}
