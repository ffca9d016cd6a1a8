// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Scan-Lite Processing
//!
//! The numerical core behind scan-to-BIM progress tracking:
//!
//! - [`icp`]: rigid registration of a scan to a model surface or to another
//!   scan, with Kabsch fitting and reflection correction
//! - [`primitives`]: RANSAC extraction of planes and cylinders
//! - [`coverage`]: matched point counts and density per building element
//! - [`pipeline`]: register-then-measure in one call
//!
//! Algorithms are synchronous. Closest-point queries fan out over rayon on
//! native targets and run sequentially on wasm32.

pub mod config;
pub mod correspondence;
pub mod coverage;
pub mod icp;
pub mod kabsch;
pub mod pipeline;
pub mod primitives;

pub use scan_lite_core::{CancelToken, Error, PointCloud, Result, ScanPoint, TriangleMesh};
pub use scan_lite_geometry::{build_index, ClosestPoint, RayHit, RigidTransform, SpatialIndex};

pub use config::PipelineConfig;
pub use correspondence::CorrespondenceTarget;
pub use coverage::{
    analyze_coverage, compute_coverage, CoverageMap, CoverageOptions, CoverageStats,
    ElementCoverage, DEFAULT_TOLERANCE,
};
pub use icp::{register_icp, register_icp_with_cancel, IcpOptions, IcpResult, IcpStatus};
pub use pipeline::{ProgressPipeline, ProgressReport};
pub use primitives::{
    detect_all, detect_all_with_cancel, detect_all_with_rng, DetectedPrimitive, DetectionParams,
};
