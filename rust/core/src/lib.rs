// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Scan-Lite Core
//!
//! Data model shared by the scan-to-BIM crates:
//!
//! - **Point clouds**: typed points with optional color and intensity, plus
//!   centering with a recoverable [`CoordinateShift`]
//! - **Building meshes**: triangle buffers tagged with IFC element ids
//! - **Errors**: one [`Error`] taxonomy for every crate
//! - **Cancellation**: a shared [`CancelToken`] checked by iteration loops
//!
//! Decoding PLY/LAS/IFC files is left to the viewer's loaders; they hand
//! over flat buffers that convert into these types.

pub mod cancel;
pub mod error;
pub mod mesh;
pub mod point;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point3, Vector3};

pub use cancel::CancelToken;
pub use error::{Error, Result};
pub use mesh::TriangleMesh;
pub use point::{Color, CoordinateShift, PointCloud, ScanPoint};
