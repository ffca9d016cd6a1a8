// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point cloud data structures
//!
//! Loaders (PLY, LAS, XYZ) are external collaborators: they hand over a flat
//! list of positions with optional per-point color and intensity. This module
//! turns that into typed [`ScanPoint`]s and normalizes the cloud around the
//! origin so that large survey coordinates survive the trip to `f32` GPU
//! buffers.

use nalgebra::Point3;

use crate::error::{Error, Result};

/// RGB color of a scanned point (0-255 per channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A single scanned point
///
/// Color and intensity are sensor dependent; a LAS file may carry both, an
/// XYZ file neither.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanPoint {
    /// Position in meters
    pub position: Point3<f64>,
    /// Optional RGB color
    pub color: Option<Color>,
    /// Optional intensity (sensor-dependent scale)
    pub intensity: Option<f32>,
}

impl ScanPoint {
    /// Create a bare point without color or intensity
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            position: Point3::new(x, y, z),
            color: None,
            intensity: None,
        }
    }

    /// Attach a color
    #[inline]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = Some(color);
        self
    }

    /// Attach an intensity value
    #[inline]
    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

impl From<Point3<f64>> for ScanPoint {
    fn from(position: Point3<f64>) -> Self {
        Self {
            position,
            color: None,
            intensity: None,
        }
    }
}

/// Coordinate shift applied when a cloud is centered at the origin
///
/// Stores the offset subtracted from every point so results computed in the
/// local frame can be mapped back to survey coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoordinateShift {
    /// X offset (subtracted from all X coordinates)
    pub x: f64,
    /// Y offset (subtracted from all Y coordinates)
    pub y: f64,
    /// Z offset (subtracted from all Z coordinates)
    pub z: f64,
}

impl CoordinateShift {
    /// Create a new coordinate shift
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Check if shift is significant (>10km from origin)
    #[inline]
    pub fn is_significant(&self) -> bool {
        const THRESHOLD: f64 = 10000.0; // 10km
        self.x.abs() > THRESHOLD || self.y.abs() > THRESHOLD || self.z.abs() > THRESHOLD
    }

    /// Check if shift is zero (no shifting needed)
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Map a local (shifted) point back to world coordinates
    #[inline]
    pub fn to_world(&self, local: &Point3<f64>) -> Point3<f64> {
        Point3::new(local.x + self.x, local.y + self.y, local.z + self.z)
    }

    /// Map a world point into the local (shifted) frame
    #[inline]
    pub fn to_local(&self, world: &Point3<f64>) -> Point3<f64> {
        Point3::new(world.x - self.x, world.y - self.y, world.z - self.z)
    }
}

/// An ordered collection of scanned points
///
/// Order carries no meaning but iteration is stable, which keeps seeded
/// sampling reproducible.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub points: Vec<ScanPoint>,
    /// Accumulated shift applied by [`PointCloud::center_at_origin`]
    pub shift: CoordinateShift,
}

impl PointCloud {
    /// Create an empty cloud
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cloud with capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
            shift: CoordinateShift::default(),
        }
    }

    /// Build a cloud from bare positions
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Point3<f64>>,
    {
        Self {
            points: positions.into_iter().map(ScanPoint::from).collect(),
            shift: CoordinateShift::default(),
        }
    }

    /// Build a cloud from a flat `[x, y, z, x, y, z, ...]` buffer
    ///
    /// This is the layout of a `Float32Array` position attribute.
    pub fn from_flat_xyz(flat: &[f32]) -> Result<Self> {
        if flat.len() % 3 != 0 {
            return Err(Error::invalid_input(format!(
                "flat position buffer length {} is not a multiple of 3",
                flat.len()
            )));
        }
        Ok(Self::from_positions(flat.chunks_exact(3).map(|c| {
            Point3::new(c[0] as f64, c[1] as f64, c[2] as f64)
        })))
    }

    /// Attach per-point RGB colors from a flat `[r, g, b, ...]` buffer
    pub fn set_colors(&mut self, rgb: &[u8]) -> Result<()> {
        if rgb.len() != self.points.len() * 3 {
            return Err(Error::invalid_input(format!(
                "expected {} color bytes, got {}",
                self.points.len() * 3,
                rgb.len()
            )));
        }
        for (point, c) in self.points.iter_mut().zip(rgb.chunks_exact(3)) {
            point.color = Some(Color::new(c[0], c[1], c[2]));
        }
        Ok(())
    }

    /// Attach per-point intensities
    pub fn set_intensities(&mut self, intensities: &[f32]) -> Result<()> {
        if intensities.len() != self.points.len() {
            return Err(Error::invalid_input(format!(
                "expected {} intensities, got {}",
                self.points.len(),
                intensities.len()
            )));
        }
        for (point, &i) in self.points.iter_mut().zip(intensities) {
            point.intensity = Some(i);
        }
        Ok(())
    }

    /// Add a point
    #[inline]
    pub fn push(&mut self, point: ScanPoint) {
        self.points.push(point);
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Positions only, in cloud order
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.points.iter().map(|p| p.position).collect()
    }

    /// Calculate bounds (min, max), or `None` for an empty cloud
    pub fn bounds(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let first = self.points.first()?.position;
        let mut min = first;
        let mut max = first;
        for p in &self.points {
            min.x = min.x.min(p.position.x);
            min.y = min.y.min(p.position.y);
            min.z = min.z.min(p.position.z);
            max.x = max.x.max(p.position.x);
            max.y = max.y.max(p.position.y);
            max.z = max.z.max(p.position.z);
        }
        Some((min, max))
    }

    /// Move the cloud so its bounding-box center sits at the origin
    ///
    /// The subtraction happens in f64; the returned shift is the offset that
    /// was removed by this call. [`PointCloud::shift`] accumulates across calls
    /// so `shift.to_world` always recovers the loader's coordinates.
    pub fn center_at_origin(&mut self) -> CoordinateShift {
        let Some((min, max)) = self.bounds() else {
            return CoordinateShift::default();
        };
        let center = CoordinateShift::new(
            (min.x + max.x) * 0.5,
            (min.y + max.y) * 0.5,
            (min.z + max.z) * 0.5,
        );
        if center.is_zero() {
            return center;
        }
        for p in &mut self.points {
            p.position = center.to_local(&p.position);
        }
        self.shift.x += center.x;
        self.shift.y += center.y;
        self.shift.z += center.z;
        center
    }

    /// Flatten positions into an `f32` buffer for GPU upload
    pub fn to_flat_xyz(&self) -> Vec<f32> {
        let mut flat = Vec::with_capacity(self.points.len() * 3);
        for p in &self.points {
            flat.push(p.position.x as f32);
            flat.push(p.position.y as f32);
            flat.push(p.position.z as f32);
        }
        flat
    }
}
