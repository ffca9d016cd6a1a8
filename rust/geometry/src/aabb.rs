// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Axis-aligned bounding boxes

use nalgebra::{Point3, Vector3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Point3<f64>,
    /// Maximum corner
    pub max: Point3<f64>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create an empty (inverted) bounding box
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    /// Create a bounding box from a triangle
    pub fn from_triangle(v0: &Point3<f64>, v1: &Point3<f64>, v2: &Point3<f64>) -> Self {
        Self {
            min: Point3::new(
                v0.x.min(v1.x).min(v2.x),
                v0.y.min(v1.y).min(v2.y),
                v0.z.min(v1.z).min(v2.z),
            ),
            max: Point3::new(
                v0.x.max(v1.x).max(v2.x),
                v0.y.max(v1.y).max(v2.y),
                v0.z.max(v1.z).max(v2.z),
            ),
        }
    }

    /// Expand this bounding box to include another
    pub fn expand(&mut self, other: &Self) {
        self.min.x = self.min.x.min(other.min.x);
        self.min.y = self.min.y.min(other.min.y);
        self.min.z = self.min.z.min(other.min.z);
        self.max.x = self.max.x.max(other.max.x);
        self.max.y = self.max.y.max(other.max.y);
        self.max.z = self.max.z.max(other.max.z);
    }

    /// Center of the box
    #[inline]
    pub fn center(&self) -> Point3<f64> {
        Point3::new(
            (self.min.x + self.max.x) * 0.5,
            (self.min.y + self.max.y) * 0.5,
            (self.min.z + self.max.z) * 0.5,
        )
    }

    /// Index of the longest axis (0=X, 1=Y, 2=Z)
    pub fn longest_axis(&self) -> usize {
        let dx = self.max.x - self.min.x;
        let dy = self.max.y - self.min.y;
        let dz = self.max.z - self.min.z;

        if dx >= dy && dx >= dz {
            0
        } else if dy >= dz {
            1
        } else {
            2
        }
    }

    /// Check if this bounding box is valid (non-empty)
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Squared distance from a point to the box (0 inside)
    #[inline]
    pub fn distance_squared(&self, point: &Point3<f64>) -> f64 {
        let dx = (self.min.x - point.x).max(0.0).max(point.x - self.max.x);
        let dy = (self.min.y - point.y).max(0.0).max(point.y - self.max.y);
        let dz = (self.min.z - point.z).max(0.0).max(point.z - self.max.z);
        dx * dx + dy * dy + dz * dz
    }

    /// Slab test. Returns the entry distance along the ray if it hits
    /// within `[0, max_distance]`.
    pub fn ray_entry(
        &self,
        origin: &Point3<f64>,
        inv_direction: &Vector3<f64>,
        max_distance: f64,
    ) -> Option<f64> {
        let mut t_min = 0.0_f64;
        let mut t_max = max_distance;
        for axis in 0..3 {
            let t0 = (self.min[axis] - origin[axis]) * inv_direction[axis];
            let t1 = (self.max[axis] - origin[axis]) * inv_direction[axis];
            let (near, far) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
            // NaN (0 * inf) on a flat axis leaves the interval untouched
            if near > t_min {
                t_min = near;
            }
            if far < t_max {
                t_max = far;
            }
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Aabb {
        Aabb {
            min: Point3::new(0.0, 0.0, 0.0),
            max: Point3::new(1.0, 1.0, 1.0),
        }
    }

    #[test]
    fn test_distance_squared() {
        let b = unit_box();
        assert_eq!(b.distance_squared(&Point3::new(0.5, 0.5, 0.5)), 0.0);
        assert_relative_eq!(b.distance_squared(&Point3::new(2.0, 0.5, 0.5)), 1.0);
        assert_relative_eq!(b.distance_squared(&Point3::new(2.0, 2.0, 0.5)), 2.0);
    }

    #[test]
    fn test_ray_entry() {
        let b = unit_box();
        let origin = Point3::new(-1.0, 0.5, 0.5);
        let dir = Vector3::new(1.0, 0.0, 0.0);
        let inv = Vector3::new(1.0 / dir.x, 1.0 / dir.y, 1.0 / dir.z);
        assert_relative_eq!(b.ray_entry(&origin, &inv, f64::INFINITY).unwrap(), 1.0);

        let away = Vector3::new(-1.0, 0.0, 0.0);
        let inv_away = Vector3::new(1.0 / away.x, 1.0 / away.y, 1.0 / away.z);
        assert!(b.ray_entry(&origin, &inv_away, f64::INFINITY).is_none());
    }

    #[test]
    fn test_expand_and_axis() {
        let mut b = Aabb::empty();
        assert!(!b.is_valid());
        b.expand(&Aabb::from_triangle(
            &Point3::new(0.0, 0.0, 0.0),
            &Point3::new(4.0, 1.0, 0.0),
            &Point3::new(0.0, 2.0, 0.5),
        ));
        assert!(b.is_valid());
        assert_eq!(b.longest_axis(), 0);
        assert_relative_eq!(b.center().y, 1.0);
    }
}
