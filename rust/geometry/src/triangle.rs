// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Triangle primitives: area, closest point and ray intersection

use nalgebra::{Point3, Vector3};

/// Squared cross-product magnitude below which a triangle is treated as
/// degenerate (zero area)
const DEGENERATE_EPSILON: f64 = 1e-20;

/// Triangle definition
#[derive(Debug, Clone, Copy)]
pub struct Triangle {
    pub v0: Point3<f64>,
    pub v1: Point3<f64>,
    pub v2: Point3<f64>,
}

impl Triangle {
    /// Create a new triangle
    pub fn new(v0: Point3<f64>, v1: Point3<f64>, v2: Point3<f64>) -> Self {
        Self { v0, v1, v2 }
    }

    /// Create from a corner array
    pub fn from_corners(corners: [Point3<f64>; 3]) -> Self {
        Self::new(corners[0], corners[1], corners[2])
    }

    /// Calculate triangle normal (zero vector for degenerate triangles)
    pub fn normal(&self) -> Vector3<f64> {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).try_normalize(0.0).unwrap_or_else(Vector3::zeros)
    }

    /// Calculate triangle area (independent of winding)
    pub fn area(&self) -> f64 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).norm() * 0.5
    }

    /// Whether the triangle has (numerically) zero area
    pub fn is_degenerate(&self) -> bool {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).norm_squared() <= DEGENERATE_EPSILON
    }

    /// Closest point on the triangle surface to `p`
    ///
    /// Voronoi-region walk (Ericson, Real-Time Collision Detection 5.1.5).
    /// Zero-area triangles fall back to their three edge segments.
    pub fn closest_point(&self, p: &Point3<f64>) -> Point3<f64> {
        if self.is_degenerate() {
            return self.closest_point_on_edges(p);
        }

        let a = self.v0;
        let b = self.v1;
        let c = self.v2;
        let ab = b - a;
        let ac = c - a;
        let ap = p - a;

        // Vertex region A
        let d1 = ab.dot(&ap);
        let d2 = ac.dot(&ap);
        if d1 <= 0.0 && d2 <= 0.0 {
            return a;
        }

        // Vertex region B
        let bp = p - b;
        let d3 = ab.dot(&bp);
        let d4 = ac.dot(&bp);
        if d3 >= 0.0 && d4 <= d3 {
            return b;
        }

        // Edge region AB
        let vc = d1 * d4 - d3 * d2;
        if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
            let v = d1 / (d1 - d3);
            return a + ab * v;
        }

        // Vertex region C
        let cp = p - c;
        let d5 = ab.dot(&cp);
        let d6 = ac.dot(&cp);
        if d6 >= 0.0 && d5 <= d6 {
            return c;
        }

        // Edge region AC
        let vb = d5 * d2 - d1 * d6;
        if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
            let w = d2 / (d2 - d6);
            return a + ac * w;
        }

        // Edge region BC
        let va = d3 * d6 - d5 * d4;
        if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
            let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
            return b + (c - b) * w;
        }

        // Face region
        let denom = 1.0 / (va + vb + vc);
        let v = vb * denom;
        let w = vc * denom;
        a + ab * v + ac * w
    }

    fn closest_point_on_edges(&self, p: &Point3<f64>) -> Point3<f64> {
        let candidates = [
            closest_point_on_segment(p, &self.v0, &self.v1),
            closest_point_on_segment(p, &self.v1, &self.v2),
            closest_point_on_segment(p, &self.v2, &self.v0),
        ];
        let mut best = candidates[0];
        let mut best_d = (best - p).norm_squared();
        for c in &candidates[1..] {
            let d = (c - p).norm_squared();
            if d < best_d {
                best = *c;
                best_d = d;
            }
        }
        best
    }

    /// Ray/triangle intersection (Möller–Trumbore, two-sided)
    ///
    /// Returns the distance along `direction` (in units of its length).
    pub fn intersect_ray(&self, origin: &Point3<f64>, direction: &Vector3<f64>) -> Option<f64> {
        const EPSILON: f64 = 1e-12;

        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        let h = direction.cross(&edge2);
        let det = edge1.dot(&h);
        if det.abs() < EPSILON {
            return None; // Parallel or degenerate
        }

        let inv_det = 1.0 / det;
        let s = origin - self.v0;
        let u = inv_det * s.dot(&h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let q = s.cross(&edge1);
        let v = inv_det * direction.dot(&q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * edge2.dot(&q);
        if t >= 0.0 {
            Some(t)
        } else {
            None
        }
    }
}

/// Closest point on segment `[a, b]` to `p`
pub fn closest_point_on_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> Point3<f64> {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= DEGENERATE_EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn xy_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        )
    }

    #[test]
    fn test_area_ignores_winding() {
        let t = xy_triangle();
        let flipped = Triangle::new(t.v0, t.v2, t.v1);
        assert_relative_eq!(t.area(), 0.5);
        assert_relative_eq!(flipped.area(), 0.5);
    }

    #[test]
    fn test_closest_point_regions() {
        let t = xy_triangle();

        // Face region: projection onto the plane
        let p = t.closest_point(&Point3::new(0.25, 0.25, 3.0));
        assert_relative_eq!(p, Point3::new(0.25, 0.25, 0.0));

        // Vertex region
        let p = t.closest_point(&Point3::new(-1.0, -1.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.0, 0.0, 0.0));

        // Edge region BC (hypotenuse)
        let p = t.closest_point(&Point3::new(1.0, 1.0, 0.0));
        assert_relative_eq!(p, Point3::new(0.5, 0.5, 0.0));

        // Edge region AB
        let p = t.closest_point(&Point3::new(0.5, -2.0, 1.0));
        assert_relative_eq!(p, Point3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_degenerate_triangle_uses_edges() {
        // All three corners on a line
        let t = Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
        );
        assert!(t.is_degenerate());
        assert_eq!(t.area(), 0.0);
        let p = t.closest_point(&Point3::new(1.5, 1.0, 0.0));
        assert_relative_eq!(p, Point3::new(1.5, 0.0, 0.0));
        assert!(p.x.is_finite());

        // Collapsed to a single point
        let dot = Triangle::new(Point3::origin(), Point3::origin(), Point3::origin());
        assert_relative_eq!(dot.closest_point(&Point3::new(1.0, 2.0, 3.0)), Point3::origin());
    }

    #[test]
    fn test_intersect_ray() {
        let t = xy_triangle();
        let hit = t.intersect_ray(&Point3::new(0.2, 0.2, 5.0), &Vector3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(hit.unwrap(), 5.0);

        // Behind the origin
        assert!(t
            .intersect_ray(&Point3::new(0.2, 0.2, 5.0), &Vector3::new(0.0, 0.0, 1.0))
            .is_none());

        // Misses the triangle
        assert!(t
            .intersect_ray(&Point3::new(2.0, 2.0, 5.0), &Vector3::new(0.0, 0.0, -1.0))
            .is_none());
    }
}
