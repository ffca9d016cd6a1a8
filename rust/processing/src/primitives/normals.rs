// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-point surface normals from k-nearest-neighbour PCA
//!
//! Neighbours come from a kd-tree built once over the cloud. The normal is
//! the eigenvector of the smallest eigenvalue of the neighbourhood
//! covariance.

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, Vector3};

/// Builds a kd-tree whose items are indices into `points`
///
/// The immutable tree tolerates many points sharing one coordinate, which
/// flat floors and walls in real scans always produce.
fn build_kdtree(points: &[Point3<f64>]) -> ImmutableKdTree<f64, 3> {
    let entries: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    ImmutableKdTree::new_from_slice(&entries)
}

/// Indices of the `k` points nearest to `points[index]`, itself included
fn nearest(tree: &ImmutableKdTree<f64, 3>, points: &[Point3<f64>], index: usize, k: usize) -> Vec<usize> {
    let p = &points[index];
    tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k)
        .into_iter()
        .map(|n| n.item as usize)
        .collect()
}

/// Unit normal of a neighbourhood, `None` when it has fewer than three
/// points or no dominant plane
pub fn pca_normal(points: &[Point3<f64>], neighbours: &[usize]) -> Option<Vector3<f64>> {
    if neighbours.len() < 3 {
        return None;
    }
    let n = neighbours.len() as f64;
    let centroid: Vector3<f64> = neighbours.iter().map(|&i| points[i].coords).sum::<Vector3<f64>>() / n;

    let mut covariance = Matrix3::zeros();
    for &i in neighbours {
        let d = points[i].coords - centroid;
        covariance += d * d.transpose();
    }
    covariance /= n;
    if covariance.trace() <= f64::EPSILON {
        return None;
    }

    let eigen = covariance.symmetric_eigen();
    let smallest = eigen.eigenvalues.imin();
    let normal: Vector3<f64> = eigen.eigenvectors.column(smallest).into_owned();
    normal.try_normalize(1e-12)
}

/// Normal for every point, estimated from its `k` nearest neighbours
///
/// Every point gets `None` when the cloud has no extent (fewer than three
/// points, or all coincident). Orientation is arbitrary.
pub fn estimate_normals(points: &[Point3<f64>], k: usize) -> Vec<Option<Vector3<f64>>> {
    if points.len() < 3 {
        return vec![None; points.len()];
    }
    let k = k.max(3);
    let tree = build_kdtree(points);

    (0..points.len())
        .map(|i| {
            let neighbours = nearest(&tree, points, i, k);
            pca_normal(points, &neighbours)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_normals() {
        let mut points = Vec::new();
        for i in 0..20 {
            for j in 0..20 {
                points.push(Point3::new(i as f64 * 0.1, j as f64 * 0.1, 2.0));
            }
        }
        let normals = estimate_normals(&points, 8);
        assert_eq!(normals.len(), points.len());
        for n in normals {
            let n = n.unwrap();
            assert!(n.z.abs() > 0.999);
        }
    }

    #[test]
    fn test_cylinder_normals_are_radial() {
        let radius = 0.5;
        let mut points = Vec::new();
        for ring in 0..20 {
            for step in 0..36 {
                let a = step as f64 * std::f64::consts::TAU / 36.0;
                points.push(Point3::new(radius * a.cos(), radius * a.sin(), ring as f64 * 0.09));
            }
        }
        let normals = estimate_normals(&points, 12);
        for (p, n) in points.iter().zip(normals) {
            let n = n.unwrap();
            let radial = Vector3::new(p.x, p.y, 0.0).normalize();
            assert!(n.dot(&radial).abs() > 0.95, "normal {:?} at {:?}", n, p);
        }
    }

    #[test]
    fn test_knn_matches_brute_force() {
        let mut points = Vec::new();
        for i in 0..200 {
            let t = i as f64 * 0.37;
            points.push(Point3::new(t.sin() * 3.0, (t * 1.3).cos() * 2.0, (t * 0.7).sin()));
        }
        let tree = build_kdtree(&points);
        for i in [0, 17, 99, 199] {
            let mut got = nearest(&tree, &points, i, 10);
            got.sort_unstable();

            let mut all: Vec<(f64, usize)> = points
                .iter()
                .enumerate()
                .map(|(j, p)| ((p - points[i]).norm_squared(), j))
                .collect();
            all.sort_by(|a, b| a.0.total_cmp(&b.0));
            let mut expected: Vec<usize> = all[..10].iter().map(|&(_, j)| j).collect();
            expected.sort_unstable();

            assert_eq!(got, expected);
        }
    }

    #[test]
    fn test_far_outlier_keeps_local_neighbourhoods() {
        let mut points = Vec::new();
        for i in 0..40 {
            for j in 0..40 {
                points.push(Point3::new(i as f64 * 0.05, j as f64 * 0.05, 0.0));
            }
        }
        points.push(Point3::new(500.0, 500.0, 500.0));

        let tree = build_kdtree(&points);
        let neighbours = nearest(&tree, &points, 0, 8);
        assert_eq!(neighbours.len(), 8);
        for &j in &neighbours {
            assert!((points[j] - points[0]).norm() < 0.2);
        }

        let normals = estimate_normals(&points, 8);
        for n in &normals[..normals.len() - 1] {
            assert!(n.unwrap().z.abs() > 0.999);
        }
    }

    #[test]
    fn test_degenerate_clouds() {
        assert!(estimate_normals(&[], 12).is_empty());
        let same = vec![Point3::new(1.0, 1.0, 1.0); 5];
        assert!(estimate_normals(&same, 12).iter().all(Option::is_none));
    }
}
