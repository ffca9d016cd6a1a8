// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use scan_lite_processing::{
    detect_all, detect_all_with_cancel, CancelToken, DetectedPrimitive, DetectionParams,
};
use std::f64::consts::TAU;

fn random_points(rng: &mut StdRng, count: usize, half_extent: f64) -> Vec<Point3<f64>> {
    (0..count)
        .map(|_| {
            Point3::new(
                rng.gen_range(-half_extent..half_extent),
                rng.gen_range(-half_extent..half_extent),
                rng.gen_range(-half_extent..half_extent),
            )
        })
        .collect()
}

/// Vertical column surface around (cx, cy), rings starting at `z0`
fn column(cx: f64, cy: f64, radius: f64, angles: usize, rings: usize, z0: f64, dz: f64) -> Vec<Point3<f64>> {
    let mut points = Vec::with_capacity(angles * rings);
    for ring in 0..rings {
        for a in 0..angles {
            let theta = a as f64 * TAU / angles as f64;
            points.push(Point3::new(
                cx + radius * theta.cos(),
                cy + radius * theta.sin(),
                z0 + ring as f64 * dz,
            ));
        }
    }
    points
}

#[test]
fn finds_tilted_plane_among_outliers() {
    let mut points = Vec::new();
    for i in 0..25 {
        for j in 0..20 {
            let x = i as f64 * 0.2;
            let y = j as f64 * 0.2;
            points.push(Point3::new(x, y, 0.1 * x + 0.2 * y + 1.0));
        }
    }
    let mut rng = StdRng::seed_from_u64(11);
    points.extend(random_points(&mut rng, 50, 5.0));

    let params = DetectionParams::default().with_seed(42);
    let primitives = detect_all(&points, &params);

    assert_eq!(primitives.len(), 1);
    match &primitives[0] {
        DetectedPrimitive::Plane {
            normal,
            inliers,
            confidence,
            ..
        } => {
            let expected = Vector3::new(-0.1, -0.2, 1.0).normalize();
            assert!(normal.dot(&expected).abs() > 0.99);
            assert!((500..=510).contains(&inliers.len()), "{}", inliers.len());
            assert!((0..500).all(|i| inliers.contains(&i)));
            assert_relative_eq!(*confidence, inliers.len() as f64 / 550.0);
        }
        other => panic!("expected a plane, got {:?}", other),
    }
}

#[test]
fn finds_cylinder_with_planes_disabled() {
    let mut points = column(0.0, 0.0, 0.5, 36, 25, 0.0, 0.1);
    let mut rng = StdRng::seed_from_u64(5);
    points.extend(random_points(&mut rng, 100, 2.0));

    let params = DetectionParams::default()
        .with_planes(false)
        .with_distance_threshold(0.05)
        .with_seed(9);
    let primitives = detect_all(&points, &params);

    assert_eq!(primitives.len(), 1);
    match &primitives[0] {
        DetectedPrimitive::Cylinder {
            axis_point,
            direction,
            radius,
            inliers,
            ..
        } => {
            assert_relative_eq!(*radius, 0.5, epsilon = 0.05);
            assert!(direction.z.abs() > 0.99);
            assert!(axis_point.x.hypot(axis_point.y) < 0.05);
            assert!(inliers.len() >= 900);
            assert!((0..900).all(|i| inliers.contains(&i)));
        }
        other => panic!("expected a cylinder, got {:?}", other),
    }
}

#[test]
fn floor_then_column() {
    let mut points = Vec::new();
    for i in 0..25 {
        for j in 0..25 {
            points.push(Point3::new(-3.0 + i as f64 * 0.25, -3.0 + j as f64 * 0.25, 0.0));
        }
    }
    let floor_count = points.len();
    points.extend(column(1.0, 1.0, 0.3, 24, 20, 0.08, 0.08));

    let params = DetectionParams::default()
        .with_distance_threshold(0.02)
        .with_seed(3);
    let primitives = detect_all(&points, &params);

    let planes: Vec<_> = primitives.iter().filter(|p| p.is_plane()).collect();
    let cylinders: Vec<_> = primitives.iter().filter(|p| p.is_cylinder()).collect();
    assert_eq!(planes.len(), 1);
    assert_eq!(cylinders.len(), 1);

    // Planes come first
    assert!(primitives[0].is_plane());

    if let DetectedPrimitive::Plane { normal, inliers, .. } = planes[0] {
        assert!(normal.z.abs() > 0.99);
        assert_eq!(inliers.len(), floor_count);
    }

    if let DetectedPrimitive::Cylinder {
        axis_point,
        direction,
        radius,
        inliers,
        ..
    } = cylinders[0]
    {
        assert_relative_eq!(*radius, 0.3, epsilon = 0.02);
        assert!(direction.z.abs() > 0.99);
        assert!((axis_point.x - 1.0).hypot(axis_point.y - 1.0) < 0.03);
        // Indices refer to the input slice, past the floor points
        assert!(inliers.iter().all(|&i| i >= floor_count && i < points.len()));
    }

    // No point belongs to two primitives
    let mut seen = vec![false; points.len()];
    for primitive in &primitives {
        for &i in primitive.inliers() {
            assert!(!seen[i]);
            seen[i] = true;
        }
    }
}

#[test]
fn same_seed_same_result() {
    let mut points = column(0.0, 0.0, 0.5, 36, 10, 0.0, 0.1);
    let mut rng = StdRng::seed_from_u64(1);
    points.extend(random_points(&mut rng, 200, 2.0));

    let params = DetectionParams::default()
        .with_distance_threshold(0.05)
        .with_max_iterations(200)
        .with_seed(77);
    assert_eq!(detect_all(&points, &params), detect_all(&points, &params));
}

#[test]
fn cancelled_run_returns_nothing() {
    let mut points = Vec::new();
    for i in 0..20 {
        for j in 0..20 {
            points.push(Point3::new(i as f64 * 0.1, j as f64 * 0.1, 0.0));
        }
    }
    let cancel = CancelToken::new();
    cancel.cancel();

    let mut rng = StdRng::seed_from_u64(0);
    let primitives =
        detect_all_with_cancel(&points, &DetectionParams::default(), &mut rng, &cancel);
    assert!(primitives.is_empty());
}

#[test]
fn results_serialize_with_type_tag() {
    let mut points = Vec::new();
    for i in 0..15 {
        for j in 0..15 {
            points.push(Point3::new(i as f64 * 0.1, j as f64 * 0.1, 2.0));
        }
    }
    let params = DetectionParams::default()
        .with_cylinders(false)
        .with_seed(1);
    let primitives = detect_all(&points, &params);
    assert_eq!(primitives.len(), 1);

    let json = serde_json::to_value(&primitives).unwrap();
    assert_eq!(json[0]["type"], "plane");
    assert_eq!(json[0]["inliers"].as_array().unwrap().len(), 225);
    assert_relative_eq!(json[0]["confidence"].as_f64().unwrap(), 1.0);
}
