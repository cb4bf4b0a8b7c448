//! Recursive engine versus brute-force evaluation over dimensions 2 to 4,
//! spline orders 0 to 5, and oblique grids.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use warpkit_core::spatial::{Direction, Point, Spacing};
use warpkit_core::{BSplineTransform, GridGeometry, ReferenceEvaluator};

fn random_transform<const D: usize>(rng: &mut StdRng, order: usize, size: usize) -> BSplineTransform<D> {
    let origin = Point::<D>::from(nalgebra::SVector::<f64, D>::from_fn(|_, _| rng.gen_range(-50.0..50.0)));
    let spacing = Spacing::<D>::from_fn(|_, _| rng.gen_range(0.5..3.0));
    // Near-identity shear keeps the grid oblique but well conditioned.
    let direction = Direction::<D>::from_fn(|r, c| {
        let base = if r == c { 1.0 } else { 0.0 };
        base + rng.gen_range(-0.2..0.2)
    });
    let geometry = GridGeometry::new([size; D], origin, spacing, direction).unwrap();
    let mut transform = BSplineTransform::with_geometry(order, geometry).unwrap();
    let params: Vec<f64> = (0..transform.number_of_parameters())
        .map(|_| rng.gen_range(-5.0..5.0))
        .collect();
    transform.set_parameters(&params).unwrap();
    transform
}

fn random_inside_point<const D: usize>(rng: &mut StdRng, transform: &BSplineTransform<D>) -> Point<D> {
    let geometry = transform.geometry().unwrap();
    let shift = transform.kernel().window_offset();
    let order = transform.spline_order() as f64;
    let size = geometry.size();
    let index = Point::<D>::from(nalgebra::SVector::<f64, D>::from_fn(|a, _| {
        let low = shift + 0.01;
        let high = size[a] as f64 - order + shift - 0.01;
        rng.gen_range(low..high)
    }));
    geometry.continuous_index_to_physical(&index)
}

fn assert_close(a: f64, b: f64, context: &str) {
    assert!(
        (a - b).abs() <= 1e-10 * b.abs().max(1.0),
        "{}: {} vs {}",
        context,
        a,
        b
    );
}

fn check_equivalence<const D: usize>(seed: u64, size: usize) {
    let mut rng = StdRng::seed_from_u64(seed);
    for order in 0..=5 {
        let transform = random_transform::<D>(&mut rng, order, size);
        let reference = ReferenceEvaluator::new(&transform).unwrap();

        for _ in 0..5 {
            let p = random_inside_point(&mut rng, &transform);
            let context = format!("D={} order={} point={:?}", D, order, p.coords.as_slice());

            let fast = transform.transform_point(&p).unwrap();
            let slow = reference.transform_point(&p).unwrap();
            assert!(fast.inside, "{}", context);
            for a in 0..D {
                assert_close(fast.point[a], slow.point[a], &context);
            }

            let fast = transform.jacobian(&p).unwrap();
            let slow = reference.jacobian(&p).unwrap();
            assert_eq!(fast.support, slow.support, "{}", context);
            assert_eq!(fast.len(), (order + 1).pow(D as u32));
            for j in 0..fast.len() {
                assert_close(fast.weight(j), slow.weight(j), &context);
            }

            let fast = transform.spatial_jacobian(&p).unwrap();
            let slow = reference.spatial_jacobian(&p).unwrap();
            for (x, y) in fast.iter().zip(slow.iter()) {
                assert_close(*x, *y, &context);
            }

            let fast = transform.spatial_hessian(&p).unwrap();
            let slow = reference.spatial_hessian(&p).unwrap();
            for d in 0..D {
                for (x, y) in fast[d].iter().zip(slow[d].iter()) {
                    assert_close(*x, *y, &context);
                }
            }
        }
    }
}

#[test]
fn test_equivalence_2d() {
    check_equivalence::<2>(11, 10);
}

#[test]
fn test_equivalence_3d() {
    check_equivalence::<3>(23, 8);
}

#[test]
fn test_equivalence_4d() {
    check_equivalence::<4>(37, 7);
}

#[test]
fn test_dense_weights_match_compact_jacobian() {
    let mut rng = StdRng::seed_from_u64(5);
    let transform = random_transform::<3>(&mut rng, 3, 9);
    let reference = ReferenceEvaluator::new(&transform).unwrap();
    let p = random_inside_point(&mut rng, &transform);

    let dense = reference.dense_weights(&p).unwrap();
    let compact = transform.jacobian(&p).unwrap();
    for (j, &flat) in compact.support.iter().enumerate() {
        assert_close(compact.weight(j), dense[flat], "support weight");
    }
    let outside: f64 = dense
        .iter()
        .enumerate()
        .filter(|(flat, _)| !compact.support.contains(flat))
        .map(|(_, w)| w.abs())
        .sum();
    assert!(outside < 1e-15);
}
