//! Brute-force B-spline evaluation.
//!
//! Evaluates every quantity straight from the tensor-product definition:
//! a flat loop over the control-point neighbourhood of the point, with the
//! centered kernel `β_n(c_a - i_a)` evaluated per axis and per neighbour.
//! No shared weight tables and no recursion, so it serves as an independent
//! check of [`BSplineTransform`](super::BSplineTransform).

use nalgebra::SMatrix;

use crate::error::{Result, TransformError};
use crate::grid::{CoefficientStore, GridGeometry};
use crate::kernel::{BSplineKernel, SupportRegion};
use crate::spatial::{Point, SpatialHessian, SpatialJacobian, TransformedPoint, Vector};
use super::bspline::BSplineTransform;
use super::jacobian::ParameterJacobian;

/// Per-neighbour kernel values: value, first and second derivative.
type KernelSample = (usize, [f64; 3]);

/// Slow reference evaluator borrowing the state of a B-spline transform.
#[derive(Debug, Clone, Copy)]
pub struct ReferenceEvaluator<'a, const D: usize> {
    kernel: BSplineKernel,
    geometry: &'a GridGeometry<D>,
    coefficients: &'a CoefficientStore,
}

impl<'a, const D: usize> ReferenceEvaluator<'a, D> {
    /// # Errors
    /// `NotInitialized` if the transform has no grid.
    pub fn new(transform: &'a BSplineTransform<D>) -> Result<Self> {
        Ok(Self {
            kernel: *transform.kernel(),
            geometry: transform.geometry()?,
            coefficients: transform.coefficients(),
        })
    }

    /// Displacement `u(x)`.
    pub fn displacement(&self, point: &Point<D>) -> Result<Vector<D>> {
        let fields = self.coefficients.fields::<D>()?;
        let mut out = Vector::<D>::zeros();
        self.visit(point, |flat, weight, _, _| {
            for d in 0..D {
                out[d] += weight * fields[d][flat];
            }
        })?;
        Ok(out)
    }

    /// Same contract as `BSplineTransform::transform_point`.
    pub fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        match self.displacement(point) {
            Ok(u) => Ok(TransformedPoint::inside(*point + u)),
            Err(err) if err.is_out_of_support() => Ok(TransformedPoint::outside(*point)),
            Err(err) => Err(err),
        }
    }

    /// Weight of every control point, zero outside the neighbourhood.
    pub fn dense_weights(&self, point: &Point<D>) -> Result<Vec<f64>> {
        let mut dense = vec![0.0; self.geometry.number_of_points()];
        self.visit(point, |flat, weight, _, _| dense[flat] += weight)?;
        Ok(dense)
    }

    /// Compact parameter Jacobian gathered from the dense weights.
    pub fn jacobian(&self, point: &Point<D>) -> Result<ParameterJacobian<D>> {
        let dense = self.dense_weights(point)?;
        let support = SupportRegion::locate(point, self.geometry, &self.kernel).indices();
        let values: Vec<f64> = support.iter().map(|&flat| dense[flat]).collect();
        Ok(ParameterJacobian::from_weights(&values, support))
    }

    pub fn spatial_jacobian(&self, point: &Point<D>) -> Result<SpatialJacobian<D>> {
        let fields = self.coefficients.fields::<D>()?;
        let mut gradient = SMatrix::<f64, D, D>::zeros();
        self.visit(point, |flat, _, grad, _| {
            for d in 0..D {
                for a in 0..D {
                    gradient[(d, a)] += grad[a] * fields[d][flat];
                }
            }
        })?;
        let p = self.geometry.physical_to_index_matrix();
        Ok(SpatialJacobian::<D>::identity() + gradient * p)
    }

    pub fn spatial_hessian(&self, point: &Point<D>) -> Result<SpatialHessian<D>> {
        let fields = self.coefficients.fields::<D>()?;
        let mut hessian = [SMatrix::<f64, D, D>::zeros(); D];
        self.visit(point, |flat, _, _, hess| {
            for d in 0..D {
                let c = fields[d][flat];
                for a in 0..D {
                    for b in 0..D {
                        hessian[d][(a, b)] += hess[a][b] * c;
                    }
                }
            }
        })?;
        let p = self.geometry.physical_to_index_matrix();
        Ok(hessian.map(|h| p.transpose() * h * p))
    }

    /// Call `visit(flat, weight, index gradient, index Hessian)` for every
    /// control point within the kernel radius of `point`.
    fn visit<F>(&self, point: &Point<D>, mut visit: F) -> Result<()>
    where
        F: FnMut(usize, f64, &[f64; D], &[[f64; D]; D]),
    {
        if !SupportRegion::locate(point, self.geometry, &self.kernel).is_inside() {
            return Err(TransformError::out_of_support(point.coords.as_slice()));
        }

        let index = self.geometry.physical_to_continuous_index(point);
        let size = self.geometry.size();
        let strides = self.geometry.strides();
        let radius = (self.kernel.order() as f64 + 1.0) / 2.0;
        let axes: [Vec<KernelSample>; D] = std::array::from_fn(|a| {
            let c = index[a];
            let first = (c - radius).ceil().max(0.0) as usize;
            let last = ((c + radius).floor() as usize).min(size[a] - 1);
            (first..=last)
                .map(|i| {
                    let x = c - i as f64;
                    (i, self.kernel.derivatives_at(x))
                })
                .collect()
        });

        let mut cursor = [0usize; D];
        loop {
            let mut flat = 0;
            let mut weight = 1.0;
            let mut gradient = [1.0; D];
            let mut hessian = [[1.0; D]; D];
            for a in 0..D {
                let (i, samples) = axes[a][cursor[a]];
                flat += i * strides[a];
                weight *= samples[0];
                for (g, value) in gradient.iter_mut().enumerate() {
                    *value *= samples[(g == a) as usize];
                }
                for (r, row) in hessian.iter_mut().enumerate() {
                    for (s, value) in row.iter_mut().enumerate() {
                        *value *= samples[(r == a) as usize + (s == a) as usize];
                    }
                }
            }
            visit(flat, weight, &gradient, &hessian);

            let mut axis = 0;
            loop {
                if axis == D {
                    return Ok(());
                }
                cursor[axis] += 1;
                if cursor[axis] < axes[axis].len() {
                    break;
                }
                cursor[axis] = 0;
                axis += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing;

    fn transform_2d(order: usize) -> BSplineTransform<2> {
        let geometry = GridGeometry::axis_aligned(
            [9, 11],
            Point::<2>::new(1.0, -4.0),
            Spacing::<2>::new(1.25, 0.8),
        )
        .unwrap();
        let mut transform = BSplineTransform::with_geometry(order, geometry).unwrap();
        let params: Vec<f64> = (0..transform.number_of_parameters())
            .map(|k| ((k * 37 % 101) as f64 - 50.0) / 25.0)
            .collect();
        transform.set_parameters(&params).unwrap();
        transform
    }

    #[test]
    fn test_dense_weights_sum_to_one() {
        let transform = transform_2d(3);
        let reference = ReferenceEvaluator::new(&transform).unwrap();
        let weights = reference.dense_weights(&Point::<2>::new(5.3, 0.1)).unwrap();
        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        assert_eq!(weights.iter().filter(|&&w| w != 0.0).count(), 16);
    }

    #[test]
    fn test_matches_recursive_engine() {
        for order in 1..=4 {
            let transform = transform_2d(order);
            let reference = ReferenceEvaluator::new(&transform).unwrap();
            let p = Point::<2>::new(5.3, 0.1);

            let fast = transform.transform_point(&p).unwrap().point;
            let slow = reference.transform_point(&p).unwrap().point;
            assert!((fast - slow).norm() < 1e-10, "order {}", order);

            let fast = transform.spatial_jacobian(&p).unwrap();
            let slow = reference.spatial_jacobian(&p).unwrap();
            assert!((fast - slow).norm() < 1e-10, "order {}", order);

            let fast = transform.spatial_hessian(&p).unwrap();
            let slow = reference.spatial_hessian(&p).unwrap();
            for d in 0..2 {
                assert!((fast[d] - slow[d]).norm() < 1e-10, "order {}", order);
            }

            assert_eq!(transform.jacobian(&p).unwrap().support, reference.jacobian(&p).unwrap().support);
        }
    }

    #[test]
    fn test_outside_point() {
        let transform = transform_2d(3);
        let reference = ReferenceEvaluator::new(&transform).unwrap();
        let far = Point::<2>::new(-20.0, 0.0);
        assert!(!reference.transform_point(&far).unwrap().inside);
        assert!(reference.displacement(&far).unwrap_err().is_out_of_support());
    }
}
