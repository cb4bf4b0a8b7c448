//! Transform traits.
//!
//! [`AdvancedTransform`] is the capability set consumed by registration
//! metrics and optimizers: point mapping, spatial derivatives, and derivatives
//! with respect to the parameters in the general sparse layout.
//! [`TensorTransform`] maps a `[Batch, D]` burn tensor of points and is
//! available for every advanced transform.

use burn::tensor::backend::Backend;
use burn::tensor::{Tensor, TensorData};
use rayon::prelude::*;

use crate::error::{Result, TransformError};
use crate::spatial::{Point, SpatialHessian, SpatialJacobian, TransformedPoint};
use super::jacobian::{SparseJacobian, SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian};

/// Differentiable parametric transform of `D`-dimensional space.
///
/// Queries take `&self` and may run concurrently; parameter updates need
/// `&mut self`.
pub trait AdvancedTransform<const D: usize>: Send + Sync {
    /// Map a point. Transforms with a bounded support flag points outside it.
    fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>>;

    /// Map a batch of points in parallel, preserving order.
    fn transform_points(&self, points: &[Point<D>]) -> Result<Vec<TransformedPoint<D>>> {
        points.par_iter().map(|p| self.transform_point(p)).collect()
    }

    /// `∂T/∂p` over the nonzero parameters.
    fn sparse_jacobian(&self, point: &Point<D>) -> Result<SparseJacobian<D>>;

    fn spatial_jacobian(&self, point: &Point<D>) -> Result<SpatialJacobian<D>>;

    fn spatial_hessian(&self, point: &Point<D>) -> Result<SpatialHessian<D>>;

    fn sparse_jacobian_of_spatial_jacobian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialJacobian<D>>;

    fn sparse_jacobian_of_spatial_hessian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialHessian<D>>;

    /// Columns of [`sparse_jacobian`](Self::sparse_jacobian).
    fn number_of_nonzero_parameters(&self) -> usize;

    fn number_of_parameters(&self) -> usize;

    fn parameters(&self) -> Result<Vec<f64>>;

    fn set_parameters(&mut self, params: &[f64]) -> Result<()>;

    fn fixed_parameters(&self) -> Result<Vec<f64>>;

    fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()>;
}

/// Batch transform over burn tensors.
///
/// # Type Parameters
/// * `B` - The Burn backend
/// * `D` - The spatial dimensionality
pub trait TensorTransform<B: Backend, const D: usize> {
    /// Apply the transform to a `[Batch, D]` tensor of points.
    ///
    /// Points outside a bounded support come back unchanged.
    fn transform_tensor(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>>;
}

impl<B: Backend, const D: usize, T: AdvancedTransform<D>> TensorTransform<B, D> for T {
    fn transform_tensor(&self, points: Tensor<B, 2>) -> Result<Tensor<B, 2>> {
        let [batch, dim] = points.dims();
        if dim != D {
            return Err(TransformError::length_mismatch(D, dim));
        }
        let device = points.device();

        let values: Vec<f64> = points.into_data().iter::<f64>().collect();
        let input: Vec<Point<D>> = values.chunks_exact(D).map(Point::<D>::from_slice).collect();
        let mapped = self.transform_points(&input)?;

        let out: Vec<f64> = mapped
            .iter()
            .flat_map(|t| t.point.coords.iter().copied())
            .collect();
        let data = TensorData::new(out, [batch, D]).convert::<B::FloatElem>();
        Ok(Tensor::from_data(data, &device))
    }
}
