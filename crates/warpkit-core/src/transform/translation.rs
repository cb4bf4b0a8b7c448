//! Translation transform implementation.
//!
//! `T(x) = x + t`. Parameters: the offset `t`. No fixed parameters.

use nalgebra::{Const, Dyn, SMatrix};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::spatial::{zero_hessian, JacobianMatrix, Point, SpatialHessian, SpatialJacobian, TransformedPoint, Vector};
use super::jacobian::{SparseJacobian, SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian};
use super::trait_::AdvancedTransform;

/// Translates points by a fixed offset vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationTransform<const D: usize> {
    offset: Vector<D>,
}

impl<const D: usize> TranslationTransform<D> {
    pub fn new(offset: Vector<D>) -> Self {
        Self { offset }
    }

    pub fn identity() -> Self {
        Self::new(Vector::<D>::zeros())
    }

    pub fn offset(&self) -> &Vector<D> {
        &self.offset
    }
}

impl<const D: usize> Default for TranslationTransform<D> {
    fn default() -> Self {
        Self::identity()
    }
}

impl<const D: usize> AdvancedTransform<D> for TranslationTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        Ok(TransformedPoint::inside(*point + self.offset))
    }

    fn sparse_jacobian(&self, _point: &Point<D>) -> Result<SparseJacobian<D>> {
        Ok(SparseJacobian {
            values: JacobianMatrix::<D>::identity_generic(Const::<D>, Dyn(D)),
            indices: (0..D).collect(),
        })
    }

    fn spatial_jacobian(&self, _point: &Point<D>) -> Result<SpatialJacobian<D>> {
        Ok(SpatialJacobian::<D>::identity())
    }

    fn spatial_hessian(&self, _point: &Point<D>) -> Result<SpatialHessian<D>> {
        Ok(zero_hessian())
    }

    fn sparse_jacobian_of_spatial_jacobian(&self, _point: &Point<D>) -> Result<SparseJacobianOfSpatialJacobian<D>> {
        Ok(SparseJacobianOfSpatialJacobian {
            spatial_jacobian: SpatialJacobian::<D>::identity(),
            matrices: vec![SMatrix::<f64, D, D>::zeros(); D],
            indices: (0..D).collect(),
        })
    }

    fn sparse_jacobian_of_spatial_hessian(&self, _point: &Point<D>) -> Result<SparseJacobianOfSpatialHessian<D>> {
        Ok(SparseJacobianOfSpatialHessian {
            spatial_hessian: zero_hessian(),
            matrices: vec![zero_hessian(); D],
            indices: (0..D).collect(),
        })
    }

    fn number_of_nonzero_parameters(&self) -> usize {
        D
    }

    fn number_of_parameters(&self) -> usize {
        D
    }

    fn parameters(&self) -> Result<Vec<f64>> {
        Ok(self.offset.iter().copied().collect())
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != D {
            return Err(TransformError::length_mismatch(D, params.len()));
        }
        self.offset = Vector::<D>::from_column_slice(params);
        Ok(())
    }

    fn fixed_parameters(&self) -> Result<Vec<f64>> {
        Ok(Vec::new())
    }

    fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()> {
        if !params.is_empty() {
            return Err(TransformError::length_mismatch(0, params.len()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_transform() {
        let transform = TranslationTransform::<3>::new(Vector::<3>::new(1.0, 2.0, 3.0));
        let mapped = transform.transform_point(&Point::<3>::new(1.0, 1.0, 1.0)).unwrap();
        assert!(mapped.inside);
        assert_eq!(mapped.point, Point::<3>::new(2.0, 3.0, 4.0));
    }

    #[test]
    fn test_translation_derivatives() {
        let transform = TranslationTransform::<2>::new(Vector::<2>::new(-1.0, 0.5));
        let p = Point::<2>::new(3.0, 4.0);
        let jacobian = transform.sparse_jacobian(&p).unwrap();
        assert_eq!(jacobian.indices, vec![0, 1]);
        assert_eq!(jacobian.values[(0, 0)], 1.0);
        assert_eq!(jacobian.values[(0, 1)], 0.0);
        assert_eq!(transform.spatial_jacobian(&p).unwrap(), SpatialJacobian::<2>::identity());
        assert_eq!(transform.sparse_jacobian_of_spatial_hessian(&p).unwrap().matrices.len(), 2);
    }

    #[test]
    fn test_translation_parameters() {
        let mut transform = TranslationTransform::<2>::identity();
        transform.set_parameters(&[4.0, -2.0]).unwrap();
        assert_eq!(transform.parameters().unwrap(), vec![4.0, -2.0]);
        assert!(matches!(
            transform.set_parameters(&[1.0]),
            Err(TransformError::LengthMismatch { expected: 2, actual: 1 })
        ));
        assert!(transform.set_fixed_parameters(&[]).is_ok());
        assert!(transform.set_fixed_parameters(&[1.0]).is_err());
    }

    #[test]
    fn test_translation_serde_roundtrip() {
        let transform = TranslationTransform::<2>::new(Vector::<2>::new(0.5, -7.0));
        let json = serde_json::to_string(&transform).unwrap();
        let parsed: TranslationTransform<2> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, transform);
    }
}
