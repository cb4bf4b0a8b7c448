//! Affine transform implementation.
//!
//! Represents a general affine transformation with a fixed center:
//! `T(x) = A(x - c) + c + t`
//!
//! where:
//! * `A` is a D×D matrix (rotation, scale, shear)
//! * `t` is the translation
//! * `c` is the fixed center of rotation/scaling
//!
//! Parameters are `A` row-major followed by `t`; the fixed parameters are `c`.

use nalgebra::{Const, Dyn, SMatrix};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::spatial::{zero_hessian, JacobianMatrix, Point, SpatialHessian, SpatialJacobian, TransformedPoint, Vector};
use super::jacobian::{SparseJacobian, SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian};
use super::trait_::AdvancedTransform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform<const D: usize> {
    matrix: SMatrix<f64, D, D>,
    translation: Vector<D>,
    center: Point<D>,
}

impl<const D: usize> AffineTransform<D> {
    pub fn new(matrix: SMatrix<f64, D, D>, translation: Vector<D>, center: Point<D>) -> Self {
        Self {
            matrix,
            translation,
            center,
        }
    }

    /// Identity transform about `center`.
    pub fn identity(center: Point<D>) -> Self {
        Self::new(SMatrix::<f64, D, D>::identity(), Vector::<D>::zeros(), center)
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    pub fn translation(&self) -> &Vector<D> {
        &self.translation
    }

    pub fn center(&self) -> &Point<D> {
        &self.center
    }

    fn parameter_count() -> usize {
        D * D + D
    }
}

impl<const D: usize> AdvancedTransform<D> for AffineTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        let mapped = self.matrix * (*point - self.center) + self.center.coords + self.translation;
        Ok(TransformedPoint::inside(Point::from(mapped)))
    }

    fn sparse_jacobian(&self, point: &Point<D>) -> Result<SparseJacobian<D>> {
        // ∂T_i/∂A_ij = (x - c)_j, ∂T_i/∂t_i = 1
        let centered = *point - self.center;
        let count = Self::parameter_count();
        let mut values = JacobianMatrix::<D>::zeros_generic(Const::<D>, Dyn(count));
        for i in 0..D {
            for j in 0..D {
                values[(i, i * D + j)] = centered[j];
            }
            values[(i, D * D + i)] = 1.0;
        }
        Ok(SparseJacobian {
            values,
            indices: (0..count).collect(),
        })
    }

    fn spatial_jacobian(&self, _point: &Point<D>) -> Result<SpatialJacobian<D>> {
        Ok(self.matrix)
    }

    fn spatial_hessian(&self, _point: &Point<D>) -> Result<SpatialHessian<D>> {
        Ok(zero_hessian())
    }

    fn sparse_jacobian_of_spatial_jacobian(&self, _point: &Point<D>) -> Result<SparseJacobianOfSpatialJacobian<D>> {
        let count = Self::parameter_count();
        let mut matrices = vec![SMatrix::<f64, D, D>::zeros(); count];
        for (k, m) in matrices.iter_mut().take(D * D).enumerate() {
            m[(k / D, k % D)] = 1.0;
        }
        Ok(SparseJacobianOfSpatialJacobian {
            spatial_jacobian: self.matrix,
            matrices,
            indices: (0..count).collect(),
        })
    }

    fn sparse_jacobian_of_spatial_hessian(&self, _point: &Point<D>) -> Result<SparseJacobianOfSpatialHessian<D>> {
        let count = Self::parameter_count();
        Ok(SparseJacobianOfSpatialHessian {
            spatial_hessian: zero_hessian(),
            matrices: vec![zero_hessian(); count],
            indices: (0..count).collect(),
        })
    }

    fn number_of_nonzero_parameters(&self) -> usize {
        Self::parameter_count()
    }

    fn number_of_parameters(&self) -> usize {
        Self::parameter_count()
    }

    fn parameters(&self) -> Result<Vec<f64>> {
        let mut params = Vec::with_capacity(Self::parameter_count());
        for row in 0..D {
            for col in 0..D {
                params.push(self.matrix[(row, col)]);
            }
        }
        params.extend(self.translation.iter());
        Ok(params)
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        let expected = Self::parameter_count();
        if params.len() != expected {
            return Err(TransformError::length_mismatch(expected, params.len()));
        }
        self.matrix = SMatrix::<f64, D, D>::from_row_slice(&params[..D * D]);
        self.translation = Vector::<D>::from_column_slice(&params[D * D..]);
        Ok(())
    }

    fn fixed_parameters(&self) -> Result<Vec<f64>> {
        Ok(self.center.coords.iter().copied().collect())
    }

    fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()> {
        if params.len() != D {
            return Err(TransformError::length_mismatch(D, params.len()));
        }
        self.center = Point::<D>::from_slice(params);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AffineTransform<2> {
        AffineTransform::new(
            SMatrix::<f64, 2, 2>::new(1.1, 0.2, -0.3, 0.9),
            Vector::<2>::new(2.0, -1.0),
            Point::<2>::new(5.0, 5.0),
        )
    }

    #[test]
    fn test_affine_transform_identity() {
        let transform = AffineTransform::<3>::identity(Point::<3>::new(1.0, 2.0, 3.0));
        let p = Point::<3>::new(4.0, 5.0, 6.0);
        assert_eq!(transform.transform_point(&p).unwrap().point, p);
    }

    #[test]
    fn test_affine_center_is_fixed_point() {
        let mut transform = sample();
        transform.set_parameters(&[1.1, 0.2, -0.3, 0.9, 0.0, 0.0]).unwrap();
        let mapped = transform.transform_point(&Point::<2>::new(5.0, 5.0)).unwrap();
        assert!((mapped.point - Point::<2>::new(5.0, 5.0)).norm() < 1e-12);
    }

    #[test]
    fn test_affine_jacobian_reconstructs_transform() {
        // T is linear in the parameters: T(x; p) = J(x) p + c
        let transform = sample();
        let p = Point::<2>::new(1.5, -2.0);
        let jacobian = transform.sparse_jacobian(&p).unwrap();
        let params = transform.parameters().unwrap();
        let linear = &jacobian.values * nalgebra::DVector::from_vec(params);
        let mapped = transform.transform_point(&p).unwrap().point;
        for i in 0..2 {
            assert!((linear[i] + transform.center()[i] - mapped[i]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_affine_parameters_row_major() {
        let transform = sample();
        let params = transform.parameters().unwrap();
        assert_eq!(params, vec![1.1, 0.2, -0.3, 0.9, 2.0, -1.0]);

        let mut copy = AffineTransform::<2>::identity(Point::<2>::origin());
        copy.set_parameters(&params).unwrap();
        copy.set_fixed_parameters(&transform.fixed_parameters().unwrap()).unwrap();
        assert_eq!(copy, transform);
    }

    #[test]
    fn test_affine_jacobian_of_spatial_jacobian() {
        let transform = sample();
        let jsj = transform
            .sparse_jacobian_of_spatial_jacobian(&Point::<2>::origin())
            .unwrap();
        assert_eq!(jsj.matrices.len(), 6);
        assert_eq!(jsj.matrices[1][(0, 1)], 1.0);
        assert_eq!(jsj.matrices[2][(1, 0)], 1.0);
        assert_eq!(jsj.matrices[4], SMatrix::<f64, 2, 2>::zeros());
        assert_eq!(jsj.spatial_jacobian, *transform.matrix());
    }

    #[test]
    fn test_affine_serde_roundtrip() {
        let transform = sample();
        let json = serde_json::to_string(&transform).unwrap();
        let parsed: AffineTransform<2> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, transform);
        let p = Point::<2>::new(-3.0, 0.5);
        assert_eq!(parsed.transform_point(&p).unwrap(), transform.transform_point(&p).unwrap());
    }
}
