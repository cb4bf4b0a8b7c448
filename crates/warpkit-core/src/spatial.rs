//! Spatial types shared by every transform.
//!
//! Thin aliases over nalgebra, so all nalgebra operations stay available.

use nalgebra::{Const, Dyn, OMatrix, Point as NaPoint, SMatrix, SVector};
use serde::{Deserialize, Serialize};

pub type Point<const D: usize> = NaPoint<f64, D>;
pub type Vector<const D: usize> = SVector<f64, D>;
pub type Spacing<const D: usize> = SVector<f64, D>;
pub type Direction<const D: usize> = SMatrix<f64, D, D>;

/// `∂T_i/∂x_j` of a transform at a point.
pub type SpatialJacobian<const D: usize> = SMatrix<f64, D, D>;

/// One symmetric `∂²T_i/∂x_j∂x_k` matrix per output dimension `i`.
pub type SpatialHessian<const D: usize> = [SMatrix<f64, D, D>; D];

/// `D` rows, one column per nonzero parameter (or support index).
pub type JacobianMatrix<const D: usize> = OMatrix<f64, Const<D>, Dyn>;

// Common aliases
pub type Point2 = Point<2>;
pub type Point3 = Point<3>;
pub type Vector2 = Vector<2>;
pub type Vector3 = Vector<3>;
pub type Spacing3 = Spacing<3>;
pub type Direction3 = Direction<3>;

/// A point together with the support flag of the transform that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformedPoint<const D: usize> {
    /// Mapped point, or the input point unchanged when `inside` is false.
    pub point: Point<D>,
    /// Whether the input point had a complete control-point window.
    pub inside: bool,
}

impl<const D: usize> TransformedPoint<D> {
    pub fn inside(point: Point<D>) -> Self {
        Self { point, inside: true }
    }

    pub fn outside(point: Point<D>) -> Self {
        Self {
            point,
            inside: false,
        }
    }
}

/// An all-zero spatial Hessian.
pub fn zero_hessian<const D: usize>() -> SpatialHessian<D> {
    [SMatrix::<f64, D, D>::zeros(); D]
}
