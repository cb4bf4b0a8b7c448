//! Parameter-derivative containers.
//!
//! Two layouts exist:
//!
//! - **Compact** (B-spline only): one column per support point. The weight
//!   matrix is shared by all output dimensions, because `T_i` depends on
//!   coefficient `c_{d, j}` only when `d == i`, with derivative `w_j`.
//! - **Sparse** (every transform): one column per nonzero parameter, with the
//!   global parameter index of each column. The compact B-spline layout expands
//!   to it with columns ordered block-major, `d * N + support[j]`.

use nalgebra::{Const, Dyn, SMatrix};

use crate::spatial::{JacobianMatrix, SpatialHessian, SpatialJacobian};

/// `∂T/∂p` restricted to the nonzero parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobian<const D: usize> {
    /// `D × M` values.
    pub values: JacobianMatrix<D>,
    /// Global parameter index of each of the `M` columns.
    pub indices: Vec<usize>,
}

/// `∂(∂T/∂x)/∂p`, one matrix per nonzero parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobianOfSpatialJacobian<const D: usize> {
    pub spatial_jacobian: SpatialJacobian<D>,
    pub matrices: Vec<SpatialJacobian<D>>,
    pub indices: Vec<usize>,
}

/// `∂(∂²T/∂x²)/∂p`, one spatial Hessian per nonzero parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseJacobianOfSpatialHessian<const D: usize> {
    pub spatial_hessian: SpatialHessian<D>,
    pub matrices: Vec<SpatialHessian<D>>,
    pub indices: Vec<usize>,
}

/// Compact B-spline parameter Jacobian.
///
/// `values` is `D × NNZ`; every row holds the same tensor-product weights, so
/// `values[(i, j)] = ∂T_i/∂c_{i, support[j]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterJacobian<const D: usize> {
    pub values: JacobianMatrix<D>,
    /// Flat grid index of each column, in support order.
    pub support: Vec<usize>,
}

impl<const D: usize> ParameterJacobian<D> {
    /// Build from the support weights; each row is a copy.
    pub fn from_weights(weights: &[f64], support: Vec<usize>) -> Self {
        debug_assert_eq!(weights.len(), support.len());
        let values = JacobianMatrix::<D>::from_fn_generic(Const::<D>, Dyn(weights.len()), |_, j| weights[j]);
        Self { values, support }
    }

    /// Number of columns, `(order + 1)^D`.
    pub fn len(&self) -> usize {
        self.support.len()
    }

    pub fn is_empty(&self) -> bool {
        self.support.is_empty()
    }

    /// Weight of support point `j`.
    pub fn weight(&self, j: usize) -> f64 {
        self.values[(0, j)]
    }

    /// Expand to the `D × (D · NNZ)` layout over the global parameter vector.
    pub fn expand(&self, points_per_dimension: usize) -> SparseJacobian<D> {
        let nnz = self.len();
        let mut values = JacobianMatrix::<D>::zeros_generic(Const::<D>, Dyn(D * nnz));
        let mut indices = Vec::with_capacity(D * nnz);
        for d in 0..D {
            for (j, &flat) in self.support.iter().enumerate() {
                values[(d, d * nnz + j)] = self.values[(d, j)];
                indices.push(d * points_per_dimension + flat);
            }
        }
        SparseJacobian { values, indices }
    }
}

/// Compact Jacobian of the spatial Jacobian.
///
/// Matrix `j` holds the physical gradient of weight `j` in every row, so
/// `∂SJ[(i, k)]/∂c_{i, support[j]} = matrices[j][(i, k)]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianOfSpatialJacobian<const D: usize> {
    pub spatial_jacobian: SpatialJacobian<D>,
    pub matrices: Vec<SpatialJacobian<D>>,
    pub support: Vec<usize>,
}

impl<const D: usize> JacobianOfSpatialJacobian<D> {
    /// Expand to one matrix per global parameter: row `d` of the matrix for
    /// `c_{d, j}` is the gradient of weight `j`, other rows are zero.
    pub fn expand(&self, points_per_dimension: usize) -> SparseJacobianOfSpatialJacobian<D> {
        let nnz = self.support.len();
        let mut matrices = Vec::with_capacity(D * nnz);
        let mut indices = Vec::with_capacity(D * nnz);
        for d in 0..D {
            for (compact, &flat) in self.matrices.iter().zip(self.support.iter()) {
                let mut m = SMatrix::<f64, D, D>::zeros();
                m.set_row(d, &compact.row(d));
                matrices.push(m);
                indices.push(d * points_per_dimension + flat);
            }
        }
        SparseJacobianOfSpatialJacobian {
            spatial_jacobian: self.spatial_jacobian,
            matrices,
            indices,
        }
    }
}

/// Compact Jacobian of the spatial Hessian.
///
/// Matrix `j` is the physical Hessian of weight `j`, shared by all output
/// dimensions: `∂SH_i/∂c_{i, support[j]} = matrices[j]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobianOfSpatialHessian<const D: usize> {
    pub spatial_hessian: SpatialHessian<D>,
    pub matrices: Vec<SMatrix<f64, D, D>>,
    pub support: Vec<usize>,
}

impl<const D: usize> JacobianOfSpatialHessian<D> {
    /// Expand to one spatial Hessian per global parameter: for `c_{d, j}`,
    /// output dimension `d` gets the Hessian of weight `j`, the rest are zero.
    pub fn expand(&self, points_per_dimension: usize) -> SparseJacobianOfSpatialHessian<D> {
        let nnz = self.support.len();
        let mut matrices = Vec::with_capacity(D * nnz);
        let mut indices = Vec::with_capacity(D * nnz);
        for d in 0..D {
            for (compact, &flat) in self.matrices.iter().zip(self.support.iter()) {
                let mut hessian = [SMatrix::<f64, D, D>::zeros(); D];
                hessian[d] = *compact;
                matrices.push(hessian);
                indices.push(d * points_per_dimension + flat);
            }
        }
        SparseJacobianOfSpatialHessian {
            spatial_hessian: self.spatial_hessian,
            matrices,
            indices,
        }
    }
}
