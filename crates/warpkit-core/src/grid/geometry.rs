//! Control-point lattice geometry.
//!
//! Maps between physical space and the continuous index space of the
//! coefficient grid:
//! - `point = origin + Direction * (index * spacing)`
//! - `index = (Direction * diag(spacing))^-1 * (point - origin)`
//!
//! Grid indices are flattened with axis 0 fastest.

use nalgebra::SMatrix;

use crate::error::{Result, TransformError};
use crate::kernel::MAX_DIMENSION;
use crate::spatial::{Direction, Point, Spacing};

/// Relative threshold below which the index-to-physical matrix is singular.
const SINGULARITY_TOLERANCE: f64 = 1e-12;

/// Immutable description of a control-point grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridGeometry<const D: usize> {
    size: [usize; D],
    origin: Point<D>,
    spacing: Spacing<D>,
    direction: Direction<D>,
    strides: [usize; D],
    number_of_points: usize,
    /// `Direction * diag(spacing)`
    index_to_physical: SMatrix<f64, D, D>,
    /// Inverse of `index_to_physical`.
    physical_to_index: SMatrix<f64, D, D>,
}

impl<const D: usize> GridGeometry<D> {
    /// Create and validate a grid geometry.
    ///
    /// # Errors
    /// `InvalidConfiguration` for an unsupported dimension, `Geometry` for an
    /// empty axis, a point or parameter count that overflows `usize`, a
    /// non-finite origin, non-positive spacing, or a singular direction matrix.
    pub fn new(
        size: [usize; D],
        origin: Point<D>,
        spacing: Spacing<D>,
        direction: Direction<D>,
    ) -> Result<Self> {
        if !(2..=MAX_DIMENSION).contains(&D) {
            return Err(TransformError::invalid_configuration(format!(
                "grid dimension {} is not supported (expected 2 to {})",
                D, MAX_DIMENSION
            )));
        }

        let mut strides = [0usize; D];
        let mut number_of_points = 1usize;
        for axis in 0..D {
            if size[axis] == 0 {
                return Err(TransformError::geometry(format!(
                    "grid size along axis {} is zero",
                    axis
                )));
            }
            strides[axis] = number_of_points;
            number_of_points = number_of_points.checked_mul(size[axis]).ok_or_else(|| {
                TransformError::geometry(format!("grid size {:?} overflows", size))
            })?;
        }
        // One coefficient per point and output dimension.
        if number_of_points.checked_mul(D).is_none() {
            return Err(TransformError::geometry(format!(
                "grid size {:?} overflows the parameter count",
                size
            )));
        }

        if origin.coords.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::geometry("origin is not finite"));
        }
        for axis in 0..D {
            let s = spacing[axis];
            if !s.is_finite() || s <= 0.0 {
                return Err(TransformError::geometry(format!(
                    "spacing along axis {} must be finite and positive, got {}",
                    axis, s
                )));
            }
        }
        if direction.iter().any(|v| !v.is_finite()) {
            return Err(TransformError::geometry("direction matrix is not finite"));
        }

        let index_to_physical = direction * SMatrix::<f64, D, D>::from_diagonal(&spacing);

        // Compare the determinant with the Hadamard bound so the check is scale free.
        let bound: f64 = index_to_physical.column_iter().map(|c| c.norm()).product();
        let det = determinant(&index_to_physical);
        if !det.is_finite() || det.abs() <= SINGULARITY_TOLERANCE * bound {
            return Err(TransformError::geometry(format!(
                "direction matrix is singular (determinant {})",
                det
            )));
        }
        let physical_to_index = index_to_physical
            .try_inverse()
            .filter(|m| m.iter().all(|v| v.is_finite()))
            .ok_or_else(|| TransformError::geometry("direction matrix is not invertible"))?;

        Ok(Self {
            size,
            origin,
            spacing,
            direction,
            strides,
            number_of_points,
            index_to_physical,
            physical_to_index,
        })
    }

    /// Axis-aligned geometry with identity direction.
    pub fn axis_aligned(size: [usize; D], origin: Point<D>, spacing: Spacing<D>) -> Result<Self> {
        Self::new(size, origin, spacing, Direction::<D>::identity())
    }

    /// Number of fixed parameters for dimension `D`.
    pub const fn number_of_fixed_parameters() -> usize {
        D * (3 + D)
    }

    /// Parse the fixed-parameter layout: sizes, origin, spacing, direction (row-major).
    pub fn from_fixed_parameters(params: &[f64]) -> Result<Self> {
        let expected = Self::number_of_fixed_parameters();
        if params.len() != expected {
            return Err(TransformError::length_mismatch(expected, params.len()));
        }

        let mut size = [0usize; D];
        for (axis, &value) in params[..D].iter().enumerate() {
            if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
                return Err(TransformError::geometry(format!(
                    "grid size along axis {} must be a positive integer, got {}",
                    axis, value
                )));
            }
            size[axis] = value as usize;
        }
        let origin = Point::<D>::from_slice(&params[D..2 * D]);
        let spacing = Spacing::<D>::from_column_slice(&params[2 * D..3 * D]);
        let direction = Direction::<D>::from_row_slice(&params[3 * D..]);

        Self::new(size, origin, spacing, direction)
    }

    /// Serialize to the fixed-parameter layout.
    pub fn to_fixed_parameters(&self) -> Vec<f64> {
        let mut params = Vec::with_capacity(Self::number_of_fixed_parameters());
        params.extend(self.size.iter().map(|&s| s as f64));
        params.extend(self.origin.coords.iter());
        params.extend(self.spacing.iter());
        for row in 0..D {
            for col in 0..D {
                params.push(self.direction[(row, col)]);
            }
        }
        params
    }

    /// Check that every axis holds at least `order + 1` control points.
    pub fn validate_for_order(&self, order: usize) -> Result<()> {
        for axis in 0..D {
            if self.size[axis] < order + 1 {
                return Err(TransformError::geometry(format!(
                    "grid size {} along axis {} is too small for spline order {}",
                    self.size[axis], axis, order
                )));
            }
        }
        Ok(())
    }

    pub fn size(&self) -> [usize; D] {
        self.size
    }

    pub fn origin(&self) -> &Point<D> {
        &self.origin
    }

    pub fn spacing(&self) -> &Spacing<D> {
        &self.spacing
    }

    pub fn direction(&self) -> &Direction<D> {
        &self.direction
    }

    /// Flat-index stride of each axis (axis 0 fastest).
    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    /// Total number of control points.
    pub fn number_of_points(&self) -> usize {
        self.number_of_points
    }

    /// `Direction * diag(spacing)`.
    pub fn index_to_physical_matrix(&self) -> &SMatrix<f64, D, D> {
        &self.index_to_physical
    }

    /// `∂index_a / ∂x_k`, used for chain-ruling index-space derivatives.
    pub fn physical_to_index_matrix(&self) -> &SMatrix<f64, D, D> {
        &self.physical_to_index
    }

    /// Convert a physical point to a continuous grid index.
    pub fn physical_to_continuous_index(&self, point: &Point<D>) -> Point<D> {
        Point::from(self.physical_to_index * (point.coords - self.origin.coords))
    }

    /// Convert a continuous grid index to a physical point.
    pub fn continuous_index_to_physical(&self, index: &Point<D>) -> Point<D> {
        self.origin + self.index_to_physical * index.coords
    }

    /// Flat index of a grid index.
    pub fn flat_index(&self, index: &[usize; D]) -> usize {
        index
            .iter()
            .zip(self.strides.iter())
            .map(|(i, s)| i * s)
            .sum()
    }

    /// Grid index of a flat index.
    pub fn grid_index(&self, flat: usize) -> [usize; D] {
        let mut rest = flat;
        let mut index = [0usize; D];
        for axis in 0..D {
            index[axis] = rest % self.size[axis];
            rest /= self.size[axis];
        }
        index
    }
}

/// Determinant by Gaussian elimination with partial pivoting.
///
/// nalgebra only offers `determinant` for dimensions with a known minimum, which
/// a generic `D` does not have.
fn determinant<const D: usize>(matrix: &SMatrix<f64, D, D>) -> f64 {
    let mut m = *matrix;
    let mut det = 1.0;

    for i in 0..D {
        let mut pivot_idx = i;
        let mut pivot_val = m[(i, i)].abs();
        for k in (i + 1)..D {
            let val = m[(k, i)].abs();
            if val > pivot_val {
                pivot_val = val;
                pivot_idx = k;
            }
        }

        if pivot_val == 0.0 {
            return 0.0;
        }
        if pivot_idx != i {
            m.swap_rows(i, pivot_idx);
            det = -det;
        }

        det *= m[(i, i)];
        for j in (i + 1)..D {
            let factor = m[(j, i)] / m[(i, i)];
            for k in i..D {
                m[(j, k)] -= factor * m[(i, k)];
            }
        }
    }

    det
}
