//! Coefficient fields of the control-point grid.
//!
//! One scalar field per output dimension, stored block-major in a single
//! buffer: all coefficients of dimension 0, then dimension 1, and so on. The
//! buffer is exactly the parameter vector.

use crate::error::{Result, TransformError};

/// Scalar coefficient fields addressed by `(output dimension, flat grid index)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoefficientStore {
    dimension: usize,
    points: usize,
    data: Option<Vec<f64>>,
}

impl CoefficientStore {
    /// An unset store for `dimension` fields of `points` entries each.
    pub fn new(dimension: usize, points: usize) -> Self {
        Self {
            dimension,
            points,
            data: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Entries per field.
    pub fn points_per_field(&self) -> usize {
        self.points
    }

    /// Length of the parameter vector, `dimension * points`.
    pub fn number_of_parameters(&self) -> usize {
        self.dimension * self.points
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// Replace all coefficients from a block-major parameter vector.
    pub fn set_from_parameter_vector(&mut self, params: &[f64]) -> Result<()> {
        let expected = self.number_of_parameters();
        if params.len() != expected {
            return Err(TransformError::length_mismatch(expected, params.len()));
        }
        match &mut self.data {
            Some(data) => data.copy_from_slice(params),
            None => self.data = Some(params.to_vec()),
        }
        Ok(())
    }

    /// Set every coefficient to zero (identity displacement).
    pub fn set_zero(&mut self) {
        self.data = Some(vec![0.0; self.number_of_parameters()]);
    }

    /// Copy of the block-major parameter vector.
    pub fn to_parameter_vector(&self) -> Result<Vec<f64>> {
        Ok(self.data()?.to_vec())
    }

    /// Coefficient of `dim` at `flat`.
    ///
    /// # Errors
    /// `IndexOutOfRange` if `dim` or `flat` is out of range, `NotInitialized`
    /// before the coefficients are set.
    pub fn value_at(&self, dim: usize, flat: usize) -> Result<f64> {
        let field = self.field(dim)?;
        field
            .get(flat)
            .copied()
            .ok_or_else(|| TransformError::index_out_of_range(flat, self.points))
    }

    /// The field of one output dimension.
    pub fn field(&self, dim: usize) -> Result<&[f64]> {
        if dim >= self.dimension {
            return Err(TransformError::index_out_of_range(dim, self.dimension));
        }
        let data = self.data()?;
        Ok(&data[dim * self.points..(dim + 1) * self.points])
    }

    /// All `D` fields at once.
    ///
    /// # Errors
    /// `LengthMismatch` if the store does not hold exactly `D` fields.
    pub fn fields<const D: usize>(&self) -> Result<[&[f64]; D]> {
        if D != self.dimension {
            return Err(TransformError::length_mismatch(self.dimension, D));
        }
        let data = self.data()?;
        let points = self.points;
        Ok(std::array::from_fn(|dim| &data[dim * points..(dim + 1) * points]))
    }

    fn data(&self) -> Result<&[f64]> {
        self.data
            .as_deref()
            .ok_or_else(|| TransformError::not_initialized("B-spline coefficients have not been set"))
    }
}
