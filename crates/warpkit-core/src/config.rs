//! Serializable transform descriptions.
//!
//! Dimension-agnostic (plain vectors) so one file format serves 2D, 3D and 4D;
//! `build::<D>()` checks every length against `D`.

use nalgebra::SMatrix;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TransformError};
use crate::grid::GridGeometry;
use crate::spatial::{Direction, Point, Spacing, Vector};
use crate::transform::{AffineTransform, BSplineTransform, TransformKind, TranslationTransform};

fn default_spline_order() -> usize {
    3
}

/// Configuration of a B-spline transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BSplineTransformConfig {
    /// Spline order, 0 to 5.
    #[serde(default = "default_spline_order")]
    pub spline_order: usize,
    /// Control points per axis.
    pub grid_size: Vec<usize>,
    /// Physical position of control point zero.
    pub origin: Vec<f64>,
    /// Control-point spacing per axis.
    pub spacing: Vec<f64>,
    /// Row-major direction matrix; identity when absent.
    #[serde(default)]
    pub direction: Option<Vec<f64>>,
    /// Warn on every point mapped outside the support.
    #[serde(default)]
    pub outside_diagnostics: bool,
}

impl BSplineTransformConfig {
    /// Cubic, axis-aligned grid.
    pub fn new(grid_size: Vec<usize>, origin: Vec<f64>, spacing: Vec<f64>) -> Self {
        Self {
            spline_order: default_spline_order(),
            grid_size,
            origin,
            spacing,
            direction: None,
            outside_diagnostics: false,
        }
    }

    pub fn with_spline_order(mut self, order: usize) -> Self {
        self.spline_order = order;
        self
    }

    /// Set the direction matrix (row-major).
    pub fn with_direction(mut self, direction: Vec<f64>) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_outside_diagnostics(mut self, enabled: bool) -> Self {
        self.outside_diagnostics = enabled;
        self
    }

    /// Validate and build the grid geometry.
    pub fn geometry<const D: usize>(&self) -> Result<GridGeometry<D>> {
        let size: [usize; D] = self
            .grid_size
            .as_slice()
            .try_into()
            .map_err(|_| wrong_length("grid_size", D, self.grid_size.len()))?;
        let origin = Point::<D>::from(vector::<D>("origin", &self.origin)?);
        let spacing: Spacing<D> = vector::<D>("spacing", &self.spacing)?;
        let direction = match &self.direction {
            Some(values) if values.len() == D * D => Direction::<D>::from_row_slice(values),
            Some(values) => return Err(wrong_length("direction", D * D, values.len())),
            None => Direction::<D>::identity(),
        };
        GridGeometry::new(size, origin, spacing, direction)
    }

    /// Build an identity B-spline transform (all coefficients zero).
    pub fn build<const D: usize>(&self) -> Result<BSplineTransform<D>> {
        let geometry = self.geometry::<D>()?;
        let mut transform = BSplineTransform::with_geometry(self.spline_order, geometry)?
            .with_outside_diagnostics(self.outside_diagnostics);
        transform.set_identity()?;
        Ok(transform)
    }
}

/// Any transform variant, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransformConfig {
    Translation {
        offset: Vec<f64>,
    },
    Affine {
        /// Row-major; identity when absent.
        #[serde(default)]
        matrix: Option<Vec<f64>>,
        #[serde(default)]
        translation: Option<Vec<f64>>,
        #[serde(default)]
        center: Option<Vec<f64>>,
    },
    #[serde(rename = "bspline")]
    BSpline(BSplineTransformConfig),
}

impl TransformConfig {
    pub fn build<const D: usize>(&self) -> Result<TransformKind<D>> {
        let kind: TransformKind<D> = match self {
            Self::Translation { offset } => {
                TranslationTransform::new(vector::<D>("offset", offset)?).into()
            }
            Self::Affine {
                matrix,
                translation,
                center,
            } => {
                let matrix = match matrix {
                    Some(values) if values.len() == D * D => SMatrix::<f64, D, D>::from_row_slice(values),
                    Some(values) => return Err(wrong_length("matrix", D * D, values.len())),
                    None => SMatrix::<f64, D, D>::identity(),
                };
                let translation = match translation {
                    Some(values) => vector::<D>("translation", values)?,
                    None => Vector::<D>::zeros(),
                };
                let center = match center {
                    Some(values) => Point::<D>::from(vector::<D>("center", values)?),
                    None => Point::<D>::origin(),
                };
                AffineTransform::new(matrix, translation, center).into()
            }
            Self::BSpline(config) => config.build::<D>()?.into(),
        };
        Ok(kind)
    }
}

fn vector<const D: usize>(name: &str, values: &[f64]) -> Result<Vector<D>> {
    if values.len() != D {
        return Err(wrong_length(name, D, values.len()));
    }
    Ok(Vector::<D>::from_column_slice(values))
}

fn wrong_length(name: &str, expected: usize, actual: usize) -> TransformError {
    TransformError::invalid_configuration(format!(
        "{} has {} entries, expected {}",
        name, actual, expected
    ))
}
