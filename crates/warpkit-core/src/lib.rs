//! Recursive B-spline transform evaluation for deformable image registration.
//!
//! A [`BSplineTransform`] maps physical points through a grid of control-point
//! coefficients and evaluates the analytic derivatives registration needs:
//! the parameter Jacobian, the spatial Jacobian and Hessian, and their
//! derivatives with respect to the parameters. Every output comes from one
//! recursive tensor contraction over the support window of the point
//! ([`kernel::RecursiveCombiner`]).

pub mod error;
pub mod spatial;
pub mod grid;
pub mod kernel;
pub mod transform;
pub mod config;

pub use error::{Result, TransformError};
pub use spatial::{Point, Vector, Spacing, Direction, TransformedPoint};
pub use grid::{CoefficientStore, GridGeometry};
pub use kernel::{BSplineKernel, SupportRegion};
pub use transform::{
    AdvancedTransform, AffineTransform, BSplineTransform, ReferenceEvaluator, TensorTransform,
    TransformKind, TranslationTransform,
};
pub use config::{BSplineTransformConfig, TransformConfig};
