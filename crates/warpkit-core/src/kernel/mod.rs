//! B-spline evaluation kernel.
//!
//! Leaves first: per-axis basis weights, the support region of a point, and
//! the recursive combiner that folds them with the coefficient grid.

pub mod basis;
pub mod support;
pub mod combiner;

pub use basis::{BSplineKernel, BasisWeights, WeightTable, MAX_DERIVATIVE};
pub use support::SupportRegion;
pub use combiner::{ChannelProducts, RecursiveCombiner, WeightChannels, MAX_CHANNELS};

/// Largest supported number of spatial axes.
pub const MAX_DIMENSION: usize = 4;

/// Largest supported spline order.
pub const MAX_SPLINE_ORDER: usize = 5;

/// Weights per axis at the largest spline order.
pub const MAX_SUPPORT: usize = MAX_SPLINE_ORDER + 1;
