//! Control-point grid: lattice geometry and coefficient fields.

pub mod geometry;
pub mod coefficients;

pub use geometry::GridGeometry;
pub use coefficients::CoefficientStore;
