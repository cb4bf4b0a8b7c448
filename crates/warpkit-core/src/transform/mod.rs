//! Transform types and operations.
//!
//! The B-spline transform is the core; translation and affine transforms
//! share its capability trait so callers can hold any of them as a
//! [`TransformKind`].

pub mod trait_;
pub mod jacobian;
pub mod bspline;
pub mod reference;
pub mod translation;
pub mod affine;
pub mod kind;

pub use trait_::{AdvancedTransform, TensorTransform};
pub use jacobian::{
    JacobianOfSpatialHessian, JacobianOfSpatialJacobian, ParameterJacobian, SparseJacobian,
    SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian,
};
pub use bspline::BSplineTransform;
pub use reference::ReferenceEvaluator;
pub use translation::TranslationTransform;
pub use affine::AffineTransform;
pub use kind::TransformKind;
