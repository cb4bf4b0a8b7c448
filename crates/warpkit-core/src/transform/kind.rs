//! Closed set of transform variants.

use crate::error::Result;
use crate::spatial::{Point, SpatialHessian, SpatialJacobian, TransformedPoint};
use super::affine::AffineTransform;
use super::bspline::BSplineTransform;
use super::jacobian::{SparseJacobian, SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian};
use super::trait_::AdvancedTransform;
use super::translation::TranslationTransform;

/// Any supported transform, dispatched by tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformKind<const D: usize> {
    Translation(TranslationTransform<D>),
    Affine(AffineTransform<D>),
    BSpline(BSplineTransform<D>),
}

impl<const D: usize> TransformKind<D> {
    /// Short variant name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Translation(_) => "translation",
            Self::Affine(_) => "affine",
            Self::BSpline(_) => "bspline",
        }
    }

    fn inner(&self) -> &dyn AdvancedTransform<D> {
        match self {
            Self::Translation(t) => t,
            Self::Affine(t) => t,
            Self::BSpline(t) => t,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AdvancedTransform<D> {
        match self {
            Self::Translation(t) => t,
            Self::Affine(t) => t,
            Self::BSpline(t) => t,
        }
    }
}

impl<const D: usize> From<TranslationTransform<D>> for TransformKind<D> {
    fn from(t: TranslationTransform<D>) -> Self {
        Self::Translation(t)
    }
}

impl<const D: usize> From<AffineTransform<D>> for TransformKind<D> {
    fn from(t: AffineTransform<D>) -> Self {
        Self::Affine(t)
    }
}

impl<const D: usize> From<BSplineTransform<D>> for TransformKind<D> {
    fn from(t: BSplineTransform<D>) -> Self {
        Self::BSpline(t)
    }
}

impl<const D: usize> AdvancedTransform<D> for TransformKind<D> {
    fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        self.inner().transform_point(point)
    }

    fn transform_points(&self, points: &[Point<D>]) -> Result<Vec<TransformedPoint<D>>> {
        self.inner().transform_points(points)
    }

    fn sparse_jacobian(&self, point: &Point<D>) -> Result<SparseJacobian<D>> {
        self.inner().sparse_jacobian(point)
    }

    fn spatial_jacobian(&self, point: &Point<D>) -> Result<SpatialJacobian<D>> {
        self.inner().spatial_jacobian(point)
    }

    fn spatial_hessian(&self, point: &Point<D>) -> Result<SpatialHessian<D>> {
        self.inner().spatial_hessian(point)
    }

    fn sparse_jacobian_of_spatial_jacobian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialJacobian<D>> {
        self.inner().sparse_jacobian_of_spatial_jacobian(point)
    }

    fn sparse_jacobian_of_spatial_hessian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialHessian<D>> {
        self.inner().sparse_jacobian_of_spatial_hessian(point)
    }

    fn number_of_nonzero_parameters(&self) -> usize {
        self.inner().number_of_nonzero_parameters()
    }

    fn number_of_parameters(&self) -> usize {
        self.inner().number_of_parameters()
    }

    fn parameters(&self) -> Result<Vec<f64>> {
        self.inner().parameters()
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        self.inner_mut().set_parameters(params)
    }

    fn fixed_parameters(&self) -> Result<Vec<f64>> {
        self.inner().fixed_parameters()
    }

    fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()> {
        self.inner_mut().set_fixed_parameters(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Vector;

    #[test]
    fn test_dispatch() {
        let mut kind: TransformKind<2> = TranslationTransform::new(Vector::<2>::new(1.0, -1.0)).into();
        assert_eq!(kind.name(), "translation");
        assert_eq!(kind.number_of_parameters(), 2);
        let mapped = kind.transform_point(&Point::<2>::new(0.0, 0.0)).unwrap();
        assert_eq!(mapped.point, Point::<2>::new(1.0, -1.0));

        kind.set_parameters(&[3.0, 4.0]).unwrap();
        assert_eq!(kind.parameters().unwrap(), vec![3.0, 4.0]);

        let affine: TransformKind<2> = AffineTransform::identity(Point::<2>::origin()).into();
        assert_eq!(affine.name(), "affine");
        assert_eq!(affine.number_of_nonzero_parameters(), 6);
    }
}
