//! B-spline free-form deformation transform.
//!
//! `T(x) = x + u(x)` with `u_d(x) = Σ_j w_j(x) · c_{d, j}` over the control
//! points `j` of the support window of `x`. The transform owns its grid
//! geometry and coefficients exclusively; every query takes `&self` and only
//! reads them, so a configured transform can be shared across threads.
//!
//! Derivatives are evaluated in continuous index space by the recursive
//! combiner and mapped to physical space with `P = (Direction · diag(spacing))^-1`:
//! gradients become `G · P`, Hessians `Pᵀ · H · P`.

use nalgebra::SMatrix;
use rayon::prelude::*;

use crate::error::{Result, TransformError};
use crate::grid::{CoefficientStore, GridGeometry};
use crate::kernel::{
    BSplineKernel, ChannelProducts, RecursiveCombiner, SupportRegion, WeightChannels,
    MAX_CHANNELS, MAX_DIMENSION,
};
use crate::spatial::{Point, SpatialHessian, SpatialJacobian, TransformedPoint, Vector};
use super::jacobian::{
    JacobianOfSpatialHessian, JacobianOfSpatialJacobian, ParameterJacobian, SparseJacobian,
    SparseJacobianOfSpatialHessian, SparseJacobianOfSpatialJacobian,
};
use super::trait_::AdvancedTransform;

/// B-spline transform over a `D`-dimensional control-point grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BSplineTransform<const D: usize> {
    kernel: BSplineKernel,
    geometry: Option<GridGeometry<D>>,
    coefficients: CoefficientStore,
    outside_diagnostics: bool,
}

impl<const D: usize> BSplineTransform<D> {
    /// Create a transform of the given spline order with no grid yet.
    ///
    /// # Errors
    /// `InvalidConfiguration` for an unsupported order or dimension.
    pub fn new(order: usize) -> Result<Self> {
        if !(2..=MAX_DIMENSION).contains(&D) {
            return Err(TransformError::invalid_configuration(format!(
                "B-spline dimension {} is not supported (expected 2 to {})",
                D, MAX_DIMENSION
            )));
        }
        Ok(Self {
            kernel: BSplineKernel::new(order)?,
            geometry: None,
            coefficients: CoefficientStore::new(D, 0),
            outside_diagnostics: false,
        })
    }

    /// Create a transform on `geometry`. Coefficients stay unset.
    pub fn with_geometry(order: usize, geometry: GridGeometry<D>) -> Result<Self> {
        let mut transform = Self::new(order)?;
        transform.set_geometry(geometry)?;
        Ok(transform)
    }

    /// Log a warning whenever `transform_point` meets a point outside the support.
    pub fn with_outside_diagnostics(mut self, enabled: bool) -> Self {
        self.outside_diagnostics = enabled;
        self
    }

    pub fn spline_order(&self) -> usize {
        self.kernel.order()
    }

    pub fn kernel(&self) -> &BSplineKernel {
        &self.kernel
    }

    /// The grid geometry, if set.
    pub fn geometry(&self) -> Result<&GridGeometry<D>> {
        self.geometry
            .as_ref()
            .ok_or_else(|| TransformError::not_initialized("B-spline grid geometry has not been set"))
    }

    pub fn coefficients(&self) -> &CoefficientStore {
        &self.coefficients
    }

    /// Replace the grid. Coefficients are reset to unset.
    ///
    /// # Errors
    /// `Geometry` if an axis holds fewer than `order + 1` control points.
    pub fn set_geometry(&mut self, geometry: GridGeometry<D>) -> Result<()> {
        geometry.validate_for_order(self.kernel.order())?;
        self.coefficients = CoefficientStore::new(D, geometry.number_of_points());
        tracing::debug!(
            "B-spline grid set: size {:?}, order {}, {} parameters",
            geometry.size(),
            self.kernel.order(),
            self.coefficients.number_of_parameters()
        );
        self.geometry = Some(geometry);
        Ok(())
    }

    /// Parse and install the grid from the fixed-parameter layout
    /// (sizes, origin, spacing, row-major direction).
    pub fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()> {
        let geometry = GridGeometry::from_fixed_parameters(params)?;
        self.set_geometry(geometry)
    }

    pub fn fixed_parameters(&self) -> Result<Vec<f64>> {
        Ok(self.geometry()?.to_fixed_parameters())
    }

    /// Install a block-major coefficient vector.
    pub fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        self.geometry()?;
        self.coefficients.set_from_parameter_vector(params)
    }

    pub fn parameters(&self) -> Result<Vec<f64>> {
        self.geometry()?;
        self.coefficients.to_parameter_vector()
    }

    /// Zero every coefficient.
    pub fn set_identity(&mut self) -> Result<()> {
        self.geometry()?;
        self.coefficients.set_zero();
        Ok(())
    }

    /// `D · ∏ size`, or zero before a grid is set.
    pub fn number_of_parameters(&self) -> usize {
        self.coefficients.number_of_parameters()
    }

    /// Support points per query, `(order + 1)^D`.
    pub fn number_of_nonzero_jacobian_indices(&self) -> usize {
        self.kernel.support_width().pow(D as u32)
    }

    /// Support window of a physical point.
    pub fn support_region(&self, point: &Point<D>) -> Result<SupportRegion<D>> {
        Ok(SupportRegion::locate(point, self.geometry()?, &self.kernel))
    }

    /// Global parameter indices touched by a support region, block-major:
    /// all support points of dimension 0 first, then dimension 1, and so on.
    pub fn nonzero_parameter_indices(&self, region: &SupportRegion<D>) -> Vec<usize> {
        let points = self.coefficients.points_per_field();
        let support = region.indices();
        (0..D)
            .flat_map(|d| support.iter().map(move |&flat| d * points + flat))
            .collect()
    }

    /// Map a point. Outside the support the point is returned unchanged with
    /// `inside == false`.
    ///
    /// # Errors
    /// `NotInitialized` before the grid and coefficients are set.
    pub fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        let (geometry, fields) = self.evaluation_state()?;
        let region = SupportRegion::locate(point, geometry, &self.kernel);
        if !region.is_inside() {
            if self.outside_diagnostics {
                tracing::warn!(
                    "Point {:?} is outside the B-spline support region",
                    point.coords.as_slice()
                );
            }
            return Ok(TransformedPoint::outside(*point));
        }

        let weights = region.basis_weights(&self.kernel, 0);
        let channels = WeightChannels::values(D);
        let sums = RecursiveCombiner::new(&region, &weights, &channels).contract(&fields);
        let displacement = Vector::<D>::from_fn(|d, _| sums[d][0]);
        Ok(TransformedPoint::inside(*point + displacement))
    }

    /// Map a batch of points in parallel. Output order matches input order.
    pub fn transform_points(&self, points: &[Point<D>]) -> Result<Vec<TransformedPoint<D>>> {
        points.par_iter().map(|p| self.transform_point(p)).collect()
    }

    /// Compact parameter Jacobian `∂T/∂p` at a point.
    ///
    /// Only the grid is needed, not the coefficients.
    pub fn jacobian(&self, point: &Point<D>) -> Result<ParameterJacobian<D>> {
        let geometry = self.geometry()?;
        let region = self.inside_region(geometry, point)?;
        let weights = region.basis_weights(&self.kernel, 0);
        let channels = WeightChannels::values(D);
        let values = RecursiveCombiner::new(&region, &weights, &channels).weights();
        Ok(ParameterJacobian::from_weights(&values, region.indices()))
    }

    /// `∂T/∂x`, the identity plus the displacement gradient.
    pub fn spatial_jacobian(&self, point: &Point<D>) -> Result<SpatialJacobian<D>> {
        let (geometry, fields) = self.evaluation_state()?;
        let region = self.inside_region(geometry, point)?;
        let weights = region.basis_weights(&self.kernel, 1);
        let channels = WeightChannels::gradient(D);
        let sums = RecursiveCombiner::new(&region, &weights, &channels).contract(&fields);
        Ok(physical_spatial_jacobian(&sums, geometry))
    }

    /// `∂²T_d/∂x∂x` for every output dimension `d`.
    pub fn spatial_hessian(&self, point: &Point<D>) -> Result<SpatialHessian<D>> {
        let (geometry, fields) = self.evaluation_state()?;
        let region = self.inside_region(geometry, point)?;
        let weights = region.basis_weights(&self.kernel, 2);
        let channels = WeightChannels::hessian(D);
        let sums = RecursiveCombiner::new(&region, &weights, &channels).contract(&fields);
        let p = geometry.physical_to_index_matrix();
        Ok(std::array::from_fn(|d| {
            to_physical_hessian(&index_hessian::<D>(&sums[d]), p)
        }))
    }

    /// Spatial Jacobian together with its derivative with respect to every
    /// nonzero parameter, in one recursion.
    pub fn jacobian_of_spatial_jacobian(&self, point: &Point<D>) -> Result<JacobianOfSpatialJacobian<D>> {
        let (geometry, fields) = self.evaluation_state()?;
        let region = self.inside_region(geometry, point)?;
        let weights = region.basis_weights(&self.kernel, 1);
        let channels = WeightChannels::gradient(D);
        let combiner = RecursiveCombiner::new(&region, &weights, &channels);
        let p = geometry.physical_to_index_matrix();

        let mut sums = [[0.0; MAX_CHANNELS]; D];
        let mut matrices = Vec::with_capacity(region.len());
        let mut support = Vec::with_capacity(region.len());
        combiner.for_each(|flat, products| {
            accumulate(&mut sums, &fields, flat, products);
            let gradient = SMatrix::<f64, 1, D>::from_fn(|_, a| {
                products[WeightChannels::gradient_channel(a)]
            }) * p;
            matrices.push(SpatialJacobian::<D>::from_fn(|_, k| gradient[(0, k)]));
            support.push(flat);
        });

        Ok(JacobianOfSpatialJacobian {
            spatial_jacobian: physical_spatial_jacobian(&sums, geometry),
            matrices,
            support,
        })
    }

    /// Spatial Hessian together with the physical Hessian of every support
    /// weight, in one recursion.
    pub fn jacobian_of_spatial_hessian(&self, point: &Point<D>) -> Result<JacobianOfSpatialHessian<D>> {
        let (geometry, fields) = self.evaluation_state()?;
        let region = self.inside_region(geometry, point)?;
        let weights = region.basis_weights(&self.kernel, 2);
        let channels = WeightChannels::hessian(D);
        let combiner = RecursiveCombiner::new(&region, &weights, &channels);
        let p = geometry.physical_to_index_matrix();

        let mut sums = [[0.0; MAX_CHANNELS]; D];
        let mut matrices = Vec::with_capacity(region.len());
        let mut support = Vec::with_capacity(region.len());
        combiner.for_each(|flat, products| {
            accumulate(&mut sums, &fields, flat, products);
            matrices.push(to_physical_hessian(&index_hessian::<D>(products), p));
            support.push(flat);
        });

        Ok(JacobianOfSpatialHessian {
            spatial_hessian: std::array::from_fn(|d| {
                to_physical_hessian(&index_hessian::<D>(&sums[d]), p)
            }),
            matrices,
            support,
        })
    }

    fn evaluation_state(&self) -> Result<(&GridGeometry<D>, [&[f64]; D])> {
        let geometry = self.geometry()?;
        Ok((geometry, self.coefficients.fields::<D>()?))
    }

    fn inside_region(&self, geometry: &GridGeometry<D>, point: &Point<D>) -> Result<SupportRegion<D>> {
        let region = SupportRegion::locate(point, geometry, &self.kernel);
        if region.is_inside() {
            Ok(region)
        } else {
            Err(TransformError::out_of_support(point.coords.as_slice()))
        }
    }
}

impl<const D: usize> AdvancedTransform<D> for BSplineTransform<D> {
    fn transform_point(&self, point: &Point<D>) -> Result<TransformedPoint<D>> {
        BSplineTransform::transform_point(self, point)
    }

    fn transform_points(&self, points: &[Point<D>]) -> Result<Vec<TransformedPoint<D>>> {
        BSplineTransform::transform_points(self, points)
    }

    fn sparse_jacobian(&self, point: &Point<D>) -> Result<SparseJacobian<D>> {
        Ok(self.jacobian(point)?.expand(self.coefficients.points_per_field()))
    }

    fn spatial_jacobian(&self, point: &Point<D>) -> Result<SpatialJacobian<D>> {
        BSplineTransform::spatial_jacobian(self, point)
    }

    fn spatial_hessian(&self, point: &Point<D>) -> Result<SpatialHessian<D>> {
        BSplineTransform::spatial_hessian(self, point)
    }

    fn sparse_jacobian_of_spatial_jacobian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialJacobian<D>> {
        Ok(self
            .jacobian_of_spatial_jacobian(point)?
            .expand(self.coefficients.points_per_field()))
    }

    fn sparse_jacobian_of_spatial_hessian(&self, point: &Point<D>) -> Result<SparseJacobianOfSpatialHessian<D>> {
        Ok(self
            .jacobian_of_spatial_hessian(point)?
            .expand(self.coefficients.points_per_field()))
    }

    fn number_of_nonzero_parameters(&self) -> usize {
        D * self.number_of_nonzero_jacobian_indices()
    }

    fn number_of_parameters(&self) -> usize {
        BSplineTransform::number_of_parameters(self)
    }

    fn parameters(&self) -> Result<Vec<f64>> {
        BSplineTransform::parameters(self)
    }

    fn set_parameters(&mut self, params: &[f64]) -> Result<()> {
        BSplineTransform::set_parameters(self, params)
    }

    fn fixed_parameters(&self) -> Result<Vec<f64>> {
        BSplineTransform::fixed_parameters(self)
    }

    fn set_fixed_parameters(&mut self, params: &[f64]) -> Result<()> {
        BSplineTransform::set_fixed_parameters(self, params)
    }
}

fn accumulate<const D: usize>(
    sums: &mut [ChannelProducts; D],
    fields: &[&[f64]; D],
    flat: usize,
    products: &[f64],
) {
    for (field, acc) in fields.iter().zip(sums.iter_mut()) {
        let coefficient = field[flat];
        for (sum, product) in acc.iter_mut().zip(products) {
            *sum += product * coefficient;
        }
    }
}

/// `I + G · P` from the gradient channels of each output dimension.
fn physical_spatial_jacobian<const D: usize>(
    sums: &[ChannelProducts; D],
    geometry: &GridGeometry<D>,
) -> SpatialJacobian<D> {
    let index_gradient = SMatrix::<f64, D, D>::from_fn(|d, a| {
        sums[d][WeightChannels::gradient_channel(a)]
    });
    SpatialJacobian::<D>::identity() + index_gradient * geometry.physical_to_index_matrix()
}

/// Symmetric index-space Hessian from the Hessian channels.
fn index_hessian<const D: usize>(channels: &[f64]) -> SMatrix<f64, D, D> {
    SMatrix::<f64, D, D>::from_fn(|a, b| channels[WeightChannels::hessian_channel(D, a, b)])
}

fn to_physical_hessian<const D: usize>(
    hessian: &SMatrix<f64, D, D>,
    p: &SMatrix<f64, D, D>,
) -> SMatrix<f64, D, D> {
    p.transpose() * hessian * p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Direction, Spacing};

    fn grid_2d() -> GridGeometry<2> {
        GridGeometry::axis_aligned(
            [10, 12],
            Point::<2>::new(-5.0, 3.0),
            Spacing::<2>::new(2.0, 0.5),
        )
        .unwrap()
    }

    /// Coefficients `f(d, i) = g(d, grid index)`.
    fn parameters_from<F>(geometry: &GridGeometry<2>, f: F) -> Vec<f64>
    where
        F: Fn(usize, [usize; 2]) -> f64,
    {
        (0..2)
            .flat_map(|d| {
                (0..geometry.number_of_points()).map(move |flat| (d, flat))
            })
            .map(|(d, flat)| f(d, geometry.grid_index(flat)))
            .collect()
    }

    #[test]
    fn test_unset_transform() {
        let transform = BSplineTransform::<2>::new(3).unwrap();
        assert_eq!(transform.number_of_parameters(), 0);
        assert!(matches!(
            transform.transform_point(&Point::<2>::origin()),
            Err(TransformError::NotInitialized(_))
        ));
        assert!(matches!(transform.parameters(), Err(TransformError::NotInitialized(_))));

        let transform = BSplineTransform::with_geometry(3, grid_2d()).unwrap();
        assert_eq!(transform.number_of_parameters(), 240);
        assert!(matches!(
            transform.spatial_jacobian(&Point::<2>::new(0.0, 5.0)),
            Err(TransformError::NotInitialized(_))
        ));
        // The parameter Jacobian only needs the grid.
        assert!(transform.jacobian(&Point::<2>::new(0.0, 5.0)).is_ok());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            BSplineTransform::<2>::new(6),
            Err(TransformError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            BSplineTransform::<5>::new(3),
            Err(TransformError::InvalidConfiguration(_))
        ));
        let small = GridGeometry::axis_aligned([3, 8], Point::<2>::origin(), Spacing::<2>::new(1.0, 1.0)).unwrap();
        assert!(matches!(
            BSplineTransform::with_geometry(3, small),
            Err(TransformError::Geometry(_))
        ));
    }

    #[test]
    fn test_identity_and_outside() {
        let mut transform = BSplineTransform::with_geometry(3, grid_2d()).unwrap();
        transform.set_identity().unwrap();

        let p = Point::<2>::new(1.3, 6.1);
        let mapped = transform.transform_point(&p).unwrap();
        assert!(mapped.inside);
        assert_eq!(mapped.point, p);

        let far = Point::<2>::new(100.0, 6.1);
        let mapped = transform.transform_point(&far).unwrap();
        assert!(!mapped.inside);
        assert_eq!(mapped.point, far);

        let err = transform.spatial_jacobian(&far).unwrap_err();
        assert!(err.is_out_of_support());
        assert!(transform.jacobian(&far).unwrap_err().is_out_of_support());
    }

    #[test]
    fn test_linear_field_chain_rule() {
        // u_0 = 0.3 · i0, u_1 = -0.2 · i1, reproduced exactly by cubic splines
        let geometry = grid_2d();
        let mut transform = BSplineTransform::with_geometry(3, geometry.clone()).unwrap();
        let params = parameters_from(&geometry, |d, index| {
            if d == 0 { 0.3 * index[0] as f64 } else { -0.2 * index[1] as f64 }
        });
        transform.set_parameters(&params).unwrap();

        let p = Point::<2>::new(2.7, 6.2);
        let c = geometry.physical_to_continuous_index(&p);
        let mapped = transform.transform_point(&p).unwrap().point;
        assert!((mapped[0] - (p[0] + 0.3 * c[0])).abs() < 1e-12);
        assert!((mapped[1] - (p[1] - 0.2 * c[1])).abs() < 1e-12);

        let jacobian = transform.spatial_jacobian(&p).unwrap();
        let expected = SpatialJacobian::<2>::new(1.0 + 0.3 / 2.0, 0.0, 0.0, 1.0 - 0.2 / 0.5);
        assert!((jacobian - expected).norm() < 1e-12);

        let hessian = transform.spatial_hessian(&p).unwrap();
        assert!(hessian.iter().all(|h| h.norm() < 1e-12));
    }

    #[test]
    fn test_quadratic_field_hessian() {
        // Σ i² β3(c - i) = c² + 1/3
        let geometry = grid_2d();
        let mut transform = BSplineTransform::with_geometry(3, geometry.clone()).unwrap();
        let params = parameters_from(&geometry, |d, index| {
            if d == 0 { (index[0] as f64).powi(2) } else { 0.0 }
        });
        transform.set_parameters(&params).unwrap();

        let p = Point::<2>::new(3.9, 5.05);
        let c = geometry.physical_to_continuous_index(&p);
        let mapped = transform.transform_point(&p).unwrap().point;
        assert!((mapped[0] - p[0] - (c[0] * c[0] + 1.0 / 3.0)).abs() < 1e-10);

        let hessian = transform.spatial_hessian(&p).unwrap();
        // d²/dx² of c0² with c0 = (x - o) / 2
        assert!((hessian[0][(0, 0)] - 2.0 / 4.0).abs() < 1e-10);
        assert!(hessian[0][(0, 1)].abs() < 1e-10);
        assert!(hessian[1].norm() < 1e-10);
    }

    #[test]
    fn test_compact_outputs_share_support() {
        let geometry = grid_2d();
        let mut transform = BSplineTransform::with_geometry(3, geometry.clone()).unwrap();
        let params = parameters_from(&geometry, |d, index| {
            ((d + 1) as f64) * (index[0] as f64 * 0.1).sin() + (index[1] as f64 * 0.3).cos()
        });
        transform.set_parameters(&params).unwrap();

        let p = Point::<2>::new(4.4, 5.6);
        let jacobian = transform.jacobian(&p).unwrap();
        let jsj = transform.jacobian_of_spatial_jacobian(&p).unwrap();
        let jsh = transform.jacobian_of_spatial_hessian(&p).unwrap();
        let region = transform.support_region(&p).unwrap();

        assert_eq!(jacobian.len(), transform.number_of_nonzero_jacobian_indices());
        assert_eq!(jacobian.support, region.indices());
        assert_eq!(jsj.support, region.indices());
        assert_eq!(jsh.support, region.indices());

        let sum: f64 = (0..jacobian.len()).map(|j| jacobian.weight(j)).sum();
        assert!((sum - 1.0).abs() < 1e-12);

        let sj = transform.spatial_jacobian(&p).unwrap();
        assert!((jsj.spatial_jacobian - sj).norm() < 1e-12);
        let sh = transform.spatial_hessian(&p).unwrap();
        for d in 0..2 {
            assert!((jsh.spatial_hessian[d] - sh[d]).norm() < 1e-12);
        }
    }

    #[test]
    fn test_nonzero_parameter_indices() {
        let transform = BSplineTransform::with_geometry(1, grid_2d()).unwrap();
        let region = transform.support_region(&Point::<2>::new(0.0, 5.0)).unwrap();
        let support = region.indices();
        let indices = transform.nonzero_parameter_indices(&region);
        assert_eq!(indices.len(), 2 * support.len());
        assert_eq!(&indices[..support.len()], support.as_slice());
        assert_eq!(indices[support.len()], support[0] + 120);
    }

    #[test]
    fn test_fixed_parameters_reset_coefficients() {
        let mut transform = BSplineTransform::with_geometry(3, grid_2d()).unwrap();
        transform.set_identity().unwrap();
        let fixed = transform.fixed_parameters().unwrap();

        let mut other = BSplineTransform::<2>::new(3).unwrap();
        other.set_fixed_parameters(&fixed).unwrap();
        assert_eq!(other.geometry().unwrap(), transform.geometry().unwrap());
        assert!(matches!(other.parameters(), Err(TransformError::NotInitialized(_))));

        assert!(matches!(
            other.set_parameters(&[0.0; 3]),
            Err(TransformError::LengthMismatch { expected: 240, actual: 3 })
        ));
    }

    #[test]
    fn test_rotated_grid_translation_field() {
        // A constant coefficient field is a pure translation regardless of direction.
        let angle: f64 = 0.4;
        let direction = Direction::<2>::new(angle.cos(), -angle.sin(), angle.sin(), angle.cos());
        let geometry = GridGeometry::new(
            [9, 9],
            Point::<2>::new(1.0, -2.0),
            Spacing::<2>::new(1.5, 1.5),
            direction,
        )
        .unwrap();
        let mut transform = BSplineTransform::with_geometry(2, geometry.clone()).unwrap();
        let params = parameters_from(&geometry, |d, _| if d == 0 { 0.75 } else { -1.25 });
        transform.set_parameters(&params).unwrap();

        let p = geometry.continuous_index_to_physical(&Point::<2>::new(4.2, 3.7));
        let mapped = transform.transform_point(&p).unwrap();
        assert!(mapped.inside);
        assert!((mapped.point[0] - p[0] - 0.75).abs() < 1e-12);
        assert!((mapped.point[1] - p[1] + 1.25).abs() < 1e-12);
        let sj = transform.spatial_jacobian(&p).unwrap();
        assert!((sj - SpatialJacobian::<2>::identity()).norm() < 1e-12);
    }
}
