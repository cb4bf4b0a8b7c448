//! Support region of a query point.
//!
//! Per axis the continuous index `c` is shifted by `(order - 1) / 2` so the
//! window `[floor(s), floor(s) + order]` is the classic centered B-spline
//! support (for the cubic kernel: `floor(c) - 1 ..= floor(c) + 2`).
//!
//! The window is enumerated with axis 0 fastest, the same order as the grid
//! flattening. Every Jacobian-like output uses this order for its columns.

use crate::grid::GridGeometry;
use crate::kernel::basis::{BSplineKernel, BasisWeights};
use crate::spatial::Point;

/// Control-point window of a point, plus the `inside` flag.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportRegion<const D: usize> {
    inside: bool,
    order: usize,
    start: [usize; D],
    offsets: [f64; D],
    strides: [usize; D],
}

impl<const D: usize> SupportRegion<D> {
    /// Locate the window of a physical point.
    pub fn locate(point: &Point<D>, geometry: &GridGeometry<D>, kernel: &BSplineKernel) -> Self {
        let index = geometry.physical_to_continuous_index(point);
        Self::locate_index(&index, geometry, kernel)
    }

    /// Locate the window of a continuous grid index.
    ///
    /// The point is outside when the index is not finite or the window would
    /// reach past `[0, size)` on any axis.
    pub fn locate_index(index: &Point<D>, geometry: &GridGeometry<D>, kernel: &BSplineKernel) -> Self {
        let order = kernel.order();
        let size = geometry.size();
        let shift = kernel.window_offset();

        let mut inside = true;
        let mut start = [0usize; D];
        let mut offsets = [0.0; D];
        for axis in 0..D {
            let s = index[axis] - shift;
            if !s.is_finite() {
                inside = false;
                break;
            }
            let first = s.floor();
            if first < 0.0 || first + order as f64 >= size[axis] as f64 {
                inside = false;
                break;
            }
            start[axis] = first as usize;
            offsets[axis] = s - first;
        }

        Self {
            inside,
            order,
            start,
            offsets,
            strides: geometry.strides(),
        }
    }

    pub fn is_inside(&self) -> bool {
        self.inside
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// First grid index of the window along each axis.
    pub fn start(&self) -> [usize; D] {
        self.start
    }

    /// Fractional offset of the point inside its local cell, per axis.
    pub fn cell_offsets(&self) -> [f64; D] {
        self.offsets
    }

    pub fn strides(&self) -> [usize; D] {
        self.strides
    }

    /// `(order + 1)^D`, the number of control points in the window.
    pub fn len(&self) -> usize {
        (self.order + 1).pow(D as u32)
    }

    /// Flat index of the first window corner.
    pub fn base_flat_index(&self) -> usize {
        self.start
            .iter()
            .zip(self.strides.iter())
            .map(|(s, stride)| s * stride)
            .sum()
    }

    /// Flat grid indices of the window, axis 0 fastest. Empty when outside.
    pub fn indices(&self) -> Vec<usize> {
        if !self.inside {
            return Vec::new();
        }

        let width = self.order + 1;
        let len = self.len();
        let base = self.base_flat_index();
        let mut local = [0usize; D];
        let mut indices = Vec::with_capacity(len);
        for _ in 0..len {
            let offset: usize = local
                .iter()
                .zip(self.strides.iter())
                .map(|(l, stride)| l * stride)
                .sum();
            indices.push(base + offset);

            for l in local.iter_mut() {
                *l += 1;
                if *l < width {
                    break;
                }
                *l = 0;
            }
        }
        indices
    }

    /// Per-axis basis weights up to `max_derivative`.
    pub fn basis_weights(&self, kernel: &BSplineKernel, max_derivative: usize) -> [BasisWeights; D] {
        std::array::from_fn(|axis| BasisWeights::compute(kernel, self.offsets[axis], max_derivative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::Spacing;

    fn unit_grid(size: [usize; 2]) -> GridGeometry<2> {
        GridGeometry::axis_aligned(size, Point::<2>::origin(), Spacing::<2>::new(1.0, 1.0)).unwrap()
    }

    #[test]
    fn test_cubic_window_start() {
        let geometry = unit_grid([8, 8]);
        let region = SupportRegion::locate(&Point::<2>::new(3.25, 2.5), &geometry, &BSplineKernel::cubic());
        assert!(region.is_inside());
        assert_eq!(region.start(), [2, 1]);
        assert!((region.cell_offsets()[0] - 0.25).abs() < 1e-15);
        assert!((region.cell_offsets()[1] - 0.5).abs() < 1e-15);
        assert_eq!(region.len(), 16);
    }

    #[test]
    fn test_even_order_centers_on_nearest_point() {
        let geometry = unit_grid([8, 8]);
        let kernel = BSplineKernel::new(2).unwrap();
        let region = SupportRegion::locate(&Point::<2>::new(3.6, 3.4), &geometry, &kernel);
        assert!(region.is_inside());
        // nearest points 4 and 3, windows 3..=5 and 2..=4
        assert_eq!(region.start(), [3, 2]);

        let zero = BSplineKernel::new(0).unwrap();
        let region = SupportRegion::locate(&Point::<2>::new(3.6, 3.4), &geometry, &zero);
        assert_eq!(region.start(), [4, 3]);
        assert_eq!(region.indices(), vec![4 + 3 * 8]);
    }

    #[test]
    fn test_indices_axis_zero_fastest() {
        let geometry = unit_grid([10, 10]);
        let kernel = BSplineKernel::new(1).unwrap();
        let region = SupportRegion::locate(&Point::<2>::new(2.5, 4.5), &geometry, &kernel);
        assert_eq!(region.indices(), vec![42, 43, 52, 53]);
    }

    #[test]
    fn test_last_valid_cell_boundary() {
        let geometry = unit_grid([8, 8]);
        let kernel = BSplineKernel::cubic();
        // Last cell whose window fits is [5, 6): window 4..=7.
        let last = SupportRegion::locate(&Point::<2>::new(5.0, 3.0), &geometry, &kernel);
        assert!(last.is_inside());
        let beyond = SupportRegion::locate(&Point::<2>::new(6.0, 3.0), &geometry, &kernel);
        assert!(!beyond.is_inside());
        assert!(beyond.indices().is_empty());

        let first = SupportRegion::locate(&Point::<2>::new(1.0, 1.0), &geometry, &kernel);
        assert!(first.is_inside());
        let before = SupportRegion::locate(&Point::<2>::new(0.999, 1.0), &geometry, &kernel);
        assert!(!before.is_inside());
    }

    #[test]
    fn test_non_finite_point_is_outside() {
        let geometry = unit_grid([8, 8]);
        let region = SupportRegion::locate(&Point::<2>::new(f64::NAN, 3.0), &geometry, &BSplineKernel::cubic());
        assert!(!region.is_inside());
        let region = SupportRegion::locate(&Point::<2>::new(f64::INFINITY, 3.0), &geometry, &BSplineKernel::cubic());
        assert!(!region.is_inside());
    }
}
