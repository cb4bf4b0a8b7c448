//! Recursive tensor contraction over a support region.
//!
//! One recursion serves every output. At each level (one axis, counted down
//! from the last) every local offset multiplies the running weight products by
//! that axis's weight, and the leaf receives the flat grid index together with
//! the products. Which weight table an axis contributes (value, first or second
//! derivative) is decided per *channel*:
//!
//! - channel `0`: value weights on every axis (displacement, parameter Jacobian);
//! - channel `1 + a`: first derivative on axis `a` (spatial Jacobian);
//! - Hessian channels `(a, b)`, `a ≤ b`: second derivative on `a` when `a == b`,
//!   first derivatives on `a` and `b` otherwise.
//!
//! The last axis is the outermost loop, so leaves arrive with axis 0 fastest,
//! the order of [`SupportRegion::indices`].

use crate::kernel::basis::BasisWeights;
use crate::kernel::support::SupportRegion;
use crate::kernel::MAX_DIMENSION;

/// Value + gradient + upper-triangular Hessian channels at `MAX_DIMENSION`.
pub const MAX_CHANNELS: usize = 1 + MAX_DIMENSION + MAX_DIMENSION * (MAX_DIMENSION + 1) / 2;

/// Running products, one slot per channel.
pub type ChannelProducts = [f64; MAX_CHANNELS];

/// Per-channel choice of weight table for each axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightChannels {
    dimension: usize,
    len: usize,
    derivatives: [[u8; MAX_DIMENSION]; MAX_CHANNELS],
}

impl WeightChannels {
    /// Only the value channel.
    pub fn values(dimension: usize) -> Self {
        Self::build(dimension, false, false)
    }

    /// Value channel followed by one first-derivative channel per axis.
    pub fn gradient(dimension: usize) -> Self {
        Self::build(dimension, true, false)
    }

    /// Value, gradient, then the Hessian channels `(a, b)` with `a ≤ b`, row by row.
    pub fn hessian(dimension: usize) -> Self {
        Self::build(dimension, true, true)
    }

    fn build(dimension: usize, gradient: bool, hessian: bool) -> Self {
        assert!(
            dimension <= MAX_DIMENSION,
            "dimension {} exceeds {}",
            dimension,
            MAX_DIMENSION
        );
        let mut derivatives = [[0u8; MAX_DIMENSION]; MAX_CHANNELS];
        let mut len = 1;
        if gradient {
            for axis in 0..dimension {
                derivatives[len][axis] = 1;
                len += 1;
            }
        }
        if hessian {
            for a in 0..dimension {
                for b in a..dimension {
                    derivatives[len][a] += 1;
                    derivatives[len][b] += 1;
                    len += 1;
                }
            }
        }
        Self {
            dimension,
            len,
            derivatives,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Derivative order used by `channel` on each axis.
    pub fn derivatives(&self, channel: usize) -> &[u8] {
        &self.derivatives[channel][..self.dimension]
    }

    /// Highest derivative order any channel needs.
    pub fn max_derivative(&self) -> usize {
        self.derivatives[..self.len]
            .iter()
            .flat_map(|d| d.iter())
            .copied()
            .max()
            .unwrap_or(0) as usize
    }

    /// Channel of `∂/∂axis`.
    pub fn gradient_channel(axis: usize) -> usize {
        1 + axis
    }

    /// Channel of `∂²/∂a∂b` in a Hessian channel set of `dimension` axes.
    pub fn hessian_channel(dimension: usize, a: usize, b: usize) -> usize {
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        // rows 0..a of the upper triangle hold dimension - r entries each
        let before: usize = (0..a).map(|r| dimension - r).sum();
        1 + dimension + before + (b - a)
    }
}

/// Folds per-axis basis weights over a support region.
#[derive(Debug, Clone, Copy)]
pub struct RecursiveCombiner<'a, const D: usize> {
    region: &'a SupportRegion<D>,
    weights: &'a [BasisWeights; D],
    channels: &'a WeightChannels,
}

impl<'a, const D: usize> RecursiveCombiner<'a, D> {
    /// # Panics
    /// In debug builds, if the region is outside or the channel set was built
    /// for another dimension.
    pub fn new(
        region: &'a SupportRegion<D>,
        weights: &'a [BasisWeights; D],
        channels: &'a WeightChannels,
    ) -> Self {
        debug_assert!(region.is_inside(), "combiner run on an outside point");
        debug_assert_eq!(channels.dimension(), D);
        Self {
            region,
            weights,
            channels,
        }
    }

    /// Visit every support point in order with its flat index and channel products.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(usize, &[f64]),
    {
        let mut partial = [0.0; MAX_CHANNELS];
        partial[..self.channels.len()].fill(1.0);
        self.recurse(D, self.region.base_flat_index(), &partial, &mut visit);
    }

    fn recurse<F>(&self, remaining_axes: usize, offset: usize, partial: &ChannelProducts, visit: &mut F)
    where
        F: FnMut(usize, &[f64]),
    {
        let len = self.channels.len();
        if remaining_axes == 0 {
            visit(offset, &partial[..len]);
            return;
        }

        let axis = remaining_axes - 1;
        let stride = self.region.strides()[axis];
        let weights = &self.weights[axis];
        for k in 0..=self.region.order() {
            let mut next = [0.0; MAX_CHANNELS];
            for (channel, value) in next[..len].iter_mut().enumerate() {
                let derivative = self.channels.derivatives[channel][axis] as usize;
                *value = partial[channel] * weights.table(derivative)[k];
            }
            self.recurse(axis, offset + k * stride, &next, visit);
        }
    }

    /// Contract with the coefficient fields: `result[d][c] = Σ product_c · field_d[flat]`.
    pub fn contract(&self, fields: &[&[f64]; D]) -> [ChannelProducts; D] {
        let mut acc = [[0.0; MAX_CHANNELS]; D];
        self.for_each(|flat, products| {
            for (field, sums) in fields.iter().zip(acc.iter_mut()) {
                let coefficient = field[flat];
                for (sum, product) in sums.iter_mut().zip(products) {
                    *sum += product * coefficient;
                }
            }
        });
        acc
    }

    /// Value weights of every support point, in support order.
    pub fn weights(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.region.len());
        self.for_each(|_, products| out.push(products[0]));
        out
    }
}
