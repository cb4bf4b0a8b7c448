//! B-spline basis weights.
//!
//! Weights are evaluated for a uniform B-spline of runtime order `n` at the
//! fractional offset `u ∈ [0, 1)` of a point inside its local cell. Entry `j`
//! of the table belongs to the `j`-th control point of the window, so with the
//! cardinal spline `N_n` supported on `[0, n + 1]`:
//!
//! `w[j] = N_n(u + n - j)`
//!
//! Higher orders are built from lower ones by the uniform recurrence; the first
//! and second derivatives use `N_n' (t) = N_{n-1}(t) - N_{n-1}(t - 1)`.
//! Derivatives are taken with respect to the continuous grid index.

use crate::error::{Result, TransformError};
use crate::kernel::{MAX_SPLINE_ORDER, MAX_SUPPORT};

/// Highest derivative order the kernel evaluates.
pub const MAX_DERIVATIVE: usize = 2;

/// Weight table of one axis: `order + 1` entries in a fixed-capacity buffer.
pub type WeightTable = [f64; MAX_SUPPORT];

/// Centered B-spline kernel of a given order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BSplineKernel {
    order: usize,
}

impl BSplineKernel {
    /// Create a kernel; orders above [`MAX_SPLINE_ORDER`] are rejected.
    pub fn new(order: usize) -> Result<Self> {
        if order > MAX_SPLINE_ORDER {
            return Err(TransformError::invalid_configuration(format!(
                "spline order {} is not supported (maximum {})",
                order, MAX_SPLINE_ORDER
            )));
        }
        Ok(Self { order })
    }

    /// The common cubic kernel.
    pub fn cubic() -> Self {
        Self { order: 3 }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Number of weights per axis.
    pub fn support_width(&self) -> usize {
        self.order + 1
    }

    /// Shift between the continuous index and the local cell:
    /// the window starts at `floor(index - offset)`.
    pub fn window_offset(&self) -> f64 {
        (self.order as f64 - 1.0) / 2.0
    }

    /// Weights of derivative order `derivative` (0, 1 or 2) at offset `u`.
    ///
    /// Only the first `order + 1` entries are meaningful; the rest are zero.
    /// Derivative orders above the spline order give all-zero weights.
    ///
    /// # Errors
    /// `InvalidConfiguration` for a derivative order above [`MAX_DERIVATIVE`].
    pub fn evaluate(&self, u: f64, derivative: usize) -> Result<WeightTable> {
        check_derivative(derivative)?;
        Ok(self.table(u, derivative))
    }

    /// `evaluate` for a derivative order already known to be at most two.
    fn table(&self, u: f64, derivative: usize) -> WeightTable {
        let mut out = [0.0; MAX_SUPPORT];
        if derivative > self.order {
            return out;
        }

        let base = uniform_weights(u, self.order - derivative);
        match derivative {
            0 => out = base,
            1 => {
                // w'[j] = b[j-1] - b[j]
                for j in 0..=self.order {
                    let left = if j > 0 { base[j - 1] } else { 0.0 };
                    let right = if j < self.order { base[j] } else { 0.0 };
                    out[j] = left - right;
                }
            }
            _ => {
                // w''[j] = b[j-2] - 2 b[j-1] + b[j]
                let width = self.order - 1;
                let at = |i: isize| -> f64 {
                    if i >= 0 && (i as usize) < width {
                        base[i as usize]
                    } else {
                        0.0
                    }
                };
                for j in 0..=self.order {
                    let j = j as isize;
                    out[j as usize] = at(j - 2) - 2.0 * at(j - 1) + at(j);
                }
            }
        }
        out
    }

    /// Centered kernel value `β_n(x)`.
    ///
    /// Evaluated by the textbook recursion, independent from [`evaluate`].
    ///
    /// [`evaluate`]: Self::evaluate
    pub fn value_at(&self, x: f64) -> f64 {
        centered_bspline(self.order, x)
    }

    /// `k`-th derivative of the centered kernel, `k ≤ 2`.
    pub fn derivative_at(&self, x: f64, k: usize) -> Result<f64> {
        check_derivative(k)?;
        Ok(self.derivatives_at(x)[k])
    }

    /// Value, first and second derivative of the centered kernel at `x`.
    pub fn derivatives_at(&self, x: f64) -> [f64; MAX_DERIVATIVE + 1] {
        let order = self.order;
        let mut out = [centered_bspline(order, x), 0.0, 0.0];
        if order >= 1 {
            let n = order - 1;
            out[1] = centered_bspline(n, x + 0.5) - centered_bspline(n, x - 0.5);
        }
        if order >= 2 {
            let n = order - 2;
            out[2] = centered_bspline(n, x + 1.0) - 2.0 * centered_bspline(n, x)
                + centered_bspline(n, x - 1.0);
        }
        out
    }
}

fn check_derivative(derivative: usize) -> Result<()> {
    if derivative > MAX_DERIVATIVE {
        return Err(TransformError::invalid_configuration(format!(
            "derivative order {} is not supported (maximum {})",
            derivative, MAX_DERIVATIVE
        )));
    }
    Ok(())
}

/// Value weights of the uniform B-spline of `order` at offset `u`.
///
/// Starts from the single order-0 weight and widens the support by one per step:
/// `w[j] = ((u + d - j) w_prev[j-1] + (j + 1 - u) w_prev[j]) / d`.
fn uniform_weights(u: f64, order: usize) -> WeightTable {
    let mut w = [0.0; MAX_SUPPORT];
    w[0] = 1.0;
    for d in 1..=order {
        let inv = 1.0 / d as f64;
        // Descending j so w[j-1] still holds the previous order.
        for j in (0..=d).rev() {
            let left = if j > 0 { (u + (d - j) as f64) * w[j - 1] } else { 0.0 };
            let right = if j < d { (j as f64 + 1.0 - u) * w[j] } else { 0.0 };
            w[j] = (left + right) * inv;
        }
    }
    w
}

fn centered_bspline(order: usize, x: f64) -> f64 {
    if order == 0 {
        return if (-0.5..0.5).contains(&x) { 1.0 } else { 0.0 };
    }
    let n = order as f64;
    let half = (n + 1.0) / 2.0;
    if x <= -half || x >= half {
        return 0.0;
    }
    ((half + x) * centered_bspline(order - 1, x + 0.5)
        + (half - x) * centered_bspline(order - 1, x - 0.5))
        / n
}

/// Value, first- and second-derivative weights of one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BasisWeights {
    order: usize,
    tables: [WeightTable; MAX_DERIVATIVE + 1],
}

impl BasisWeights {
    /// Evaluate the tables up to `max_derivative`, clamped to [`MAX_DERIVATIVE`];
    /// higher tables stay zero.
    pub fn compute(kernel: &BSplineKernel, u: f64, max_derivative: usize) -> Self {
        let mut tables = [[0.0; MAX_SUPPORT]; MAX_DERIVATIVE + 1];
        for (derivative, table) in tables
            .iter_mut()
            .enumerate()
            .take(max_derivative.min(MAX_DERIVATIVE) + 1)
        {
            *table = kernel.table(u, derivative);
        }
        Self {
            order: kernel.order(),
            tables,
        }
    }

    /// Weights of the given derivative order, `order + 1` entries.
    pub fn table(&self, derivative: usize) -> &[f64] {
        &self.tables[derivative][..=self.order]
    }

    pub fn values(&self) -> &[f64] {
        self.table(0)
    }

    pub fn first_derivatives(&self) -> &[f64] {
        self.table(1)
    }

    pub fn second_derivatives(&self) -> &[f64] {
        self.table(2)
    }
}
