//! RBF (Radial Basis Function) kernel implementation
//!
//! The RBF kernel is defined as: K(x, y) = exp(-γ * ||x - y||²)
//! where γ (gamma) is a hyperparameter that controls the kernel width.
//!
//! The squared distance is expanded as ||x||² + ||y||² - 2·x^T·y so that the
//! norms of training examples can be computed once and reused for every row.

use crate::core::SparseView;
use crate::kernel::linear::dot;
use crate::kernel::Kernel;

/// RBF (Radial Basis Function) kernel: K(x, y) = exp(-γ * ||x - y||²)
///
/// The gamma parameter controls the "reach" of each training example:
/// - High gamma: close points have high influence (potential overfitting)
/// - Low gamma: distant points have influence (potential underfitting)
///
/// `1 / max_feature_index` is used when gamma is left at zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RBFKernel {
    gamma: f64,
}

impl RBFKernel {
    pub fn new(gamma: f64) -> Self {
        Self { gamma }
    }

    /// Get the gamma parameter
    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Kernel for RBFKernel {
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64 {
        self.compute_with_norms(x, y, dot(x, x), dot(y, y))
    }

    fn compute_with_norms(
        &self,
        x: SparseView<'_>,
        y: SparseView<'_>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let squared_distance = x_norm_sq + y_norm_sq - 2.0 * dot(x, y);
        (-self.gamma * squared_distance).exp()
    }
}
