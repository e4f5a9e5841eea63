//! Kernel trait definition

use crate::core::SparseView;

/// Kernel function trait
///
/// A kernel maps two sparse vectors to a similarity score. Implementations
/// are stateless apart from their shape parameters, so one value can be
/// shared by every worker of a parallel row fill.
pub trait Kernel: Send + Sync {
    /// Compute kernel value K(x, y)
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64;

    /// Compute K(x, y) when the squared norms of both vectors are known.
    ///
    /// Only distance-based kernels (RBF) make use of the norms.
    fn compute_with_norms(
        &self,
        x: SparseView<'_>,
        y: SparseView<'_>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        let _ = (x_norm_sq, y_norm_sq);
        self.compute(x, y)
    }
}
