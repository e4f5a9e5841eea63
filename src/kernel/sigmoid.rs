//! Sigmoid (Tanh) Kernel Implementation
//!
//! K(x, y) = tanh(γ * <x, y> + r)
//!
//! The kernel is bounded in [-1, 1] and is not positive semi-definite for
//! every choice of γ and r. The solver tolerates an indefinite Q matrix
//! through its TAU fallback, so no parameter restriction is enforced here.

use crate::core::SparseView;
use crate::kernel::linear::dot;
use crate::kernel::traits::Kernel;

/// Sigmoid (Hyperbolic Tangent) kernel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmoidKernel {
    /// Scaling parameter for the dot product
    pub gamma: f64,
    /// Bias/offset parameter
    pub coef0: f64,
}

impl SigmoidKernel {
    pub fn new(gamma: f64, coef0: f64) -> Self {
        Self { gamma, coef0 }
    }
}

impl Kernel for SigmoidKernel {
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64 {
        (self.gamma * dot(x, y) + self.coef0).tanh()
    }
}
