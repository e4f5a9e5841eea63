//! Linear kernel implementation

use crate::core::SparseView;
use crate::kernel::Kernel;

/// Linear kernel: K(x, y) = x^T * y
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearKernel;

impl LinearKernel {
    /// Create a new linear kernel
    pub fn new() -> Self {
        Self
    }
}

impl Kernel for LinearKernel {
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64 {
        dot(x, y)
    }
}

/// Dot product of two sparse vectors.
///
/// Both index sequences are ascending, so a single merge pass visits each
/// entry once. Products are accumulated in scan order; every kernel relies on
/// this summation order, which keeps training results bit-reproducible.
pub fn dot(x: SparseView<'_>, y: SparseView<'_>) -> f64 {
    let mut sum = 0.0;
    let mut i = 0;
    let mut j = 0;

    while i < x.indices.len() && j < y.indices.len() {
        let x_idx = x.indices[i];
        let y_idx = y.indices[j];

        if x_idx == y_idx {
            sum += x.values[i] * y.values[j];
            i += 1;
            j += 1;
        } else if x_idx > y_idx {
            j += 1;
        } else {
            i += 1;
        }
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;

    #[test]
    fn test_linear_kernel_basic() {
        let kernel = LinearKernel::new();

        let x = SparseVector::new(vec![1, 3, 5], vec![1.0, 2.0, 3.0]);
        let y = SparseVector::new(vec![2, 3, 4], vec![1.0, 2.0, 3.0]);

        // Only index 3 overlaps: 2.0 * 2.0 = 4.0
        assert_eq!(kernel.compute(x.view(), y.view()), 4.0);
    }

    #[test]
    fn test_linear_kernel_identical() {
        let kernel = LinearKernel::new();
        let x = SparseVector::new(vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        // 1^2 + 2^2 + 3^2 = 14
        assert_eq!(kernel.compute(x.view(), x.view()), 14.0);
    }

    #[test]
    fn test_dot_no_overlap() {
        let x = SparseVector::new(vec![1, 3], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![2, 4], vec![1.0, 2.0]);
        assert_eq!(dot(x.view(), y.view()), 0.0);
    }

    #[test]
    fn test_dot_empty() {
        let x = SparseVector::empty();
        let y = SparseVector::new(vec![1, 2], vec![1.0, 2.0]);

        assert_eq!(dot(x.view(), y.view()), 0.0);
        assert_eq!(dot(y.view(), x.view()), 0.0);
    }

    #[test]
    fn test_dot_is_symmetric() {
        let x = SparseVector::new(vec![1, 3, 6], vec![1.0, 3.0, 2.0]);
        let y = SparseVector::new(vec![3, 4, 6], vec![2.0, 1.0, 4.0]);

        // 3*2 + 2*4 = 14
        assert_eq!(dot(x.view(), y.view()), 14.0);
        assert_eq!(dot(y.view(), x.view()), 14.0);
    }
}
