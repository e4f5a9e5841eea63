//! Kernel evaluation over the rows of a training problem
//!
//! [`KernelFunction`] is the closed set of kernels selected by a
//! [`Parameter`]; [`KernelEvaluator`] binds one of them to a problem so that
//! entries can be addressed by example position.

use crate::core::{KernelType, Parameter, Result, SparseView};
use crate::data::Problem;
use crate::kernel::linear::dot;
use crate::kernel::{
    Kernel, LinearKernel, PolynomialKernel, PrecomputedKernel, RBFKernel, SigmoidKernel,
};

/// Kernel chosen by `Parameter::kernel_type`, with its shape parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum KernelFunction {
    Linear(LinearKernel),
    Polynomial(PolynomialKernel),
    Rbf(RBFKernel),
    Sigmoid(SigmoidKernel),
    Precomputed(PrecomputedKernel),
}

impl KernelFunction {
    pub fn from_param(param: &Parameter) -> Self {
        match param.kernel_type {
            KernelType::Linear => KernelFunction::Linear(LinearKernel::new()),
            KernelType::Polynomial => KernelFunction::Polynomial(PolynomialKernel::new(
                param.degree,
                param.gamma,
                param.coef0,
            )),
            KernelType::Rbf => KernelFunction::Rbf(RBFKernel::new(param.gamma)),
            KernelType::Sigmoid => {
                KernelFunction::Sigmoid(SigmoidKernel::new(param.gamma, param.coef0))
            }
            KernelType::Precomputed => KernelFunction::Precomputed(PrecomputedKernel::new()),
        }
    }

    pub fn kernel_type(&self) -> KernelType {
        match self {
            KernelFunction::Linear(_) => KernelType::Linear,
            KernelFunction::Polynomial(_) => KernelType::Polynomial,
            KernelFunction::Rbf(_) => KernelType::Rbf,
            KernelFunction::Sigmoid(_) => KernelType::Sigmoid,
            KernelFunction::Precomputed(_) => KernelType::Precomputed,
        }
    }
}

impl Kernel for KernelFunction {
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64 {
        match self {
            KernelFunction::Linear(k) => k.compute(x, y),
            KernelFunction::Polynomial(k) => k.compute(x, y),
            KernelFunction::Rbf(k) => k.compute(x, y),
            KernelFunction::Sigmoid(k) => k.compute(x, y),
            KernelFunction::Precomputed(k) => k.compute(x, y),
        }
    }

    fn compute_with_norms(
        &self,
        x: SparseView<'_>,
        y: SparseView<'_>,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match self {
            KernelFunction::Rbf(k) => k.compute_with_norms(x, y, x_norm_sq, y_norm_sq),
            other => other.compute(x, y),
        }
    }
}

/// Kernel of two arbitrary vectors, as used at prediction time
pub fn kernel_value(x: SparseView<'_>, y: SparseView<'_>, param: &Parameter) -> f64 {
    KernelFunction::from_param(param).compute(x, y)
}

/// Computes `K(i, j)` between examples of one problem.
///
/// For RBF the squared norm of every example is computed once at
/// construction; other kernels leave `x_square` empty.
#[derive(Debug, Clone)]
pub struct KernelEvaluator<'a> {
    function: KernelFunction,
    problem: &'a Problem,
    x_square: Vec<f64>,
}

impl<'a> KernelEvaluator<'a> {
    pub fn new(problem: &'a Problem, param: &Parameter) -> Result<Self> {
        let function = KernelFunction::from_param(param);

        let x_square = match function {
            KernelFunction::Rbf(_) => (0..problem.len())
                .map(|i| {
                    let x = problem.x(i);
                    dot(x, x)
                })
                .collect(),
            KernelFunction::Precomputed(_) => {
                PrecomputedKernel::validate((0..problem.len()).map(|i| problem.x(i)))?;
                Vec::new()
            }
            _ => Vec::new(),
        };

        Ok(Self {
            function,
            problem,
            x_square,
        })
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.problem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problem.is_empty()
    }

    pub fn function(&self) -> &KernelFunction {
        &self.function
    }

    #[inline]
    pub fn compute(&self, i: usize, j: usize) -> f64 {
        let (x, y) = (self.problem.x(i), self.problem.x(j));
        if self.x_square.is_empty() {
            self.function.compute(x, y)
        } else {
            self.function
                .compute_with_norms(x, y, self.x_square[i], self.x_square[j])
        }
    }
}
