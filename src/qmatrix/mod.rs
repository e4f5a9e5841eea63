//! Q matrices consumed by the SMO solver
//!
//! A Q matrix is the kernel matrix of a problem, transformed for the
//! formulation being solved:
//!
//! - classification: `Q[i][j] = y_i * y_j * K(i, j)`
//! - one-class: `Q[i][j] = K(i, j)`
//! - regression: every example appears twice, at `i` with sign +1 and at
//!   `i + l` with sign -1, so `Q[i][j] = s_i * s_j * K(i mod l, j mod l)`
//!   over a logical size of `2l`.
//!
//! Rows are filled in parallel on a cache miss and served from the
//! [`RowCache`] afterwards. Regression rows are cached once per real example
//! with sign +1; the mirrored row is a negated copy kept in a scratch buffer.

use crate::cache::{CacheStats, RowCache};
use crate::core::{Parameter, Result};
use crate::data::Problem;
use crate::kernel::KernelEvaluator;
use crate::parallel::{resolve_workers, ParallelRunner};
use log::debug;

/// Which transform a [`QMatrix`] applies to the kernel
#[derive(Debug, Clone)]
pub enum QKind {
    Classification { y: Vec<i8> },
    OneClass,
    Regression { buffers: [Vec<f32>; 2] },
}

pub struct QMatrix<'a> {
    kind: QKind,
    kernel: KernelEvaluator<'a>,
    cache: RowCache,
    runner: ParallelRunner,
    qd: Vec<f64>,
}

impl<'a> QMatrix<'a> {
    /// Q matrix for a two-class problem with label signs `y`
    pub fn classification(problem: &'a Problem, param: &Parameter, y: Vec<i8>) -> Result<Self> {
        let l = problem.len();
        Self::build(problem, param, QKind::Classification { y }, l)
    }

    pub fn one_class(problem: &'a Problem, param: &Parameter) -> Result<Self> {
        let l = problem.len();
        Self::build(problem, param, QKind::OneClass, l)
    }

    /// Q matrix over the doubled problem used by both SVR formulations
    pub fn regression(problem: &'a Problem, param: &Parameter) -> Result<Self> {
        let l = problem.len();
        let buffers = [vec![0.0; 2 * l], vec![0.0; 2 * l]];
        Self::build(problem, param, QKind::Regression { buffers }, 2 * l)
    }

    fn build(problem: &'a Problem, param: &Parameter, kind: QKind, row_len: usize) -> Result<Self> {
        let kernel = KernelEvaluator::new(problem, param)?;
        let l = problem.len();
        let runner = ParallelRunner::new(l, resolve_workers(param.workers));

        let mut diagonal = vec![0.0; l];
        runner.run_chunks(&mut diagonal, |start, chunk| {
            for (k, d) in chunk.iter_mut().enumerate() {
                *d = kernel.compute(start + k, start + k);
            }
        });
        let qd = if row_len == l {
            diagonal
        } else {
            diagonal.iter().chain(diagonal.iter()).copied().collect()
        };

        debug!(
            "Q matrix: {} rows of {} entries, {} workers",
            l,
            row_len,
            runner.workers()
        );

        Ok(Self {
            kind,
            kernel,
            cache: RowCache::new(l, row_len, param.cache_size),
            runner,
            qd,
        })
    }

    /// Logical size: number of dual variables
    pub fn len(&self) -> usize {
        self.qd.len()
    }

    pub fn is_empty(&self) -> bool {
        self.qd.is_empty()
    }

    /// Worker count used for row fills
    pub fn workers(&self) -> usize {
        self.runner.workers()
    }

    /// Diagonal `Q[i][i]`
    pub fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    /// Row `i` of Q
    pub fn get_q(&mut self, i: usize) -> &[f32] {
        self.prepare(i, 0);
        self.view(i, 0)
    }

    /// Rows `i` and `j` of Q, both valid at the same time
    pub fn get_q_pair(&mut self, i: usize, j: usize) -> (&[f32], &[f32]) {
        self.prepare(i, 0);
        self.prepare(j, 1);
        (self.view(i, 0), self.view(j, 1))
    }

    /// Single entry `Q[i][j]`, computed without the cache
    pub fn compute_q(&self, i: usize, j: usize) -> f64 {
        match &self.kind {
            QKind::Classification { y } => f64::from(y[i] * y[j]) * self.kernel.compute(i, j),
            QKind::OneClass => self.kernel.compute(i, j),
            QKind::Regression { .. } => {
                let l = self.runner.len();
                let sign = |k: usize| if k < l { 1.0 } else { -1.0 };
                sign(i) * sign(j) * self.kernel.compute(i % l, j % l)
            }
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Make row `i` readable through `view(i, slot)`
    fn prepare(&mut self, i: usize, slot: usize) {
        let l = self.runner.len();
        let real = i % l.max(1);
        self.fill(real);

        if let QKind::Regression { buffers } = &mut self.kind {
            if i >= l {
                // Resident: the fill of the other row cannot evict the row
                // requested just before it.
                let row = self.cache.peek(real).unwrap_or_default();
                for (b, &v) in buffers[slot].iter_mut().zip(row) {
                    *b = -v;
                }
            }
        }
    }

    fn view(&self, i: usize, slot: usize) -> &[f32] {
        let l = self.runner.len();
        match &self.kind {
            QKind::Regression { buffers } if i >= l => &buffers[slot],
            _ => self.cache.peek(i % l.max(1)).unwrap_or_default(),
        }
    }

    /// Compute row `real` into the cache unless it is already resident
    fn fill(&mut self, real: usize) {
        let (row, is_new) = self.cache.get_data(real);
        if !is_new {
            return;
        }

        let kernel = &self.kernel;
        match &self.kind {
            QKind::Classification { y } => {
                let y_i = y[real];
                self.runner.run_chunks(row, |start, chunk| {
                    for (k, q) in chunk.iter_mut().enumerate() {
                        let j = start + k;
                        *q = (f64::from(y_i * y[j]) * kernel.compute(real, j)) as f32;
                    }
                });
            }
            QKind::OneClass => {
                self.runner.run_chunks(row, |start, chunk| {
                    for (k, q) in chunk.iter_mut().enumerate() {
                        *q = kernel.compute(real, start + k) as f32;
                    }
                });
            }
            QKind::Regression { .. } => {
                let l = self.runner.len();
                let (positive, negative) = row.split_at_mut(l);
                self.runner
                    .run_chunks2(positive, negative, |start, pos, neg| {
                        for k in 0..pos.len() {
                            let t = kernel.compute(real, start + k);
                            pos[k] = t as f32;
                            neg[k] = -t as f32;
                        }
                    });
            }
        }
    }
}
