//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the dual problem shared by every SVM formulation:
//!
//! ```text
//! min  ½ αᵀQα + pᵀα
//! s.t. yᵀα = Δ,  0 ≤ α_t ≤ C_t
//! ```
//!
//! Each iteration picks a pair `(i, j)` with a [`WorkingSetStrategy`],
//! solves the two-variable sub-problem analytically, clips the result to the
//! box, and propagates the change into the gradient. The gradient update
//! touches every index and runs over the Q matrix's worker blocks.

use crate::qmatrix::QMatrix;
use crate::parallel::ParallelRunner;
use crate::solver::working_set::{WorkingSetStrategy, TAU};
use log::{debug, info, warn};

/// Iterations between progress messages
const PROGRESS_INTERVAL: usize = 1000;

/// Where a dual variable sits relative to its box `[0, C]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Lifecycle of a [`Solver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    Iterating,
    Converged,
    IterationLimit,
}

/// Inputs of one solver run
#[derive(Debug, Clone)]
pub struct SolverSetup {
    /// Linear term
    pub p: Vec<f64>,
    /// Label signs, +1 or -1
    pub y: Vec<i8>,
    /// Feasible starting point
    pub alpha: Vec<f64>,
    /// Upper bound for variables with y = +1
    pub cp: f64,
    /// Upper bound for variables with y = -1
    pub cn: f64,
    pub eps: f64,
    pub strategy: WorkingSetStrategy,
    /// Overrides the default iteration cap
    pub max_iterations: Option<usize>,
}

/// Result of a finished solver run
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub obj: f64,
    pub rho: f64,
    /// Auxiliary offset of the nu formulations, 0 otherwise
    pub r: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    pub alpha: Vec<f64>,
    pub iterations: usize,
    pub converged: bool,
}

/// Mutable optimization state read by working set selection
#[derive(Debug, Clone)]
pub struct SolverState {
    pub y: Vec<i8>,
    pub alpha: Vec<f64>,
    pub status: Vec<BoundStatus>,
    pub gradient: Vec<f64>,
    pub p: Vec<f64>,
    pub qd: Vec<f64>,
    pub cp: f64,
    pub cn: f64,
    pub eps: f64,
    pub runner: ParallelRunner,
}

impl SolverState {
    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// Box bound of variable `i`
    #[inline]
    pub fn c(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    #[inline]
    pub fn is_upper_bound(&self, i: usize) -> bool {
        self.status[i] == BoundStatus::UpperBound
    }

    #[inline]
    pub fn is_lower_bound(&self, i: usize) -> bool {
        self.status[i] == BoundStatus::LowerBound
    }

    fn update_status(&mut self, i: usize) {
        self.status[i] = if self.alpha[i] >= self.c(i) {
            BoundStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            BoundStatus::LowerBound
        } else {
            BoundStatus::Free
        };
    }

    /// ½ Σ α_t (G_t + p_t)
    fn objective(&self) -> f64 {
        let v: f64 = self
            .alpha
            .iter()
            .zip(&self.gradient)
            .zip(&self.p)
            .map(|((a, g), p)| a * (g + p))
            .sum();
        v / 2.0
    }

    #[cfg(test)]
    pub(crate) fn for_test(y: Vec<i8>, alpha: Vec<f64>, gradient: Vec<f64>, c: f64) -> Self {
        let l = y.len();
        let mut state = Self {
            y,
            alpha,
            status: vec![BoundStatus::Free; l],
            gradient,
            p: vec![0.0; l],
            qd: vec![1.0; l],
            cp: c,
            cn: c,
            eps: 1e-3,
            runner: ParallelRunner::new(l, 1),
        };
        for i in 0..l {
            state.update_status(i);
        }
        state
    }
}

/// SMO solver borrowing a Q matrix for one run
pub struct Solver<'q, 'a> {
    q: &'q mut QMatrix<'a>,
    state: SolverState,
    strategy: WorkingSetStrategy,
    status: SolverStatus,
    iterations: usize,
    max_iterations: usize,
}

/// Default iteration cap for `l` variables
pub fn default_max_iterations(l: usize) -> usize {
    let limit = i32::MAX as usize;
    let scaled = if l > limit / 100 { limit } else { 100 * l };
    scaled.max(10_000_000)
}

impl<'q, 'a> Solver<'q, 'a> {
    /// Set up bound status and the initial gradient `G = p + Qα`.
    ///
    /// # Panics
    /// Panics if the lengths in `setup` differ from `q.len()`
    pub fn new(q: &'q mut QMatrix<'a>, setup: SolverSetup) -> Self {
        let l = q.len();
        assert_eq!(setup.p.len(), l, "linear term length must match Q");
        assert_eq!(setup.y.len(), l, "label length must match Q");
        assert_eq!(setup.alpha.len(), l, "alpha length must match Q");

        let runner = ParallelRunner::new(l, q.workers());
        let mut state = SolverState {
            gradient: setup.p.clone(),
            status: vec![BoundStatus::Free; l],
            qd: q.get_qd().to_vec(),
            y: setup.y,
            alpha: setup.alpha,
            p: setup.p,
            cp: setup.cp,
            cn: setup.cn,
            eps: setup.eps,
            runner,
        };
        for i in 0..l {
            state.update_status(i);
        }

        // Rows of variables at zero add nothing
        for i in 0..l {
            let alpha_i = state.alpha[i];
            if alpha_i == 0.0 {
                continue;
            }
            let q_i = q.get_q(i);
            state.runner.run_chunks(&mut state.gradient, |start, chunk| {
                for (k, g) in chunk.iter_mut().enumerate() {
                    *g += alpha_i * f64::from(q_i[start + k]);
                }
            });
        }

        Self {
            q,
            state,
            strategy: setup.strategy,
            status: SolverStatus::Iterating,
            iterations: 0,
            max_iterations: setup
                .max_iterations
                .unwrap_or_else(|| default_max_iterations(l)),
        }
    }

    pub fn status(&self) -> SolverStatus {
        self.status
    }

    pub fn alpha(&self) -> &[f64] {
        &self.state.alpha
    }

    pub fn gradient(&self) -> &[f64] {
        &self.state.gradient
    }

    pub fn bound_status(&self) -> &[BoundStatus] {
        &self.state.status
    }

    /// Upper bound of variable `i`
    pub fn upper_bound(&self, i: usize) -> f64 {
        self.state.c(i)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Current dual objective
    pub fn objective(&self) -> f64 {
        self.state.objective()
    }

    /// Run one iteration. Once the status leaves `Iterating` further calls
    /// do nothing.
    pub fn step(&mut self) -> SolverStatus {
        if self.status != SolverStatus::Iterating {
            return self.status;
        }
        if self.iterations >= self.max_iterations {
            warn!(
                "Reached max number of iterations ({}) before convergence",
                self.max_iterations
            );
            self.status = SolverStatus::IterationLimit;
            return self.status;
        }

        match self.strategy.select(&self.state, self.q) {
            None => {
                self.status = SolverStatus::Converged;
            }
            Some((i, j)) => {
                self.iterations += 1;
                self.update_pair(i, j);
                if self.iterations % PROGRESS_INTERVAL == 0 {
                    debug!(
                        "iter {}: obj = {:.6}",
                        self.iterations,
                        self.state.objective()
                    );
                }
            }
        }
        self.status
    }

    /// Iterate until convergence or the iteration cap
    pub fn solve(mut self) -> Solution {
        while self.step() == SolverStatus::Iterating {}

        let (rho, r) = self.strategy.calculate_rho(&self.state);
        let obj = self.state.objective();
        let stats = self.q.cache_stats();

        info!("optimization finished, #iter = {}", self.iterations);
        debug!(
            "cache: {} hits, {} misses, hit rate {:.3}",
            stats.hits,
            stats.misses,
            stats.hit_rate()
        );

        Solution {
            obj,
            rho,
            r,
            upper_bound_p: self.state.cp,
            upper_bound_n: self.state.cn,
            alpha: self.state.alpha,
            iterations: self.iterations,
            converged: self.status == SolverStatus::Converged,
        }
    }

    /// Solve the two-variable sub-problem on `(i, j)` and update the gradient
    fn update_pair(&mut self, i: usize, j: usize) {
        let (q_i, q_j) = self.q.get_q_pair(i, j);
        let s = &mut self.state;

        let c_i = s.c(i);
        let c_j = s.c(j);
        let old_alpha_i = s.alpha[i];
        let old_alpha_j = s.alpha[j];
        let q_ij = f64::from(q_i[j]);

        if s.y[i] != s.y[j] {
            let quad_coef = positive_or_tau(s.qd[i] + s.qd[j] + 2.0 * q_ij);
            let delta = (-s.gradient[i] - s.gradient[j]) / quad_coef;
            let diff = s.alpha[i] - s.alpha[j];
            s.alpha[i] += delta;
            s.alpha[j] += delta;

            if diff > 0.0 {
                if s.alpha[j] < 0.0 {
                    s.alpha[j] = 0.0;
                    s.alpha[i] = diff;
                }
            } else if s.alpha[i] < 0.0 {
                s.alpha[i] = 0.0;
                s.alpha[j] = -diff;
            }

            if diff > c_i - c_j {
                if s.alpha[i] > c_i {
                    s.alpha[i] = c_i;
                    s.alpha[j] = c_i - diff;
                }
            } else if s.alpha[j] > c_j {
                s.alpha[j] = c_j;
                s.alpha[i] = c_j + diff;
            }
        } else {
            let quad_coef = positive_or_tau(s.qd[i] + s.qd[j] - 2.0 * q_ij);
            let delta = (s.gradient[i] - s.gradient[j]) / quad_coef;
            let sum = s.alpha[i] + s.alpha[j];
            s.alpha[i] -= delta;
            s.alpha[j] += delta;

            if sum > c_i {
                if s.alpha[i] > c_i {
                    s.alpha[i] = c_i;
                    s.alpha[j] = sum - c_i;
                }
            } else if s.alpha[j] < 0.0 {
                s.alpha[j] = 0.0;
                s.alpha[i] = sum;
            }

            if sum > c_j {
                if s.alpha[j] > c_j {
                    s.alpha[j] = c_j;
                    s.alpha[i] = sum - c_j;
                }
            } else if s.alpha[i] < 0.0 {
                s.alpha[i] = 0.0;
                s.alpha[j] = sum;
            }
        }

        let delta_alpha_i = s.alpha[i] - old_alpha_i;
        let delta_alpha_j = s.alpha[j] - old_alpha_j;

        s.runner.run_chunks(&mut s.gradient, |start, chunk| {
            for (k, g) in chunk.iter_mut().enumerate() {
                let t = start + k;
                *g += f64::from(q_i[t]) * delta_alpha_i + f64::from(q_j[t]) * delta_alpha_j;
            }
        });

        s.update_status(i);
        s.update_status(j);
    }
}

#[inline]
fn positive_or_tau(quad_coef: f64) -> f64 {
    if quad_coef > 0.0 {
        quad_coef
    } else {
        TAU
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, Parameter, SparseVector};
    use crate::data::Problem;
    use approx::assert_relative_eq;

    fn two_points() -> Problem {
        Problem::from_vectors(vec![
            (1.0, SparseVector::new(vec![1], vec![1.0])),
            (-1.0, SparseVector::new(vec![1], vec![-1.0])),
        ])
    }

    fn c_svc_setup(y: Vec<i8>, c: f64) -> SolverSetup {
        let l = y.len();
        SolverSetup {
            p: vec![-1.0; l],
            y,
            alpha: vec![0.0; l],
            cp: c,
            cn: c,
            eps: 1e-3,
            strategy: WorkingSetStrategy::Standard,
            max_iterations: None,
        }
    }

    #[test]
    fn test_default_max_iterations() {
        assert_eq!(default_max_iterations(10), 10_000_000);
        assert_eq!(default_max_iterations(1_000_000), 100_000_000);
        assert_eq!(default_max_iterations(i32::MAX as usize), i32::MAX as usize);
    }

    #[test]
    fn test_two_point_problem() {
        let prob = two_points();
        let param = Parameter::default().with_kernel(KernelType::Linear);
        let mut q = QMatrix::classification(&prob, &param, vec![1, -1]).unwrap();
        let solution = Solver::new(&mut q, c_svc_setup(vec![1, -1], 1.0)).solve();

        // Both points are support vectors with alpha = 0.5, w = 1, b = 0
        assert!(solution.converged);
        assert!(solution.iterations <= 2);
        assert_relative_eq!(solution.alpha[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(solution.alpha[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(solution.rho, 0.0, epsilon = 1e-9);
        assert_relative_eq!(solution.obj, -0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_step_keeps_box_and_decreases_objective() {
        let prob = Problem::from_vectors(
            (0..12)
                .map(|k| {
                    let x = k as f64 / 4.0 - 1.4;
                    let y = if (k * 7) % 5 < 2 { 1.0 } else { -1.0 };
                    (y, SparseVector::new(vec![1, 2], vec![x, (k % 3) as f64]))
                })
                .collect(),
        );
        let y: Vec<i8> = prob.labels().iter().map(|&v| if v > 0.0 { 1 } else { -1 }).collect();
        let param = Parameter::default().with_gamma(0.5).with_workers(3);
        let mut q = QMatrix::classification(&prob, &param, y.clone()).unwrap();
        let mut solver = Solver::new(&mut q, c_svc_setup(y, 2.0));

        let mut last = solver.objective();
        while solver.step() == SolverStatus::Iterating {
            for (k, &a) in solver.alpha().iter().enumerate() {
                assert!(a >= 0.0 && a <= solver.upper_bound(k), "alpha[{k}] = {a}");
            }
            let obj = solver.objective();
            assert!(obj <= last + 1e-9, "objective rose from {last} to {obj}");
            last = obj;
        }
        assert_eq!(solver.status(), SolverStatus::Converged);
    }

    #[test]
    fn test_iteration_limit() {
        let prob = two_points();
        let param = Parameter::default().with_kernel(KernelType::Linear);
        let mut q = QMatrix::classification(&prob, &param, vec![1, -1]).unwrap();
        let mut setup = c_svc_setup(vec![1, -1], 1.0);
        setup.max_iterations = Some(0);

        let mut solver = Solver::new(&mut q, setup);
        assert_eq!(solver.step(), SolverStatus::IterationLimit);
        assert_eq!(solver.step(), SolverStatus::IterationLimit);

        let solution = solver.solve();
        assert!(!solution.converged);
        assert_eq!(solution.iterations, 0);
    }

    #[test]
    fn test_gradient_initialized_from_alpha() {
        let prob = two_points();
        let param = Parameter::default().with_kernel(KernelType::Linear);
        let mut q = QMatrix::classification(&prob, &param, vec![1, -1]).unwrap();
        let mut setup = c_svc_setup(vec![1, -1], 1.0);
        setup.alpha = vec![0.25, 0.25];

        // Q = [[1, 1], [1, 1]], G = -1 + 0.5
        let solver = Solver::new(&mut q, setup);
        assert_relative_eq!(solver.gradient()[0], -0.5, epsilon = 1e-12);
        assert_relative_eq!(solver.gradient()[1], -0.5, epsilon = 1e-12);
        assert_eq!(solver.bound_status()[0], BoundStatus::Free);
    }
}
