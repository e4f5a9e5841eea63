//! Working set selection
//!
//! Both strategies use second-order information: `i` is the maximal
//! violating index, and `j` minimizes the estimated objective decrease
//! `-(Δgrad)² / quad_coef` over the feasible partners of `i`. The `j` scan
//! runs over the solver's worker blocks; each block keeps its own minimum
//! and the block minima are reduced in order.
//!
//! Ties are resolved with `<=` everywhere, so the last minimum in index order
//! wins. Reducing block minima with the same comparison gives the same answer
//! as one sequential scan for any worker count.

use crate::qmatrix::QMatrix;
use crate::solver::smo::SolverState;

/// Curvature used when `quad_coef` is not positive
pub const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkingSetStrategy {
    /// C-SVC, one-class and epsilon-SVR
    Standard,
    /// nu-SVC and nu-SVR: `i` and `j` always share a label
    Nu,
}

/// Best `j` found so far in one block
#[derive(Debug, Clone, Copy)]
struct Candidate {
    obj_diff: f64,
    index: Option<usize>,
}

impl Candidate {
    const NONE: Candidate = Candidate {
        obj_diff: f64::MAX,
        index: None,
    };

    fn offer(&mut self, grad_diff: f64, quad_coef: f64, j: usize) {
        let quad_coef = if quad_coef > 0.0 { quad_coef } else { TAU };
        let obj_diff = -(grad_diff * grad_diff) / quad_coef;
        if obj_diff <= self.obj_diff {
            self.obj_diff = obj_diff;
            self.index = Some(j);
        }
    }

    fn reduce(blocks: Vec<Candidate>) -> Option<usize> {
        blocks
            .into_iter()
            .fold(Candidate::NONE, |best, c| {
                if c.index.is_some() && c.obj_diff <= best.obj_diff {
                    c
                } else {
                    best
                }
            })
            .index
    }
}

/// Largest violations among positive (`up`) and negative (`low`) moves
#[derive(Debug, Clone, Copy)]
struct Violation {
    gmax: f64,
    gmax_idx: Option<usize>,
    gmax2: f64,
}

impl Violation {
    fn new() -> Self {
        Self {
            gmax: f64::MIN,
            gmax_idx: None,
            gmax2: f64::MIN,
        }
    }

    fn gap(&self) -> f64 {
        self.gmax + self.gmax2
    }
}

impl WorkingSetStrategy {
    /// Pick the next pair `(i, j)`, or `None` once the duality gap is below
    /// `eps` or no admissible `j` remains.
    pub fn select(&self, state: &SolverState, q: &mut QMatrix<'_>) -> Option<(usize, usize)> {
        match self {
            WorkingSetStrategy::Standard => select_standard(state, q),
            WorkingSetStrategy::Nu => select_nu(state, q),
        }
    }

    /// Returns `(rho, r)`; `r` is only meaningful for the nu strategy
    pub fn calculate_rho(&self, state: &SolverState) -> (f64, f64) {
        match self {
            WorkingSetStrategy::Standard => (rho_standard(state), 0.0),
            WorkingSetStrategy::Nu => rho_nu(state),
        }
    }
}

fn select_standard(state: &SolverState, q: &mut QMatrix<'_>) -> Option<(usize, usize)> {
    let mut v = Violation::new();
    let g = &state.gradient;

    for t in 0..state.len() {
        if state.y[t] == 1 {
            if !state.is_upper_bound(t) && -g[t] >= v.gmax {
                v.gmax = -g[t];
                v.gmax_idx = Some(t);
            }
            if !state.is_lower_bound(t) && g[t] >= v.gmax2 {
                v.gmax2 = g[t];
            }
        } else {
            if !state.is_lower_bound(t) && g[t] >= v.gmax {
                v.gmax = g[t];
                v.gmax_idx = Some(t);
            }
            if !state.is_upper_bound(t) && -g[t] >= v.gmax2 {
                v.gmax2 = -g[t];
            }
        }
    }

    if v.gap() < state.eps {
        return None;
    }
    let i = v.gmax_idx?;
    let gmax = v.gmax;

    let q_i = q.get_q(i);
    let y_i = f64::from(state.y[i]);
    let qd = &state.qd;

    let blocks = state.runner.map_blocks(|_, range| {
        let mut best = Candidate::NONE;
        for j in range {
            if state.y[j] == 1 {
                if !state.is_lower_bound(j) {
                    let grad_diff = gmax + g[j];
                    if grad_diff > 0.0 {
                        let quad_coef = qd[i] + qd[j] - 2.0 * y_i * f64::from(q_i[j]);
                        best.offer(grad_diff, quad_coef, j);
                    }
                }
            } else if !state.is_upper_bound(j) {
                let grad_diff = gmax - g[j];
                if grad_diff > 0.0 {
                    let quad_coef = qd[i] + qd[j] + 2.0 * y_i * f64::from(q_i[j]);
                    best.offer(grad_diff, quad_coef, j);
                }
            }
        }
        best
    });

    Candidate::reduce(blocks).map(|j| (i, j))
}

fn select_nu(state: &SolverState, q: &mut QMatrix<'_>) -> Option<(usize, usize)> {
    let mut pos = Violation::new();
    let mut neg = Violation::new();
    let g = &state.gradient;

    for t in 0..state.len() {
        if state.y[t] == 1 {
            if !state.is_upper_bound(t) && -g[t] >= pos.gmax {
                pos.gmax = -g[t];
                pos.gmax_idx = Some(t);
            }
            if !state.is_lower_bound(t) && g[t] >= pos.gmax2 {
                pos.gmax2 = g[t];
            }
        } else {
            if !state.is_lower_bound(t) && g[t] >= neg.gmax {
                neg.gmax = g[t];
                neg.gmax_idx = Some(t);
            }
            if !state.is_upper_bound(t) && -g[t] >= neg.gmax2 {
                neg.gmax2 = -g[t];
            }
        }
    }

    if pos.gap().max(neg.gap()) < state.eps {
        return None;
    }

    let (ip, in_) = (pos.gmax_idx, neg.gmax_idx);
    let (q_ip, q_in): (&[f32], &[f32]) = match (ip, in_) {
        (Some(a), Some(b)) => q.get_q_pair(a, b),
        (Some(a), None) => (q.get_q(a), &[]),
        (None, Some(b)) => (&[], q.get_q(b)),
        (None, None) => return None,
    };
    let qd = &state.qd;

    let blocks = state.runner.map_blocks(|_, range| {
        let mut best = Candidate::NONE;
        for j in range {
            if state.y[j] == 1 {
                if let Some(ip) = ip {
                    if !state.is_lower_bound(j) {
                        let grad_diff = pos.gmax + g[j];
                        if grad_diff > 0.0 {
                            let quad_coef = qd[ip] + qd[j] - 2.0 * f64::from(q_ip[j]);
                            best.offer(grad_diff, quad_coef, j);
                        }
                    }
                }
            } else if let Some(in_) = in_ {
                if !state.is_upper_bound(j) {
                    let grad_diff = neg.gmax - g[j];
                    if grad_diff > 0.0 {
                        let quad_coef = qd[in_] + qd[j] - 2.0 * f64::from(q_in[j]);
                        best.offer(grad_diff, quad_coef, j);
                    }
                }
            }
        }
        best
    });

    let j = Candidate::reduce(blocks)?;
    let i = if state.y[j] == 1 { ip } else { in_ }?;
    Some((i, j))
}

fn rho_standard(state: &SolverState) -> f64 {
    let mut ub = f64::MAX;
    let mut lb = f64::MIN;
    let mut sum_free = 0.0;
    let mut nr_free = 0usize;

    for i in 0..state.len() {
        let y = f64::from(state.y[i]);
        let y_g = y * state.gradient[i];
        if state.is_upper_bound(i) {
            if state.y[i] == -1 {
                ub = ub.min(y_g);
            } else {
                lb = lb.max(y_g);
            }
        } else if state.is_lower_bound(i) {
            if state.y[i] == 1 {
                ub = ub.min(y_g);
            } else {
                lb = lb.max(y_g);
            }
        } else {
            nr_free += 1;
            sum_free += y_g;
        }
    }

    if nr_free > 0 {
        sum_free / nr_free as f64
    } else {
        (ub + lb) / 2.0
    }
}

fn rho_nu(state: &SolverState) -> (f64, f64) {
    // Index 0 collects y = +1, index 1 collects y = -1
    let mut ub = [f64::MAX; 2];
    let mut lb = [f64::MIN; 2];
    let mut sum_free = [0.0; 2];
    let mut nr_free = [0usize; 2];

    for i in 0..state.len() {
        let side = usize::from(state.y[i] != 1);
        let g = state.gradient[i];
        if state.is_upper_bound(i) {
            lb[side] = lb[side].max(g);
        } else if state.is_lower_bound(i) {
            ub[side] = ub[side].min(g);
        } else {
            nr_free[side] += 1;
            sum_free[side] += g;
        }
    }

    let r = |side: usize| {
        if nr_free[side] > 0 {
            sum_free[side] / nr_free[side] as f64
        } else {
            (ub[side] + lb[side]) / 2.0
        }
    };
    let (r1, r2) = (r(0), r(1));
    ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::smo::BoundStatus;

    #[test]
    fn test_candidate_ties_keep_last() {
        let mut best = Candidate::NONE;
        best.offer(1.0, 1.0, 3);
        best.offer(1.0, 1.0, 7);
        assert_eq!(best.index, Some(7));

        best.offer(0.5, 1.0, 9); // smaller decrease
        assert_eq!(best.index, Some(7));
    }

    #[test]
    fn test_candidate_tau_fallback() {
        let mut best = Candidate::NONE;
        best.offer(1.0, 0.0, 2);
        assert_eq!(best.index, Some(2));
        assert_eq!(best.obj_diff, -1.0 / TAU);
    }

    #[test]
    fn test_reduce_matches_sequential_scan() {
        let a = Candidate {
            obj_diff: -2.0,
            index: Some(1),
        };
        let b = Candidate {
            obj_diff: -2.0,
            index: Some(5),
        };
        let c = Candidate {
            obj_diff: -1.0,
            index: Some(8),
        };
        assert_eq!(Candidate::reduce(vec![a, b, c]), Some(5));
        assert_eq!(Candidate::reduce(vec![Candidate::NONE, Candidate::NONE]), None);
    }

    fn state(y: Vec<i8>, alpha: Vec<f64>, gradient: Vec<f64>, c: f64) -> SolverState {
        SolverState::for_test(y, alpha, gradient, c)
    }

    #[test]
    fn test_rho_uses_free_average() {
        // Two free variables with y*G = 0.2 and 0.4
        let s = state(vec![1, -1], vec![0.5, 0.5], vec![0.2, -0.4], 1.0);
        assert_eq!(s.status, vec![BoundStatus::Free, BoundStatus::Free]);
        let (rho, r) = WorkingSetStrategy::Standard.calculate_rho(&s);
        assert!((rho - 0.3).abs() < 1e-12);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn test_rho_without_free_variables() {
        // At the lower bound: y=+1 gives ub = 1.0, y=-1 gives lb = 0.5
        let s = state(vec![1, -1], vec![0.0, 0.0], vec![1.0, -0.5], 1.0);
        let (rho, _) = WorkingSetStrategy::Standard.calculate_rho(&s);
        assert!((rho - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_rho_nu_two_sides() {
        let s = state(vec![1, -1], vec![0.5, 0.5], vec![0.6, 0.2], 1.0);
        let (rho, r) = WorkingSetStrategy::Nu.calculate_rho(&s);
        assert!((rho - 0.2).abs() < 1e-12);
        assert!((r - 0.4).abs() < 1e-12);
    }
}
