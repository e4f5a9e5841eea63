//! Training dispatch for the five SVM formulations
//!
//! Each formulation maps onto the same SMO dual by choosing the Q matrix,
//! linear term, label signs, box bounds and starting point. After solving,
//! the raw dual variables are turned into decision function coefficients.

use crate::core::{OneClassInit, Parameter, Result, SVMError, SvmType};
use crate::data::Problem;
use crate::qmatrix::QMatrix;
use crate::solver::{Solution, Solver, SolverSetup, WorkingSetStrategy};
use log::info;

/// Decision function of one binary sub-problem: `f(x) = Σ α_i K(x_i, x) - ρ`
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Signed coefficient per training example (zero for non-support vectors)
    pub alpha: Vec<f64>,
    pub rho: f64,
}

/// Train a single decision function.
///
/// `cp` and `cn` are the box bounds for positive and negative examples; only
/// C-SVC uses them, the other formulations read their bounds from `param`.
pub fn train_one(problem: &Problem, param: &Parameter, cp: f64, cn: f64) -> Result<Decision> {
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }

    let solution = match param.svm_type {
        SvmType::CSvc => solve_c_svc(problem, param, cp, cn)?,
        SvmType::NuSvc => solve_nu_svc(problem, param)?,
        SvmType::OneClass => solve_one_class(problem, param)?,
        SvmType::EpsilonSvr => solve_epsilon_svr(problem, param)?,
        SvmType::NuSvr => solve_nu_svr(problem, param)?,
    };

    info!("obj = {:.6}, rho = {:.6}", solution.obj, solution.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (i, &a) in solution.alpha.iter().enumerate() {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if problem.label(i) > 0.0 {
                solution.upper_bound_p
            } else {
                solution.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    info!("nSV = {}, nBSV = {}", n_sv, n_bsv);

    Ok(Decision {
        alpha: solution.alpha,
        rho: solution.rho,
    })
}

/// Starting point of the one-class solver: a budget of `nu * l` spread over
/// leading variables, whole units first.
pub fn one_class_initial_alpha(nu: f64, l: usize, rule: OneClassInit) -> Vec<f64> {
    let n = match rule {
        OneClassInit::Scaled => (nu * l as f64) as usize,
        OneClassInit::Truncated => (nu as usize).saturating_mul(l),
    };

    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(n) {
        *a = 1.0;
    }
    if n < l {
        alpha[n] = nu * l as f64 - n as f64;
    }
    alpha
}

fn label_signs(problem: &Problem) -> Vec<i8> {
    problem
        .labels()
        .iter()
        .map(|&y| if y > 0.0 { 1 } else { -1 })
        .collect()
}

fn solve(q: &mut QMatrix<'_>, setup: SolverSetup) -> Solution {
    Solver::new(q, setup).solve()
}

fn solve_c_svc(problem: &Problem, param: &Parameter, cp: f64, cn: f64) -> Result<Solution> {
    let l = problem.len();
    let y = label_signs(problem);

    let mut q = QMatrix::classification(problem, param, y.clone())?;
    let mut si = solve(
        &mut q,
        SolverSetup {
            p: vec![-1.0; l],
            y: y.clone(),
            alpha: vec![0.0; l],
            cp,
            cn,
            eps: param.eps,
            strategy: WorkingSetStrategy::Standard,
            max_iterations: param.max_iterations,
        },
    );

    let sum_alpha: f64 = si.alpha.iter().sum();
    for (a, &s) in si.alpha.iter_mut().zip(&y) {
        *a *= f64::from(s);
    }
    if cp == cn {
        info!("nu = {:.6}", sum_alpha / (cp * l as f64));
    }

    Ok(si)
}

fn solve_nu_svc(problem: &Problem, param: &Parameter) -> Result<Solution> {
    let l = problem.len();
    let y = label_signs(problem);

    let mut sum_pos = param.nu * l as f64 / 2.0;
    let mut sum_neg = sum_pos;
    let alpha = y
        .iter()
        .map(|&s| {
            let budget = if s == 1 { &mut sum_pos } else { &mut sum_neg };
            let a = budget.min(1.0);
            *budget -= a;
            a
        })
        .collect();

    let mut q = QMatrix::classification(problem, param, y.clone())?;
    let mut si = solve(
        &mut q,
        SolverSetup {
            p: vec![0.0; l],
            y: y.clone(),
            alpha,
            cp: 1.0,
            cn: 1.0,
            eps: param.eps,
            strategy: WorkingSetStrategy::Nu,
            max_iterations: param.max_iterations,
        },
    );

    let r = si.r;
    info!("C = {:.6}", 1.0 / r);

    for (a, &s) in si.alpha.iter_mut().zip(&y) {
        *a *= f64::from(s) / r;
    }
    si.rho /= r;
    si.obj /= r * r;
    si.upper_bound_p = 1.0 / r;
    si.upper_bound_n = 1.0 / r;

    Ok(si)
}

fn solve_one_class(problem: &Problem, param: &Parameter) -> Result<Solution> {
    let l = problem.len();
    let alpha = one_class_initial_alpha(param.nu, l, param.one_class_init);

    let mut q = QMatrix::one_class(problem, param)?;
    Ok(solve(
        &mut q,
        SolverSetup {
            p: vec![0.0; l],
            y: vec![1; l],
            alpha,
            cp: 1.0,
            cn: 1.0,
            eps: param.eps,
            strategy: WorkingSetStrategy::Standard,
            max_iterations: param.max_iterations,
        },
    ))
}

/// Fold the doubled SVR variables `(α⁺, α⁻)` into `α⁺ - α⁻`
fn fold_regression(si: &mut Solution, l: usize) {
    let (upper, lower) = si.alpha.split_at_mut(l);
    for (a, b) in upper.iter_mut().zip(lower.iter()) {
        *a -= b;
    }
    si.alpha.truncate(l);
}

fn solve_epsilon_svr(problem: &Problem, param: &Parameter) -> Result<Solution> {
    let l = problem.len();
    let labels = problem.labels();

    let mut p = Vec::with_capacity(2 * l);
    p.extend(labels.iter().map(|&y| param.p - y));
    p.extend(labels.iter().map(|&y| param.p + y));
    let mut y = vec![1i8; l];
    y.resize(2 * l, -1);

    let mut q = QMatrix::regression(problem, param)?;
    let mut si = solve(
        &mut q,
        SolverSetup {
            p,
            y,
            alpha: vec![0.0; 2 * l],
            cp: param.c,
            cn: param.c,
            eps: param.eps,
            strategy: WorkingSetStrategy::Standard,
            max_iterations: param.max_iterations,
        },
    );

    fold_regression(&mut si, l);
    let sum_alpha: f64 = si.alpha.iter().map(|a| a.abs()).sum();
    info!("nu = {:.6}", sum_alpha / (param.c * l as f64));

    Ok(si)
}

fn solve_nu_svr(problem: &Problem, param: &Parameter) -> Result<Solution> {
    let l = problem.len();
    let labels = problem.labels();
    let c = param.c;

    let mut sum = c * param.nu * l as f64 / 2.0;
    let mut alpha = vec![0.0; 2 * l];
    for i in 0..l {
        let a = sum.min(c);
        alpha[i] = a;
        alpha[i + l] = a;
        sum -= a;
    }

    let mut p = Vec::with_capacity(2 * l);
    p.extend(labels.iter().map(|&y| -y));
    p.extend(labels.iter().copied());
    let mut y = vec![1i8; l];
    y.resize(2 * l, -1);

    let mut q = QMatrix::regression(problem, param)?;
    let mut si = solve(
        &mut q,
        SolverSetup {
            p,
            y,
            alpha,
            cp: c,
            cn: c,
            eps: param.eps,
            strategy: WorkingSetStrategy::Nu,
            max_iterations: param.max_iterations,
        },
    );

    info!("epsilon = {:.6}", -si.r);
    fold_regression(&mut si, l);

    Ok(si)
}
