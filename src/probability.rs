//! Probability calibration
//!
//! Binary decision values are mapped to probabilities with Platt's sigmoid
//! `1 / (1 + exp(A f + B))`, fitted on decision values obtained by internal
//! 5-fold cross-validation. Pairwise probabilities of a multi-class model are
//! coupled into per-class probabilities. Regression models get the scale of
//! a Laplace noise model instead.

use crate::core::{ClassWeight, Parameter, Result};
use crate::data::Problem;
use crate::model::Model;
use crate::validation::cross_validation;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

const CALIBRATION_FOLDS: usize = 5;

/// Probability of the positive class for decision value `f`
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Negative log-likelihood of the regularized targets under `(a, b)`
fn sigmoid_objective(decision_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decision_values
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let f_apb = f * a + b;
            if f_apb >= 0.0 {
                t * f_apb + (-f_apb).exp().ln_1p()
            } else {
                (t - 1.0) * f_apb + f_apb.exp().ln_1p()
            }
        })
        .sum()
}

/// Fit Platt's sigmoid to decision values and their `±1` labels.
///
/// Newton's method with backtracking line search. When the line search
/// cannot make progress the best iterate so far is returned.
pub fn sigmoid_train(decision_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = sigmoid_objective(decision_values, &targets, a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        let (mut h11, mut h22, mut h21) = (SIGMA, SIGMA, 0.0);
        let (mut g1, mut g2) = (0.0, 0.0);
        for (&f, &t) in decision_values.iter().zip(&targets) {
            let f_apb = f * a + b;
            let (p, q) = if f_apb >= 0.0 {
                let e = (-f_apb).exp();
                (e / (1.0 + e), 1.0 / (1.0 + e))
            } else {
                let e = f_apb.exp();
                (1.0 / (1.0 + e), e / (1.0 + e))
            };
            let d2 = p * q;
            h11 += f * f * d2;
            h22 += d2;
            h21 += f * d2;
            let d1 = t - p;
            g1 += f * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let da = -(h22 * g1 - h21 * g2) / det;
        let db = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * da + g2 * db;

        let mut step = 1.0;
        while step >= MIN_STEP {
            let (new_a, new_b) = (a + step * da, b + step * db);
            let new_f = sigmoid_objective(decision_values, &targets, new_a, new_b);
            if new_f < fval + 0.0001 * step * gd {
                a = new_a;
                b = new_b;
                fval = new_f;
                break;
            }
            step /= 2.0;
        }

        if step < MIN_STEP {
            warn!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        warn!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// Couple pairwise probabilities `r[i][j] = P(class i | class i or j)` into
/// per-class probabilities that sum to one.
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = k.max(100);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    for t in 0..k {
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in t + 1..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut p = vec![1.0 / k as f64; k];
    let mut qp = vec![0.0; k];
    let mut iter = 0;
    while iter < max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = q[t].iter().zip(&p).map(|(a, b)| a * b).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - pqp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[t][t];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("exceeds max_iter in multiclass_prob");
    }
    p
}

/// Sigmoid parameters `(A, B)` for one binary sub-problem with `±1` labels.
///
/// Decision values come from 5-fold cross-validation on the sub-problem,
/// trained with `C = 1` and per-class weights `cp` and `cn`.
pub fn binary_svc_probability(
    problem: &Problem,
    param: &Parameter,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
) -> Result<(f64, f64)> {
    let l = problem.len();
    let mut perm: Vec<usize> = (0..l).collect();
    perm.shuffle(rng);

    let mut sub_param = param.clone();
    sub_param.probability = false;
    sub_param.c = 1.0;
    sub_param.weights = vec![
        ClassWeight {
            label: 1,
            weight: cp,
        },
        ClassWeight {
            label: -1,
            weight: cn,
        },
    ];

    let mut decision_values = vec![0.0; l];
    for fold in 0..CALIBRATION_FOLDS {
        let begin = fold * l / CALIBRATION_FOLDS;
        let end = (fold + 1) * l / CALIBRATION_FOLDS;
        let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let held_out = &perm[begin..end];

        let positives = train.iter().filter(|&&i| problem.label(i) > 0.0).count();
        let negatives = train.len() - positives;

        match (positives, negatives) {
            (0, 0) => held_out.iter().for_each(|&i| decision_values[i] = 0.0),
            (_, 0) => held_out.iter().for_each(|&i| decision_values[i] = 1.0),
            (0, _) => held_out.iter().for_each(|&i| decision_values[i] = -1.0),
            _ => {
                let sub_model = Model::fit(&problem.subset(&train), &sub_param)?;
                let sign = f64::from(sub_model.labels()[0]);
                for &i in held_out {
                    let (_, values) = sub_model.predict_values(problem.x(i));
                    decision_values[i] = values[0] * sign;
                }
            }
        }
    }

    Ok(sigmoid_train(&decision_values, problem.labels()))
}

/// Scale `sigma` of the Laplace model `target = prediction + z`,
/// `p(z) = exp(-|z| / sigma) / (2 sigma)`, from 5-fold cross-validation
/// residuals with outliers beyond five standard deviations removed.
pub fn svr_probability(problem: &Problem, param: &Parameter) -> Result<f64> {
    let mut sub_param = param.clone();
    sub_param.probability = false;

    let predictions = cross_validation(problem, &sub_param, CALIBRATION_FOLDS)?;
    let residuals: Vec<f64> = problem
        .labels()
        .iter()
        .zip(&predictions)
        .map(|(y, p)| y - p)
        .collect();

    let l = residuals.len() as f64;
    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let sigma = kept.iter().sum::<f64>() / kept.len() as f64;

    info!(
        "Prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
        sigma
    );
    Ok(sigma)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector, SvmType};
    use approx::assert_relative_eq;
    use rand::SeedableRng;

    #[test]
    fn test_sigmoid_predict_is_stable() {
        assert_relative_eq!(sigmoid_predict(0.0, 1.0, 0.0), 0.5);
        // Large |A f + B| must not overflow either branch
        assert!(sigmoid_predict(1000.0, 1.0, 0.0) < 1e-300);
        assert_relative_eq!(sigmoid_predict(-1000.0, 1.0, 0.0), 1.0);
        assert!(sigmoid_predict(2.0, -1.0, 0.0) > 0.5);
    }

    #[test]
    fn test_sigmoid_train_orients_with_labels() {
        let values = [2.0, 1.5, 1.0, 0.3, -0.2, -1.0, -1.5, -2.0];
        let labels = [1.0, 1.0, 1.0, -1.0, 1.0, -1.0, -1.0, -1.0];
        let (a, b) = sigmoid_train(&values, &labels);

        // Positive decision values must map to high probability
        assert!(a < 0.0);
        assert!(sigmoid_predict(2.0, a, b) > 0.8);
        assert!(sigmoid_predict(-2.0, a, b) < 0.2);
    }

    #[test]
    fn test_multiclass_probability_two_classes() {
        let r = vec![vec![0.0, 0.8], vec![0.2, 0.0]];
        let p = multiclass_probability(&r);
        assert_relative_eq!(p[0], 0.8, epsilon = 1e-2);
        assert_relative_eq!(p[0] + p[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_multiclass_probability_uniform() {
        let r = vec![vec![0.5; 3]; 3];
        let p = multiclass_probability(&r);
        for v in p {
            assert_relative_eq!(v, 1.0 / 3.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_binary_svc_probability_is_seeded() {
        let examples: Vec<(f64, SparseVector)> = (0..12)
            .map(|k| {
                let y = if k % 2 == 0 { 1.0 } else { -1.0 };
                let x = y * (1.0 + k as f64 / 10.0);
                (y, SparseVector::new(vec![1], vec![x]))
            })
            .collect();
        let problem = Problem::from_vectors(examples);
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear);

        let first =
            binary_svc_probability(&problem, &param, 1.0, 1.0, &mut StdRng::seed_from_u64(3))
                .unwrap();
        let second =
            binary_svc_probability(&problem, &param, 1.0, 1.0, &mut StdRng::seed_from_u64(3))
                .unwrap();
        assert_eq!(first, second);
        assert!(first.0 < 0.0);
    }

    #[test]
    fn test_svr_probability_positive_sigma() {
        let examples: Vec<(f64, SparseVector)> = (0..20)
            .map(|k| {
                let x = k as f64 / 10.0;
                let noise = if k % 3 == 0 { 0.1 } else { -0.05 };
                (3.0 * x + noise, SparseVector::new(vec![1], vec![x]))
            })
            .collect();
        let problem = Problem::from_vectors(examples);
        let param = Parameter::new(SvmType::EpsilonSvr, KernelType::Linear)
            .with_c(10.0)
            .with_seed(11);

        let sigma = svr_probability(&problem, &param).unwrap();
        assert!(sigma > 0.0);
        assert!(sigma < 1.0);
    }
}
