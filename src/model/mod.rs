//! Trained SVM models
//!
//! A [`Model`] holds the support vectors and dual coefficients of every
//! decision function produced by training. Classification with `k` classes
//! trains one decision function per class pair (one-vs-one) and stores the
//! coefficients in the libsvm layout: `sv_coef` has `k - 1` rows, and the
//! coefficient of support vector `s` of class `m` in classifier `(i, j)`
//! lives in row `j - 1` when `m == i` and in row `i` when `m == j`.
//!
//! Regression and one-class models hold a single decision function.

pub mod io;
pub mod predict;

use crate::core::{
    FeatureSpace, Parameter, Result, SVMError, SVMModel, SparseView, SvmType,
};
use crate::data::Problem;
use crate::probability::{binary_svc_probability, svr_probability};
use crate::trainer::{train_one, Decision};
use crate::utils::rng_from_seed;
use log::{info, warn};
use std::iter;

/// Examples grouped by class label
///
/// Labels keep their order of first appearance, except that a `{-1, +1}`
/// problem seen `-1` first is swapped so that `+1` is the positive class.
/// `perm[start[c]..start[c] + count[c]]` are the example indices of class `c`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClassGroups {
    pub labels: Vec<i32>,
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    pub perm: Vec<usize>,
}

impl ClassGroups {
    pub fn new(problem: &Problem) -> Self {
        let mut labels: Vec<i32> = Vec::new();
        let mut count: Vec<usize> = Vec::new();
        let mut class_of = Vec::with_capacity(problem.len());

        for &y in problem.labels() {
            let y = y as i32;
            let c = match labels.iter().position(|&l| l == y) {
                Some(c) => {
                    count[c] += 1;
                    c
                }
                None => {
                    labels.push(y);
                    count.push(1);
                    labels.len() - 1
                }
            };
            class_of.push(c);
        }

        if labels == [-1, 1] {
            labels.swap(0, 1);
            count.swap(0, 1);
            for c in class_of.iter_mut() {
                *c = 1 - *c;
            }
        }

        let start = Self::starts(&count);
        let mut next = start.clone();
        let mut perm = vec![0; problem.len()];
        for (i, &c) in class_of.iter().enumerate() {
            perm[next[c]] = i;
            next[c] += 1;
        }

        Self {
            labels,
            start,
            count,
            perm,
        }
    }

    fn starts(count: &[usize]) -> Vec<usize> {
        count
            .iter()
            .scan(0, |acc, &n| {
                let s = *acc;
                *acc += n;
                Some(s)
            })
            .collect()
    }

    pub fn nr_class(&self) -> usize {
        self.labels.len()
    }

    /// Positions in `perm` holding the examples of class `c`
    pub fn range(&self, c: usize) -> std::ops::Range<usize> {
        self.start[c]..self.start[c] + self.count[c]
    }
}

/// `(i, j)` for `i < j`, in decision-value order
pub(crate) fn class_pairs(nr_class: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..nr_class).flat_map(move |i| (i + 1..nr_class).map(move |j| (i, j)))
}

/// A trained SVM
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    param: Parameter,
    nr_class: usize,
    labels: Vec<i32>,
    rho: Vec<f64>,
    n_sv: Vec<usize>,
    /// Row `s` holds support vector `s`
    sv_space: FeatureSpace,
    sv_coef: Vec<Vec<f64>>,
    sv_indices: Vec<usize>,
    prob_a: Vec<f64>,
    prob_b: Vec<f64>,
}

impl Model {
    /// Train a model on `problem`
    ///
    /// Parameters are validated first; nu-SVC additionally checks that nu is
    /// feasible for the class sizes of the problem.
    pub fn train(problem: &Problem, param: &Parameter) -> Result<Self> {
        param.validate()?;
        param.check_feasibility(problem.labels())?;
        Self::fit(problem, param)
    }

    /// Train without checking `param`, for sub-problems of an already
    /// validated training run
    pub(crate) fn fit(problem: &Problem, param: &Parameter) -> Result<Self> {
        if problem.is_empty() {
            return Err(SVMError::EmptyDataset);
        }

        if param.svm_type.is_classification() {
            Self::train_classifier(problem, param)
        } else {
            Self::train_single(problem, param)
        }
    }

    fn train_single(problem: &Problem, param: &Parameter) -> Result<Self> {
        let prob_a = if param.probability && param.svm_type.is_regression() {
            vec![svr_probability(problem, param)?]
        } else {
            Vec::new()
        };

        let Decision { alpha, rho } = train_one(problem, param, 0.0, 0.0)?;

        let mut sv_space = FeatureSpace::new();
        let mut coef = Vec::new();
        let mut sv_indices = Vec::new();
        for (i, &a) in alpha.iter().enumerate() {
            if a.abs() > 0.0 {
                sv_space.push_row(problem.x(i));
                coef.push(a);
                sv_indices.push(i + 1);
            }
        }

        Ok(Self {
            param: param.clone(),
            nr_class: 2,
            labels: Vec::new(),
            rho: vec![rho],
            n_sv: Vec::new(),
            sv_space,
            sv_coef: vec![coef],
            sv_indices,
            prob_a,
            prob_b: Vec::new(),
        })
    }

    fn train_classifier(problem: &Problem, param: &Parameter) -> Result<Self> {
        let groups = ClassGroups::new(problem);
        let nr_class = groups.nr_class();
        if nr_class == 1 {
            warn!(
                "training data in only one class; every prediction will be {}",
                groups.labels[0]
            );
        }

        let grouped = problem.subset(&groups.perm);
        let l = grouped.len();

        let mut weighted_c = vec![param.c; nr_class];
        for w in &param.weights {
            match groups.labels.iter().position(|&label| label == w.label) {
                Some(c) => weighted_c[c] *= w.weight,
                None => warn!("class label {} specified in weight is not found", w.label),
            }
        }

        let mut rng = rng_from_seed(param.seed);
        let mut nonzero = vec![false; l];
        let mut decisions = Vec::with_capacity(nr_class * nr_class.saturating_sub(1) / 2);
        let mut prob_a = Vec::new();
        let mut prob_b = Vec::new();

        for (i, j) in class_pairs(nr_class) {
            let (ri, rj) = (groups.range(i), groups.range(j));
            let (ci, cj) = (ri.len(), rj.len());
            let indices: Vec<usize> = ri.chain(rj).collect();
            let labels = iter::repeat(1.0)
                .take(ci)
                .chain(iter::repeat(-1.0).take(cj))
                .collect();
            let sub = grouped.subset_with_labels(&indices, labels);

            if param.probability {
                let (a, b) =
                    binary_svc_probability(&sub, param, weighted_c[i], weighted_c[j], &mut rng)?;
                prob_a.push(a);
                prob_b.push(b);
            }

            let decision = train_one(&sub, param, weighted_c[i], weighted_c[j])?;
            for (&k, &a) in indices.iter().zip(&decision.alpha) {
                if a.abs() > 0.0 {
                    nonzero[k] = true;
                }
            }
            decisions.push(decision);
        }

        let n_sv: Vec<usize> = (0..nr_class)
            .map(|c| groups.range(c).filter(|&k| nonzero[k]).count())
            .collect();
        let total_sv: usize = n_sv.iter().sum();
        info!("Total nSV = {}", total_sv);

        let mut sv_space = FeatureSpace::new();
        let mut sv_indices = Vec::with_capacity(total_sv);
        for k in (0..l).filter(|&k| nonzero[k]) {
            sv_space.push_row(grouped.x(k));
            sv_indices.push(groups.perm[k] + 1);
        }

        let rho = decisions.iter().map(|d| d.rho).collect();
        let nz_start = ClassGroups::starts(&n_sv);
        let mut sv_coef = vec![vec![0.0; total_sv]; nr_class.saturating_sub(1)];
        for ((i, j), decision) in class_pairs(nr_class).zip(&decisions) {
            let (ri, rj) = (groups.range(i), groups.range(j));
            let ci = ri.len();

            let mut q = nz_start[i];
            for (k, &a) in ri.zip(&decision.alpha[..ci]) {
                if nonzero[k] {
                    sv_coef[j - 1][q] = a;
                    q += 1;
                }
            }
            let mut q = nz_start[j];
            for (k, &a) in rj.zip(&decision.alpha[ci..]) {
                if nonzero[k] {
                    sv_coef[i][q] = a;
                    q += 1;
                }
            }
        }

        Ok(Self {
            param: param.clone(),
            nr_class,
            labels: groups.labels,
            rho,
            n_sv,
            sv_space,
            sv_coef,
            sv_indices,
            prob_a,
            prob_b,
        })
    }

    pub fn param(&self) -> &Parameter {
        &self.param
    }

    pub fn svm_type(&self) -> SvmType {
        self.param.svm_type
    }

    /// Number of classes; 2 for regression and one-class models
    pub fn nr_class(&self) -> usize {
        self.nr_class
    }

    /// Class labels in decision order (classification only)
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    /// Bias of each decision function
    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    /// Support vectors per class (classification only)
    pub fn n_sv(&self) -> &[usize] {
        &self.n_sv
    }

    pub fn total_sv(&self) -> usize {
        self.sv_space.len()
    }

    pub fn support_vector(&self, s: usize) -> SparseView<'_> {
        self.sv_space.row(s)
    }

    pub fn sv_coef(&self) -> &[Vec<f64>] {
        &self.sv_coef
    }

    /// 1-based positions of the support vectors in the training problem.
    /// Empty for models read from a file.
    pub fn sv_indices(&self) -> &[usize] {
        &self.sv_indices
    }

    pub fn prob_a(&self) -> &[f64] {
        &self.prob_a
    }

    pub fn prob_b(&self) -> &[f64] {
        &self.prob_b
    }

    /// Whether `predict_probability` is available
    pub fn has_probability(&self) -> bool {
        self.param.svm_type.is_classification()
            && !self.prob_a.is_empty()
            && !self.prob_b.is_empty()
    }

    /// Scale of the Laplace noise model of a calibrated regression model
    pub fn svr_sigma(&self) -> Option<f64> {
        if self.param.svm_type.is_regression() {
            self.prob_a.first().copied()
        } else {
            None
        }
    }
}

impl SVMModel for Model {
    fn predict(&self, x: SparseView<'_>) -> f64 {
        Model::predict(self, x)
    }

    fn predict_probability(&self, x: SparseView<'_>) -> Result<(f64, Vec<f64>)> {
        Model::predict_probability(self, x)
    }

    fn n_support_vectors(&self) -> usize {
        self.total_sv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, SparseVector};
    use std::io::Cursor;

    fn problem(data: &str) -> Problem {
        Problem::from_reader(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_group_classes_first_occurrence() {
        let groups = ClassGroups::new(&problem("3 1:1\n1 1:2\n3 1:3\n2 1:4\n1 1:5\n"));
        assert_eq!(groups.labels, vec![3, 1, 2]);
        assert_eq!(groups.count, vec![2, 2, 1]);
        assert_eq!(groups.start, vec![0, 2, 4]);
        assert_eq!(groups.perm, vec![0, 2, 1, 4, 3]);
    }

    #[test]
    fn test_group_classes_swaps_minus_one_first() {
        let groups = ClassGroups::new(&problem("-1 1:1\n1 1:2\n-1 1:3\n"));
        assert_eq!(groups.labels, vec![1, -1]);
        assert_eq!(groups.count, vec![1, 2]);
        assert_eq!(groups.perm, vec![1, 0, 2]);
    }

    #[test]
    fn test_three_class_layout() {
        let data = "1 1:0 2:0\n1 1:0.2 2:0.1\n\
                    2 1:3 2:0\n2 1:3.1 2:0.2\n\
                    3 1:0 2:3\n3 1:0.1 2:3.2\n";
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear).with_c(10.0);
        let model = Model::train(&problem(data), &param).unwrap();

        assert_eq!(model.nr_class(), 3);
        assert_eq!(model.labels(), &[1, 2, 3]);
        assert_eq!(model.rho().len(), 3);
        assert_eq!(model.sv_coef().len(), 2);
        assert!(model.sv_coef().iter().all(|row| row.len() == model.total_sv()));
        assert_eq!(model.n_sv().iter().sum::<usize>(), model.total_sv());
        assert_eq!(model.sv_indices().len(), model.total_sv());
        assert!(model.sv_indices().iter().all(|&i| (1..=6).contains(&i)));
    }

    #[test]
    fn test_one_class_model() {
        let data = "1 1:0 2:0\n1 1:0.1 2:0\n1 1:0 2:0.1\n1 1:0.1 2:0.1\n";
        let param = Parameter::new(SvmType::OneClass, KernelType::Rbf)
            .with_gamma(0.5)
            .with_nu(0.5);
        let model = Model::train(&problem(data), &param).unwrap();

        assert_eq!(model.nr_class(), 2);
        assert!(model.labels().is_empty());
        assert_eq!(model.rho().len(), 1);
        assert_eq!(model.sv_coef().len(), 1);
        assert!(model.total_sv() >= 2);
    }

    #[test]
    fn test_single_class_predicts_that_class() {
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear);
        let model = Model::train(&problem("4 1:1\n4 1:2\n"), &param).unwrap();
        assert_eq!(model.total_sv(), 0);
        let x = SparseVector::new(vec![1], vec![-3.0]);
        assert_eq!(model.predict(x.view()), 4.0);
    }

    #[test]
    fn test_train_rejects_infeasible_nu() {
        let data = "1 1:1\n-1 1:-1\n-1 1:-2\n-1 1:-3\n";
        let param = Parameter::new(SvmType::NuSvc, KernelType::Linear).with_nu(0.9);
        assert!(matches!(
            Model::train(&problem(data), &param),
            Err(SVMError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_unknown_weight_label_is_ignored() {
        let data = "1 1:1\n-1 1:-1\n";
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear).with_weight(7, 2.0);
        let model = Model::train(&problem(data), &param).unwrap();
        assert_eq!(model.total_sv(), 2);
    }
}
