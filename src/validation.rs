//! k-fold cross-validation
//!
//! Classification problems are split stratified by class, so every fold
//! keeps roughly the class ratios of the whole problem. Regression,
//! one-class and leave-one-out runs use a plain shuffle-and-split.

use crate::core::{Parameter, Result, SVMError, SvmType};
use crate::data::Problem;
use crate::model::{ClassGroups, Model};
use crate::utils::rng_from_seed;
use log::{debug, warn};
use rand::seq::SliceRandom;
use std::collections::BTreeMap;

/// Outcome of a cross-validation run
#[derive(Debug, Clone, PartialEq)]
pub struct CrossValidationReport {
    /// Prediction for every example, made by the model that did not see it
    pub predictions: Vec<f64>,
    /// Fraction of exactly predicted examples per fold
    pub fold_accuracies: Vec<f64>,
    /// `confusion[actual][predicted]` counts, labels printed without decimals
    pub confusion: BTreeMap<String, BTreeMap<String, usize>>,
}

/// Predict every example of `problem` with a model trained on the other
/// folds. Returns one prediction per example.
pub fn cross_validation(problem: &Problem, param: &Parameter, folds: usize) -> Result<Vec<f64>> {
    cross_validation_report(problem, param, folds).map(|report| report.predictions)
}

/// Cross-validation with per-fold accuracy and a confusion table
pub fn cross_validation_report(
    problem: &Problem,
    param: &Parameter,
    folds: usize,
) -> Result<CrossValidationReport> {
    if folds < 2 {
        return Err(SVMError::InvalidParameter(
            "n-fold cross validation: n must be >= 2".to_string(),
        ));
    }
    param.validate()?;
    if problem.is_empty() {
        return Err(SVMError::EmptyDataset);
    }
    param.check_feasibility(problem.labels())?;

    let l = problem.len();
    let folds = if folds > l {
        warn!(
            "# folds ({}) > # data ({}); using leave-one-out cross validation",
            folds, l
        );
        l
    } else {
        folds
    };

    let (perm, fold_start) = assign_folds(problem, param, folds);

    let use_probability = param.probability && param.svm_type.is_classification();
    let mut predictions = vec![0.0; l];
    let mut fold_accuracies = Vec::with_capacity(folds);
    let mut confusion: BTreeMap<String, BTreeMap<String, usize>> = BTreeMap::new();

    for fold in 0..folds {
        let (begin, end) = (fold_start[fold], fold_start[fold + 1]);
        let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let model = Model::fit(&problem.subset(&train), param)?;
        // A fold trained on a single class has no calibration
        let use_probability = use_probability && model.has_probability();

        let mut correct = 0;
        for &i in &perm[begin..end] {
            let predicted = if use_probability {
                model.predict_probability(problem.x(i))?.0
            } else {
                model.predict(problem.x(i))
            };
            predictions[i] = predicted;

            let actual = problem.label(i);
            let row = confusion.entry(label_key(actual)).or_insert_with(|| {
                let mut row = BTreeMap::new();
                row.insert(label_key(actual), 0);
                row
            });
            *row.entry(label_key(predicted)).or_insert(0) += 1;

            if predicted == actual {
                correct += 1;
            }
        }

        let accuracy = if end > begin {
            correct as f64 / (end - begin) as f64
        } else {
            0.0
        };
        debug!("fold {}: {} held out, accuracy {:.4}", fold, end - begin, accuracy);
        fold_accuracies.push(accuracy);
    }

    Ok(CrossValidationReport {
        predictions,
        fold_accuracies,
        confusion,
    })
}

fn label_key(label: f64) -> String {
    format!("{:.0}", label)
}

/// Order the examples so that fold `f` is `perm[fold_start[f]..fold_start[f + 1]]`
fn assign_folds(problem: &Problem, param: &Parameter, folds: usize) -> (Vec<usize>, Vec<usize>) {
    let l = problem.len();
    let mut rng = rng_from_seed(param.seed);

    let stratified = matches!(param.svm_type, SvmType::CSvc | SvmType::NuSvc) && folds < l;
    if !stratified {
        let mut perm: Vec<usize> = (0..l).collect();
        perm.shuffle(&mut rng);
        let fold_start = (0..=folds).map(|f| f * l / folds).collect();
        return (perm, fold_start);
    }

    let groups = ClassGroups::new(problem);
    let mut index = groups.perm.clone();
    for c in 0..groups.nr_class() {
        index[groups.range(c)].shuffle(&mut rng);
    }

    // Each class contributes an even share to every fold
    let share = |c: usize, f: usize| f * groups.count[c] / folds;
    let mut fold_start = vec![0; folds + 1];
    for f in 0..folds {
        let size: usize = (0..groups.nr_class())
            .map(|c| share(c, f + 1) - share(c, f))
            .sum();
        fold_start[f + 1] = fold_start[f] + size;
    }

    let mut perm = vec![0; l];
    let mut next = fold_start.clone();
    for c in 0..groups.nr_class() {
        for f in 0..folds {
            let begin = groups.start[c] + share(c, f);
            let end = groups.start[c] + share(c, f + 1);
            for &i in &index[begin..end] {
                perm[next[f]] = i;
                next[f] += 1;
            }
        }
    }

    (perm, fold_start)
}
