//! Decision values, labels and calibrated probabilities of a trained model

use super::{class_pairs, ClassGroups, Model};
use crate::core::{Result, SVMError, SparseView, SvmType};
use crate::kernel::{Kernel, KernelFunction};
use crate::probability::{multiclass_probability, sigmoid_predict};

/// Pairwise probabilities are clipped into `[MIN_PROB, 1 - MIN_PROB]`
const MIN_PROB: f64 = 1e-7;

impl Model {
    /// Predict `x` and return the decision values it was derived from.
    ///
    /// Classification yields one value per class pair, ordered `(0, 1)`,
    /// `(0, 2)`, ..., `(k - 2, k - 1)`, and the label with the most votes
    /// (ties go to the earlier class). Regression returns the function value
    /// as both label and sole decision value; one-class returns `±1` and its
    /// decision value.
    pub fn predict_values(&self, x: SparseView<'_>) -> (f64, Vec<f64>) {
        let kernel = KernelFunction::from_param(&self.param);
        let kvalue: Vec<f64> = (0..self.total_sv())
            .map(|s| kernel.compute(x, self.support_vector(s)))
            .collect();

        match self.param.svm_type {
            SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
                let sum = self.sv_coef[0]
                    .iter()
                    .zip(&kvalue)
                    .map(|(c, k)| c * k)
                    .sum::<f64>()
                    - self.rho[0];

                let label = match self.param.svm_type {
                    SvmType::OneClass if sum > 0.0 => 1.0,
                    SvmType::OneClass => -1.0,
                    _ => sum,
                };
                (label, vec![sum])
            }
            SvmType::CSvc | SvmType::NuSvc => {
                let start = ClassGroups::starts(&self.n_sv);
                let mut votes = vec![0usize; self.nr_class];
                let mut values = Vec::with_capacity(self.rho.len());

                for ((i, j), rho) in class_pairs(self.nr_class).zip(&self.rho) {
                    let ri = start[i]..start[i] + self.n_sv[i];
                    let rj = start[j]..start[j] + self.n_sv[j];
                    let coef_i = &self.sv_coef[j - 1];
                    let coef_j = &self.sv_coef[i];

                    let sum = ri.map(|s| coef_i[s] * kvalue[s]).sum::<f64>()
                        + rj.map(|s| coef_j[s] * kvalue[s]).sum::<f64>()
                        - rho;

                    if sum > 0.0 {
                        votes[i] += 1;
                    } else {
                        votes[j] += 1;
                    }
                    values.push(sum);
                }

                let winner = argmax(&votes);
                (f64::from(self.labels[winner]), values)
            }
        }
    }

    /// Predicted label (classification), function value (regression) or
    /// `±1` (one-class)
    pub fn predict(&self, x: SparseView<'_>) -> f64 {
        self.predict_values(x).0
    }

    /// Most probable label and the probability of each class, in the order
    /// of [`Model::labels`].
    ///
    /// Only classification models trained with `probability` set carry the
    /// calibration needed here.
    pub fn predict_probability(&self, x: SparseView<'_>) -> Result<(f64, Vec<f64>)> {
        if !self.has_probability() {
            return Err(SVMError::ProbabilityUnavailable);
        }

        let k = self.nr_class;
        let (_, values) = self.predict_values(x);

        let mut pairwise = vec![vec![0.0; k]; k];
        for (p, (i, j)) in class_pairs(k).enumerate() {
            let prob = sigmoid_predict(values[p], self.prob_a[p], self.prob_b[p])
                .clamp(MIN_PROB, 1.0 - MIN_PROB);
            pairwise[i][j] = prob;
            pairwise[j][i] = 1.0 - prob;
        }

        let estimates = multiclass_probability(&pairwise);

        let best = estimates
            .iter()
            .enumerate()
            .fold(0, |best, (c, &p)| if p > estimates[best] { c } else { best });
        Ok((f64::from(self.labels[best]), estimates))
    }
}

/// Index of the first maximum
fn argmax(votes: &[usize]) -> usize {
    votes
        .iter()
        .enumerate()
        .fold(0, |best, (c, &v)| if v > votes[best] { c } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelType, Parameter, SparseVector};
    use crate::data::Problem;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    fn problem(data: &str) -> Problem {
        Problem::from_reader(Cursor::new(data)).unwrap()
    }

    fn point(x: f64, y: f64) -> SparseVector {
        SparseVector::new(vec![1, 2], vec![x, y])
    }

    const THREE_BLOBS: &str = "1 1:0 2:0\n1 1:0.2 2:0.1\n1 1:0.1 2:0.2\n\
                               2 1:3 2:0\n2 1:3.1 2:0.2\n2 1:2.9 2:0.1\n\
                               3 1:0 2:3\n3 1:0.1 2:3.2\n3 1:0.2 2:2.9\n";

    #[test]
    fn test_argmax_prefers_first_on_tie() {
        assert_eq!(argmax(&[1, 2, 2]), 1);
        assert_eq!(argmax(&[0, 0, 0]), 0);
    }

    #[test]
    fn test_predict_values_order_and_votes() {
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear).with_c(10.0);
        let model = Model::train(&problem(THREE_BLOBS), &param).unwrap();

        let (label, values) = model.predict_values(point(3.0, 0.1).view());
        assert_eq!(label, 2.0);
        assert_eq!(values.len(), 3);
        // (1 vs 2) says 2, (2 vs 3) says 2
        assert!(values[0] < 0.0);
        assert!(values[2] > 0.0);

        assert_eq!(model.predict(point(0.05, 0.05).view()), 1.0);
        assert_eq!(model.predict(point(0.1, 3.0).view()), 3.0);
    }

    #[test]
    fn test_one_class_predicts_sign() {
        let data = "1 1:0 2:0\n1 1:0.1 2:0\n1 1:0 2:0.1\n1 1:0.1 2:0.1\n1 1:0.05 2:0.05\n";
        let param = Parameter::new(SvmType::OneClass, KernelType::Rbf)
            .with_gamma(1.0)
            .with_nu(0.5);
        let model = Model::train(&problem(data), &param).unwrap();

        let (label, values) = model.predict_values(point(10.0, 10.0).view());
        assert_eq!(label, -1.0);
        assert!(values[0] <= 0.0);
        assert!(matches!(
            model.predict_probability(point(0.0, 0.0).view()),
            Err(SVMError::ProbabilityUnavailable)
        ));
    }

    #[test]
    fn test_regression_value_matches_decision() {
        let data = "0 1:0\n1 1:0.5\n2 1:1\n3 1:1.5\n4 1:2\n";
        let param = Parameter::new(SvmType::EpsilonSvr, KernelType::Linear)
            .with_c(10.0)
            .with_p(0.01);
        let model = Model::train(&problem(data), &param).unwrap();

        let x = SparseVector::new(vec![1], vec![0.75]);
        let (value, values) = model.predict_values(x.view());
        assert_eq!(values.len(), 1);
        assert_relative_eq!(value, values[0]);
        assert!((value - 1.5).abs() < 0.1);
    }

    #[test]
    fn test_probability_sums_to_one() {
        let param = Parameter::new(SvmType::CSvc, KernelType::Linear)
            .with_c(10.0)
            .with_probability(true)
            .with_seed(7);
        let model = Model::train(&problem(THREE_BLOBS), &param).unwrap();
        assert!(model.has_probability());
        assert_eq!(model.prob_a().len(), 3);

        let (label, probs) = model.predict_probability(point(3.0, 0.0).view()).unwrap();
        assert_eq!(probs.len(), 3);
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        assert!(probs.iter().all(|&p| (0.0..=1.0).contains(&p)));
        assert!(model.labels().contains(&(label as i32)));
    }
}
