//! Utility functions for SVM operations

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Random source for shuffles: reproducible when a seed is given
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Evaluation of predictions against true labels
pub mod metrics {
    /// Fraction of predictions equal to their label
    pub fn accuracy(predictions: &[f64], labels: &[f64]) -> f64 {
        if labels.is_empty() {
            return 0.0;
        }
        let correct = predictions
            .iter()
            .zip(labels)
            .filter(|(p, y)| p == y)
            .count();
        correct as f64 / labels.len() as f64
    }

    /// Running sums for regression error and correlation
    #[derive(Debug, Clone, Copy, Default, PartialEq)]
    pub struct RegressionStats {
        squared_error: f64,
        sum_p: f64,
        sum_t: f64,
        sum_pp: f64,
        sum_tt: f64,
        sum_pt: f64,
        total: usize,
    }

    impl RegressionStats {
        pub fn new() -> Self {
            Self::default()
        }

        /// Accumulate one `(prediction, target)` pair
        pub fn add(&mut self, predicted: f64, target: f64) {
            self.squared_error += (predicted - target) * (predicted - target);
            self.sum_p += predicted;
            self.sum_t += target;
            self.sum_pp += predicted * predicted;
            self.sum_tt += target * target;
            self.sum_pt += predicted * target;
            self.total += 1;
        }

        pub fn count(&self) -> usize {
            self.total
        }

        pub fn mean_squared_error(&self) -> f64 {
            self.squared_error / self.total as f64
        }

        /// Squared Pearson correlation between predictions and targets
        pub fn squared_correlation(&self) -> f64 {
            let n = self.total as f64;
            let cov = n * self.sum_pt - self.sum_p * self.sum_t;
            (cov * cov)
                / ((n * self.sum_pp - self.sum_p * self.sum_p)
                    * (n * self.sum_tt - self.sum_t * self.sum_t))
        }
    }

    impl FromIterator<(f64, f64)> for RegressionStats {
        fn from_iter<I: IntoIterator<Item = (f64, f64)>>(iter: I) -> Self {
            let mut stats = Self::new();
            for (p, t) in iter {
                stats.add(p, t);
            }
            stats
        }
    }
}
