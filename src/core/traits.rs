//! Core traits for SVM implementation

use crate::core::{Result, SparseView};

/// Dataset abstraction for labeled sparse examples
pub trait Dataset: Send + Sync {
    /// Number of samples in the dataset
    fn len(&self) -> usize;

    /// Largest feature index
    fn dim(&self) -> usize;

    /// Label (class or target value) of sample `i`
    ///
    /// # Panics
    /// Panics if index >= len()
    fn label(&self, i: usize) -> f64;

    /// Features of sample `i`
    ///
    /// # Panics
    /// Panics if index >= len()
    fn features(&self, i: usize) -> SparseView<'_>;

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.label(i)).collect()
    }

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Trained SVM model
pub trait SVMModel: Send + Sync {
    /// Predict a single sample: a class label, a regression value, or ±1 for
    /// one-class novelty detection
    fn predict(&self, x: SparseView<'_>) -> f64;

    /// Predict every sample of a dataset
    fn predict_dataset(&self, data: &dyn Dataset) -> Vec<f64> {
        (0..data.len()).map(|i| self.predict(data.features(i))).collect()
    }

    /// Per-class probabilities of a sample, when the model is calibrated
    fn predict_probability(&self, x: SparseView<'_>) -> Result<(f64, Vec<f64>)>;

    /// Get the number of support vectors
    fn n_support_vectors(&self) -> usize;
}
