//! LibSVM format problem loading
//!
//! Supports problems in the libsvm text format:
//! label index:value index:value ...
//!
//! Example:
//! +1 1:0.5 3:1.2 7:0.8  # trailing comment
//! -1 2:0.3 5:2.1
//!
//! Indices are kept as written (1-based, strictly ascending). Index 0 is
//! accepted so that precomputed kernel rows (`0:<id>`) load unchanged.

use crate::core::{
    Dataset, FeatureSpace, Parameter, Result, SVMError, SparseVector, SparseView,
};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

/// Labeled examples over a shared feature store
///
/// Sub-problems (one-vs-one pairs, cross-validation folds) share the parent's
/// [`FeatureSpace`] and only carry their own row ids and labels.
#[derive(Debug, Clone)]
pub struct Problem {
    labels: Vec<f64>,
    rows: Vec<usize>,
    space: Arc<FeatureSpace>,
    max_index: usize,
}

impl Problem {
    /// Build a problem from rows of an existing feature space
    pub fn new(labels: Vec<f64>, rows: Vec<usize>, space: Arc<FeatureSpace>) -> Self {
        assert_eq!(labels.len(), rows.len(), "one label per row");
        let max_index = rows
            .iter()
            .map(|&r| space.row(r).max_index())
            .max()
            .unwrap_or(0);
        Self {
            labels,
            rows,
            space,
            max_index,
        }
    }

    /// Build a problem that owns copies of the given vectors
    pub fn from_vectors(examples: Vec<(f64, SparseVector)>) -> Self {
        let mut space = FeatureSpace::new();
        let mut labels = Vec::with_capacity(examples.len());
        let mut rows = Vec::with_capacity(examples.len());
        for (label, x) in &examples {
            labels.push(*label);
            rows.push(space.push_row(x.view()));
        }
        Self::new(labels, rows, Arc::new(space))
    }

    /// Load a problem from a libsvm format file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Load a problem and derive `param.gamma` from it when gamma is 0
    pub fn load<P: AsRef<Path>>(path: P, param: &mut Parameter) -> Result<Self> {
        let problem = Self::from_file(path)?;
        param.derive_gamma(problem.max_index);
        Ok(problem)
    }

    /// Load a problem from a reader (for testing and flexibility)
    ///
    /// Fails on the first malformed line; nothing is returned for a
    /// partially read input.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut space = FeatureSpace::new();
        let mut labels = Vec::new();
        let mut rows = Vec::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or("");
            let mut tokens = content.split_whitespace();

            let Some(label_token) = tokens.next() else {
                continue;
            };
            let label = label_token
                .parse::<f64>()
                .map_err(|_| SVMError::parse(line_num + 1, label_token, "invalid label"))?;

            let pairs = tokens
                .map(|token| parse_feature(line_num + 1, token))
                .collect::<Result<Vec<_>>>()?;
            let x = SparseVector::try_from_pairs(pairs).map_err(|e| {
                SVMError::parse(line_num + 1, content.trim(), e.to_string())
            })?;

            labels.push(label);
            rows.push(space.push_row(x.view()));
        }

        if labels.is_empty() {
            return Err(SVMError::EmptyDataset);
        }
        debug!("Loaded {} examples, {} stored features", labels.len(), space.nnz());

        Ok(Self::new(labels, rows, Arc::new(space)))
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn label(&self, i: usize) -> f64 {
        self.labels[i]
    }

    /// Feature vector of example `i`
    #[inline]
    pub fn x(&self, i: usize) -> SparseView<'_> {
        self.space.row(self.rows[i])
    }

    /// Largest feature index over all examples
    pub fn max_index(&self) -> usize {
        self.max_index
    }

    /// Examples `indices` of this problem, sharing its feature store
    pub fn subset(&self, indices: &[usize]) -> Problem {
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        self.subset_with_labels(indices, labels)
    }

    /// Examples `indices` relabeled with `labels`
    pub fn subset_with_labels(&self, indices: &[usize], labels: Vec<f64>) -> Problem {
        let rows = indices.iter().map(|&i| self.rows[i]).collect();
        Problem::new(labels, rows, Arc::clone(&self.space))
    }
}

/// Parse one `index:value` token of line `line`
pub(crate) fn parse_feature(line: usize, token: &str) -> Result<(usize, f64)> {
    let (index, value) = token
        .split_once(':')
        .ok_or_else(|| SVMError::parse(line, token, "expected index:value"))?;
    let index = index
        .parse::<usize>()
        .map_err(|_| SVMError::parse(line, token, "invalid feature index"))?;
    let value = value
        .parse::<f64>()
        .map_err(|_| SVMError::parse(line, token, "invalid feature value"))?;
    Ok((index, value))
}

impl Dataset for Problem {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn dim(&self) -> usize {
        self.max_index
    }

    fn label(&self, i: usize) -> f64 {
        self.labels[i]
    }

    fn features(&self, i: usize) -> SparseView<'_> {
        self.x(i)
    }
}
