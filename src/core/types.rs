//! Sparse vector storage shared by problems and models

use crate::core::{Result, SVMError};

/// Borrowed view of one sparse vector: ascending indices and their values
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseView<'a> {
    pub indices: &'a [usize],
    pub values: &'a [f64],
}

impl<'a> SparseView<'a> {
    /// Number of stored (non-zero) entries
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over `(index, value)` pairs in ascending index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + 'a {
        self.indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
    }

    /// Largest feature index, or 0 for an empty vector
    pub fn max_index(&self) -> usize {
        self.indices.last().copied().unwrap_or(0)
    }

    pub fn to_owned(&self) -> SparseVector {
        SparseVector {
            indices: self.indices.to_vec(),
            values: self.values.to_vec(),
        }
    }
}

/// Sparse vector representation with sorted indices
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a new sparse vector, ensuring indices are sorted.
    ///
    /// A repeated index keeps the value given last.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        assert_eq!(
            indices.len(),
            values.len(),
            "Indices and values must have same length"
        );

        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        // Stable, so duplicates stay in input order
        pairs.sort_by_key(|&(idx, _)| idx);

        let mut result = Self::default();
        for (idx, value) in pairs {
            match result.indices.last() {
                Some(&last) if last == idx => {
                    if let Some(v) = result.values.last_mut() {
                        *v = value;
                    }
                }
                _ => {
                    result.indices.push(idx);
                    result.values.push(value);
                }
            }
        }
        result
    }

    /// Create a sparse vector from pairs that must already be strictly ascending
    pub fn try_from_pairs(pairs: Vec<(usize, f64)>) -> Result<Self> {
        if let Some(w) = pairs.windows(2).find(|w| w[0].0 >= w[1].0) {
            return Err(SVMError::InvalidDataset(format!(
                "feature indices must be strictly ascending, found {} before {}",
                w[0].0, w[1].0
            )));
        }
        let (indices, values) = pairs.into_iter().unzip();
        Ok(Self { indices, values })
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn view(&self) -> SparseView<'_> {
        SparseView {
            indices: &self.indices,
            values: &self.values,
        }
    }

    /// Number of non-zero elements
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

impl From<Vec<(usize, f64)>> for SparseVector {
    fn from(pairs: Vec<(usize, f64)>) -> Self {
        let (indices, values) = pairs.into_iter().unzip();
        SparseVector::new(indices, values)
    }
}

/// Contiguous backing store for many sparse vectors.
///
/// All rows live in two flat arrays; a row is addressed by its id, which maps
/// to a `[start, end)` range of those arrays. Problems, sub-problems and
/// models refer to rows by id instead of owning their vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSpace {
    indices: Vec<usize>,
    values: Vec<f64>,
    starts: Vec<usize>,
}

impl Default for FeatureSpace {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureSpace {
    pub fn new() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
            starts: vec![0],
        }
    }

    /// Append a vector and return its row id
    pub fn push_row(&mut self, vector: SparseView<'_>) -> usize {
        self.indices.extend_from_slice(vector.indices);
        self.values.extend_from_slice(vector.values);
        self.starts.push(self.indices.len());
        self.starts.len() - 2
    }

    /// Borrow row `id`
    ///
    /// # Panics
    /// Panics if `id >= self.len()`
    pub fn row(&self, id: usize) -> SparseView<'_> {
        let (start, end) = (self.starts[id], self.starts[id + 1]);
        SparseView {
            indices: &self.indices[start..end],
            values: &self.values[start..end],
        }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.starts.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of stored entries across all rows
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_vector_creation() {
        let sv = SparseVector::new(vec![2, 0, 4], vec![2.0, 1.0, 3.0]);

        assert_eq!(sv.indices, vec![0, 2, 4]);
        assert_eq!(sv.values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_repeated_index_keeps_last_value() {
        let sv = SparseVector::new(vec![3, 1, 3, 1], vec![1.0, 2.0, 5.0, 4.0]);
        assert_eq!(sv.indices, vec![1, 3]);
        assert_eq!(sv.values, vec![4.0, 5.0]);

        let from_pairs = SparseVector::from(vec![(2, 1.0), (2, 3.0)]);
        assert_eq!(crate::kernel::dot(from_pairs.view(), from_pairs.view()), 9.0);
    }

    #[test]
    fn test_try_from_pairs_rejects_unsorted() {
        assert!(SparseVector::try_from_pairs(vec![(1, 1.0), (3, 2.0)]).is_ok());
        assert!(SparseVector::try_from_pairs(vec![(3, 1.0), (1, 2.0)]).is_err());
        assert!(SparseVector::try_from_pairs(vec![(2, 1.0), (2, 2.0)]).is_err());
    }

    #[test]
    #[should_panic(expected = "Indices and values must have same length")]
    fn test_sparse_vector_length_mismatch() {
        SparseVector::new(vec![0, 1], vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_feature_space_rows() {
        let mut space = FeatureSpace::new();
        let a = SparseVector::new(vec![1, 3], vec![0.5, 1.5]);
        let b = SparseVector::empty();
        let c = SparseVector::new(vec![2], vec![-1.0]);

        assert_eq!(space.push_row(a.view()), 0);
        assert_eq!(space.push_row(b.view()), 1);
        assert_eq!(space.push_row(c.view()), 2);

        assert_eq!(space.len(), 3);
        assert_eq!(space.nnz(), 3);
        assert_eq!(space.row(0).to_owned(), a);
        assert!(space.row(1).is_empty());
        assert_eq!(space.row(2).max_index(), 2);
    }

    #[test]
    fn test_view_iter() {
        let v = SparseVector::from(vec![(4, 2.0), (1, 1.0)]);
        let pairs: Vec<_> = v.view().iter().collect();
        assert_eq!(pairs, vec![(1, 1.0), (4, 2.0)]);
    }
}
