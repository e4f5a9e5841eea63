//! Precomputed kernel
//!
//! Each vector carries a row of a user-supplied kernel matrix instead of
//! features. Position 0 holds `0:id`, the 1-based id of the example, and
//! position `k` holds `K(id, k)`. Looking up K(x, y) therefore reads the
//! entry of `x` at the position named by `y`'s id.

use crate::core::{Result, SVMError, SparseView};
use crate::kernel::Kernel;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PrecomputedKernel;

impl PrecomputedKernel {
    pub fn new() -> Self {
        Self
    }

    /// The example id stored in position 0, if the vector is well formed
    pub fn example_id(v: SparseView<'_>) -> Option<usize> {
        match (v.indices.first(), v.values.first()) {
            (Some(0), Some(&id)) if id >= 1.0 && id.fract() == 0.0 => Some(id as usize),
            _ => None,
        }
    }

    /// Check that every row names its id and holds a kernel entry for every
    /// id that appears in the set.
    pub fn validate<'a>(rows: impl IntoIterator<Item = SparseView<'a>>) -> Result<()> {
        let mut max_id = 0;
        let mut min_len = usize::MAX;

        for (i, row) in rows.into_iter().enumerate() {
            let id = Self::example_id(row).ok_or_else(|| {
                SVMError::InvalidDataset(format!(
                    "precomputed kernel row {} must start with 0:<example id>",
                    i + 1
                ))
            })?;
            max_id = max_id.max(id);
            min_len = min_len.min(row.nnz());
        }

        if max_id >= min_len {
            return Err(SVMError::InvalidDataset(format!(
                "precomputed kernel id {} is out of range for rows with {} entries",
                max_id,
                min_len - 1
            )));
        }
        Ok(())
    }
}

impl Kernel for PrecomputedKernel {
    /// Entries missing from `x` read as zero.
    fn compute(&self, x: SparseView<'_>, y: SparseView<'_>) -> f64 {
        y.values
            .first()
            .and_then(|&id| x.values.get(id as usize))
            .copied()
            .unwrap_or(0.0)
    }
}
