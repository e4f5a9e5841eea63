//! Block-parallel loops over `[0, n)`
//!
//! The range is split into `W` contiguous blocks whose sizes differ by at
//! most one (the first `n % W` blocks get the extra element). Every call
//! forks one task per block onto the rayon pool and returns once all of them
//! have finished. Results depend on `W` and never on thread scheduling, since
//! each block writes only its own part of the output.

use rayon::prelude::*;
use std::ops::Range;

/// Worker count for a configured value, where 0 means every available CPU
pub fn resolve_workers(configured: usize) -> usize {
    if configured > 0 {
        configured
    } else {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Fixed partition of `[0, n)` into worker blocks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParallelRunner {
    n: usize,
    workers: usize,
}

impl ParallelRunner {
    /// Partition `n` elements over `workers` blocks (at least one)
    pub fn new(n: usize, workers: usize) -> Self {
        Self {
            n,
            workers: workers.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Element range of block `b`
    pub fn block(&self, b: usize) -> Range<usize> {
        let base = self.n / self.workers;
        let extra = self.n % self.workers;
        let start = b * base + b.min(extra);
        let len = base + usize::from(b < extra);
        start..start + len
    }

    /// All block ranges in order
    pub fn blocks(&self) -> Vec<Range<usize>> {
        (0..self.workers).map(|b| self.block(b)).collect()
    }

    /// Run `f(worker, start, end)` for every block and wait for all of them
    pub fn run<F>(&self, f: F)
    where
        F: Fn(usize, usize, usize) + Send + Sync,
    {
        if self.workers == 1 {
            f(0, 0, self.n);
            return;
        }
        (0..self.workers).into_par_iter().for_each(|b| {
            let r = self.block(b);
            f(b, r.start, r.end);
        });
    }

    /// Run `f(worker, range)` for every block and collect the results in block
    /// order
    pub fn map_blocks<R, F>(&self, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(usize, Range<usize>) -> R + Send + Sync,
    {
        if self.workers == 1 {
            return vec![f(0, 0..self.n)];
        }
        (0..self.workers)
            .into_par_iter()
            .map(|b| f(b, self.block(b)))
            .collect()
    }

    /// Split `out` along the partition and hand each block its own chunk.
    ///
    /// `f(start, chunk)` receives the first element index of the block and a
    /// mutable slice of `out[start..end]`.
    ///
    /// # Panics
    /// Panics if `out.len() != self.len()`
    pub fn run_chunks<T, F>(&self, out: &mut [T], f: F)
    where
        T: Send,
        F: Fn(usize, &mut [T]) + Send + Sync,
    {
        assert_eq!(out.len(), self.n, "output length must match the partition");
        if self.workers == 1 {
            f(0, out);
            return;
        }
        self.split(out)
            .into_par_iter()
            .for_each(|(start, chunk)| f(start, chunk));
    }

    /// Like [`run_chunks`](Self::run_chunks) for two outputs that share the
    /// same partition
    pub fn run_chunks2<A, B, F>(&self, a: &mut [A], b: &mut [B], f: F)
    where
        A: Send,
        B: Send,
        F: Fn(usize, &mut [A], &mut [B]) + Send + Sync,
    {
        assert_eq!(a.len(), self.n, "output length must match the partition");
        assert_eq!(b.len(), self.n, "output length must match the partition");
        if self.workers == 1 {
            f(0, a, b);
            return;
        }
        self.split(a)
            .into_par_iter()
            .zip(self.split(b))
            .for_each(|((start, ca), (_, cb))| f(start, ca, cb));
    }

    fn split<'s, T>(&self, mut rest: &'s mut [T]) -> Vec<(usize, &'s mut [T])> {
        let mut chunks = Vec::with_capacity(self.workers);
        for b in 0..self.workers {
            let r = self.block(b);
            let (head, tail) = std::mem::take(&mut rest).split_at_mut(r.len());
            chunks.push((r.start, head));
            rest = tail;
        }
        chunks
    }
}
