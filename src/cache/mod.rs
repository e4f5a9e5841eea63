//! Kernel row cache
//!
//! Q-matrix rows are expensive to compute (N kernel evaluations each) and the
//! solver revisits the same few rows many times, so recently used rows are
//! kept in an exact LRU cache. All rows live in one pre-allocated `f32`
//! buffer split into fixed-size slabs; the LRU list maps a row id to the
//! offset of its slab. When every slab is taken, the least recently used row
//! gives up its slab to the newcomer.

use lru::LruCache;

/// Bytes per cached element
const ELEMENT_SIZE: usize = std::mem::size_of::<f32>();

/// Fewest rows a cache may hold; the solver needs two rows resident at once.
const MIN_ROWS: usize = 2;

/// LRU cache for Q-matrix rows
pub struct RowCache {
    buffer: Vec<f32>,
    row_len: usize,
    capacity: usize,
    slabs: usize,
    next_slab: usize,
    lru: LruCache<usize, usize>,
    ref_counts: Vec<u64>,
    hits: u64,
    misses: u64,
}

impl RowCache {
    /// Create a cache for `n_rows` rows of `row_len` elements within a
    /// budget of `cache_mb` megabytes.
    pub fn new(n_rows: usize, row_len: usize, cache_mb: usize) -> Self {
        let row_bytes = row_len.saturating_mul(ELEMENT_SIZE).max(1);
        let capacity = (cache_mb.saturating_mul(1 << 20) / row_bytes).max(MIN_ROWS);
        // Never reserve more slabs than there are rows to hold
        let slabs = capacity.min(n_rows.max(MIN_ROWS));

        Self {
            buffer: vec![0.0; slabs * row_len],
            row_len,
            capacity,
            slabs,
            next_slab: 0,
            lru: LruCache::unbounded(),
            ref_counts: vec![0; n_rows],
            hits: 0,
            misses: 0,
        }
    }

    /// Fetch the slab for row `i`.
    ///
    /// Returns the row's slice and whether it is new. A new slice holds stale
    /// data and the caller must fill all of it before the next call.
    pub fn get_data(&mut self, i: usize) -> (&mut [f32], bool) {
        self.ref_counts[i] += 1;

        if let Some(&offset) = self.lru.get(&i) {
            self.hits += 1;
            return (&mut self.buffer[offset..offset + self.row_len], false);
        }

        self.misses += 1;
        let offset = if self.next_slab < self.slabs {
            let offset = self.next_slab * self.row_len;
            self.next_slab += 1;
            offset
        } else {
            // Full: the least recently used row gives up its slab
            self.lru.pop_lru().map(|(_, offset)| offset).unwrap_or(0)
        };
        self.lru.put(i, offset);

        (&mut self.buffer[offset..offset + self.row_len], true)
    }

    /// Borrow a resident row without touching the recency order
    pub fn peek(&self, i: usize) -> Option<&[f32]> {
        self.lru
            .peek(&i)
            .map(|&offset| &self.buffer[offset..offset + self.row_len])
    }

    pub fn contains(&self, i: usize) -> bool {
        self.lru.contains(&i)
    }

    /// Row ids from most to least recently used
    pub fn recency_order(&self) -> Vec<usize> {
        self.lru.iter().map(|(&row, _)| row).collect()
    }

    /// Number of times each row has been requested
    pub fn ref_count(&self, i: usize) -> u64 {
        self.ref_counts[i]
    }

    pub fn row_len(&self) -> usize {
        self.row_len
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.capacity,
            size: self.lru.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Rows the memory budget allows
    pub capacity: usize,
    /// Rows currently resident
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
