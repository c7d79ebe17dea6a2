//! Cache counters.

/// Counters describing how a [`BoundedMruCache`](crate::BoundedMruCache) has been used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Live entries at the time of the snapshot.
    pub entries: usize,

    /// Configured capacity.
    pub capacity: usize,

    /// New keys inserted.
    pub insertions: u64,

    /// Existing keys whose value was replaced.
    pub replacements: u64,

    /// Entries dropped because of capacity pressure (observers notified).
    pub evictions: u64,

    /// Entries dropped by explicit removal or clearing (observers not notified).
    pub removals: u64,
}

impl CacheStats {
    /// Fraction of capacity in use (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.entries as f64 / self.capacity as f64
        }
    }

    /// Fraction of insertions that eventually pushed another entry out.
    pub fn eviction_ratio(&self) -> f64 {
        if self.insertions == 0 {
            0.0
        } else {
            self.evictions as f64 / self.insertions as f64
        }
    }

    /// Add another snapshot's counters to this one.
    ///
    /// Used when a cache is torn down and later reallocated, so totals survive.
    pub fn accumulate(&mut self, other: &CacheStats) {
        self.insertions += other.insertions;
        self.replacements += other.replacements;
        self.evictions += other.evictions;
        self.removals += other.removals;
    }
}
