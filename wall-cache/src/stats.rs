//! Cache usage counters.

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served without a remote call.
    pub hits: u64,
    /// Reads that went to the remote service.
    pub misses: u64,
    /// Resolved reads whose result was not written because a newer read or
    /// an invalidation got there first.
    pub discarded: u64,
    /// Entries marked stale by prefix invalidation.
    pub invalidated: u64,
    /// Entries removed by garbage collection.
    pub evictions: u64,
    /// Number of entries currently held.
    pub entry_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
