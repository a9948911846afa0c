//! Sharded concurrent frequency tables.
//!
//! A [`Histogram`] is a mapping from sample key to occurrence count, split
//! into a fixed number of independently locked shards so that the hot path
//! (`increment`/`add`) only ever contends on one shard lock. Reads that need
//! a consistent view across the whole table (`get`, `count`, `visit_all`)
//! take every shard's read lock before looking at any of them, and release
//! all of them once the traversal is done.
//!
//! Two key types are used by the engine: `u64` microsecond latencies and
//! `f64` requests-per-second samples. Both shard on the same rule (XOR the
//! high and low 32-bit halves), so the RPS histogram is implemented as a
//! thin wrapper around `Histogram<u64>` that stores the sample's IEEE-754
//! bit pattern.

use std::collections::HashMap;
use std::sync::RwLock;

/// Default number of independently-locked shards.
pub const DEFAULT_SHARDS: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum HistogramError {
    #[error("a sharding function must be supplied")]
    InvalidHash,
    #[error("shard count must be greater than zero")]
    InvalidShardCount,
}

/// A sharding function: maps a key to a shard index space. Only the low
/// bits are used (`% shard_count`), so any injective-ish spread works.
pub type ShardFn = Box<dyn Fn(u64) -> u64 + Send + Sync>;

/// XOR the high and low 32-bit halves of a `u64`. Used both for raw
/// microsecond latency keys and, via [`RpsHistogram`], for the bit pattern
/// of an `f64` RPS sample.
pub fn fold_halves(key: u64) -> u64 {
    (key >> 32) ^ (key & 0xFFFF_FFFF)
}

struct Shard {
    counts: RwLock<HashMap<u64, u64>>,
}

/// A sharded histogram over `u64` keys.
///
/// Construction fails with [`HistogramError::InvalidShardCount`] when
/// `shards == 0`: sample hot-paths should only ever contend on one shard
/// lock, and analysis (`visit_all`) is rare enough to tolerate a global
/// freeze.
pub struct Histogram {
    shards: Vec<Shard>,
    hash: ShardFn,
}

impl Histogram {
    /// Construct a histogram with an explicit shard count and sharding
    /// function. `hash` is required; passing `None` yields
    /// [`HistogramError::InvalidHash`].
    pub fn new(shards: usize, hash: Option<ShardFn>) -> Result<Self, HistogramError> {
        if shards == 0 {
            return Err(HistogramError::InvalidShardCount);
        }
        let hash = hash.ok_or(HistogramError::InvalidHash)?;
        let shards = (0..shards)
            .map(|_| Shard {
                counts: RwLock::new(HashMap::new()),
            })
            .collect();
        Ok(Self { shards, hash })
    }

    /// A histogram with [`DEFAULT_SHARDS`] shards and the default
    /// fold-halves sharding rule. Never fails.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SHARDS, Some(Box::new(fold_halves)))
            .expect("default histogram configuration is always valid")
    }

    fn shard_for(&self, key: u64) -> &Shard {
        let idx = (self.hash)(key) as usize % self.shards.len();
        &self.shards[idx]
    }

    /// Increment `key`'s occurrence count by one.
    pub fn increment(&self, key: u64) {
        self.add(key, 1);
    }

    /// Increment `key`'s occurrence count by `amount`.
    pub fn add(&self, key: u64, amount: u64) {
        let shard = self.shard_for(key);
        let mut counts = shard.counts.write().expect("histogram shard lock poisoned");
        *counts.entry(key).or_insert(0) += amount;
    }

    /// Read the current occurrence count for `key`. Takes only that key's
    /// shard lock.
    pub fn get(&self, key: u64) -> u64 {
        let shard = self.shard_for(key);
        let counts = shard.counts.read().expect("histogram shard lock poisoned");
        counts.get(&key).copied().unwrap_or(0)
    }

    /// Number of distinct keys recorded across all shards.
    pub fn count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.counts.read().expect("histogram shard lock poisoned").len())
            .sum()
    }

    /// Acquire every shard's read lock, in ascending shard-index order
    /// (avoiding lock-ordering deadlocks with concurrent `visit_all`
    /// callers), and invoke `visitor` once per `(key, count)` pair across
    /// the whole table. The visitor may return `false` to stop early; the
    /// remaining locks are still released normally once traversal ends.
    pub fn visit_all<F>(&self, mut visitor: F)
    where
        F: FnMut(u64, u64) -> bool,
    {
        let guards: Vec<_> = self
            .shards
            .iter()
            .map(|s| s.counts.read().expect("histogram shard lock poisoned"))
            .collect();
        'outer: for guard in &guards {
            for (&key, &count) in guard.iter() {
                if !visitor(key, count) {
                    break 'outer;
                }
            }
        }
    }
}

/// A histogram over `f64` requests-per-second samples, stored internally
/// as the IEEE-754 bit pattern of each sample so the same `u64` shard
/// machinery can be reused. Bit-pattern ordering matches numeric ordering
/// for the non-negative values RPS samples always are.
pub struct RpsHistogram {
    inner: Histogram,
}

impl RpsHistogram {
    pub fn with_defaults() -> Self {
        Self {
            inner: Histogram::with_defaults(),
        }
    }

    pub fn record(&self, rps: f64) {
        self.inner.increment(rps.to_bits());
    }

    pub fn count(&self) -> usize {
        self.inner.count()
    }

    pub fn visit_all<F>(&self, mut visitor: F)
    where
        F: FnMut(f64, u64) -> bool,
    {
        self.inner
            .visit_all(|bits, count| visitor(f64::from_bits(bits), count));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn rejects_zero_shards() {
        match Histogram::new(0, Some(Box::new(fold_halves))) {
            Err(HistogramError::InvalidShardCount) => {}
            other => panic!("expected InvalidShardCount, got {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_hash() {
        match Histogram::new(4, None) {
            Err(HistogramError::InvalidHash) => {}
            other => panic!("expected InvalidHash, got {other:?}"),
        }
    }

    #[test]
    fn increments_are_visible_after_visit_all() {
        let h = Histogram::with_defaults();
        h.increment(42);
        h.increment(42);
        h.add(7, 5);
        let mut total = 0u64;
        h.visit_all(|_, count| {
            total += count;
            true
        });
        assert_eq!(total, 7);
        assert_eq!(h.get(42), 2);
        assert_eq!(h.count(), 2);
    }

    #[test]
    fn concurrent_increments_sum_exactly() {
        let h = Arc::new(Histogram::with_defaults());
        let workers = 8;
        let per_worker = 2_000u64;
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let h = Arc::clone(&h);
                thread::spawn(move || {
                    for i in 0..per_worker {
                        h.increment((w * per_worker + i) % 97);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        let mut total = 0u64;
        h.visit_all(|_, count| {
            total += count;
            true
        });
        assert_eq!(total, workers as u64 * per_worker);
    }

    #[test]
    fn rps_histogram_round_trips_bit_pattern() {
        let h = RpsHistogram::with_defaults();
        h.record(1234.5);
        h.record(1234.5);
        let mut seen = Vec::new();
        h.visit_all(|rps, count| {
            seen.push((rps, count));
            true
        });
        assert_eq!(seen, vec![(1234.5, 2)]);
    }
}
