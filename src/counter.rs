//! Lock-free counters
//!
//! Three shapes of shared mutable counter, all built on atomic
//! read-modify-write without locks:
//!
//! - [`AtomicCell`]: a single value updated through compare-exchange retry
//!   loops (`update_and_get`, `accumulate_and_get`, `max_and_get`).
//! - [`ShardedCounter`]: an adder split across cache-padded shards so that
//!   threads incrementing concurrently touch different cache lines. Reads sum
//!   the shards.
//! - [`Accumulator`]: the sharded idea generalised to any associative,
//!   commutative operation with an identity (sum, max, min, ...).
//!
//! Sharded reads are snapshots: updates racing with `sum` may or may not be
//! included, but every completed update is counted exactly once.

use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

static NEXT_SHARD: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static SHARD_HINT: usize = NEXT_SHARD.fetch_add(1, Ordering::Relaxed);
}

fn default_shards() -> usize {
    (num_cpus::get() * 2).next_power_of_two().clamp(4, 64)
}

fn shard_index(shards: usize) -> usize {
    SHARD_HINT.with(|hint| *hint % shards)
}

/// Single atomic value with functional update helpers
#[derive(Debug, Default)]
pub struct AtomicCell {
    value: AtomicI64,
}

impl AtomicCell {
    pub fn new(value: i64) -> Self {
        Self {
            value: AtomicI64::new(value),
        }
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Acquire)
    }

    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Release);
    }

    /// Store `new` only if the current value is `current`; returns the actual value on failure
    pub fn compare_and_set(&self, current: i64, new: i64) -> Result<i64, i64> {
        self.value
            .compare_exchange(current, new, Ordering::AcqRel, Ordering::Acquire)
    }

    /// Apply `f` atomically and return the new value
    ///
    /// `f` may run several times under contention, so it must be pure.
    pub fn update_and_get(&self, f: impl Fn(i64) -> i64) -> i64 {
        let mut current = self.get();
        loop {
            let next = f(current);
            match self.value.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return next,
                Err(actual) => current = actual,
            }
        }
    }

    /// Apply `f` atomically and return the previous value
    pub fn get_and_update(&self, f: impl Fn(i64) -> i64) -> i64 {
        let mut current = self.get();
        loop {
            match self.value.compare_exchange_weak(
                current,
                f(current),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(previous) => return previous,
                Err(actual) => current = actual,
            }
        }
    }

    /// Combine `x` into the value with `op` and return the result
    pub fn accumulate_and_get(&self, x: i64, op: impl Fn(i64, i64) -> i64) -> i64 {
        self.update_and_get(|current| op(current, x))
    }

    /// Raise the value to at least `observed`
    pub fn max_and_get(&self, observed: i64) -> i64 {
        self.accumulate_and_get(observed, i64::max)
    }

    pub fn add_and_get(&self, delta: i64) -> i64 {
        self.value.fetch_add(delta, Ordering::AcqRel) + delta
    }
}

/// Contention-friendly adder
#[derive(Debug)]
pub struct ShardedCounter {
    shards: Box<[CachePadded<AtomicI64>]>,
}

impl Default for ShardedCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardedCounter {
    pub fn new() -> Self {
        Self::with_shards(default_shards())
    }

    pub fn with_shards(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| CachePadded::new(AtomicI64::new(0)))
            .collect();
        Self { shards }
    }

    pub fn add(&self, delta: i64) {
        self.shards[shard_index(self.shards.len())].fetch_add(delta, Ordering::Relaxed);
    }

    pub fn increment(&self) {
        self.add(1);
    }

    pub fn decrement(&self) {
        self.add(-1);
    }

    /// Current total across all shards
    pub fn sum(&self) -> i64 {
        self.shards.iter().map(|s| s.load(Ordering::Relaxed)).sum()
    }

    /// Take the total and zero every shard
    pub fn sum_and_reset(&self) -> i64 {
        self.shards.iter().map(|s| s.swap(0, Ordering::Relaxed)).sum()
    }

    pub fn reset(&self) {
        for shard in self.shards.iter() {
            shard.store(0, Ordering::Relaxed);
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

/// Sharded accumulator for an associative, commutative operation
pub struct Accumulator<F> {
    shards: Box<[CachePadded<AtomicI64>]>,
    op: F,
    identity: i64,
}

impl<F> std::fmt::Debug for Accumulator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accumulator")
            .field("shards", &self.shards.len())
            .field("identity", &self.identity)
            .finish()
    }
}

impl<F> Accumulator<F>
where
    F: Fn(i64, i64) -> i64,
{
    pub fn new(op: F, identity: i64) -> Self {
        Self::with_shards(op, identity, default_shards())
    }

    pub fn with_shards(op: F, identity: i64, shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| CachePadded::new(AtomicI64::new(identity)))
            .collect();
        Self {
            shards,
            op,
            identity,
        }
    }

    pub fn accumulate(&self, x: i64) {
        let shard = &self.shards[shard_index(self.shards.len())];
        let mut current = shard.load(Ordering::Relaxed);
        loop {
            let next = (self.op)(current, x);
            match shard.compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    pub fn get(&self) -> i64 {
        self.shards
            .iter()
            .map(|s| s.load(Ordering::Relaxed))
            .fold(self.identity, &self.op)
    }

    pub fn get_then_reset(&self) -> i64 {
        self.shards
            .iter()
            .map(|s| s.swap(self.identity, Ordering::Relaxed))
            .fold(self.identity, &self.op)
    }

    pub fn reset(&self) {
        for shard in self.shards.iter() {
            shard.store(self.identity, Ordering::Relaxed);
        }
    }
}

/// Accumulator tracking the largest value seen
pub fn max_accumulator() -> Accumulator<fn(i64, i64) -> i64> {
    Accumulator::new(i64::max as fn(i64, i64) -> i64, i64::MIN)
}

/// Accumulator tracking a running sum
pub fn sum_accumulator() -> Accumulator<fn(i64, i64) -> i64> {
    Accumulator::new(i64::wrapping_add as fn(i64, i64) -> i64, 0)
}
