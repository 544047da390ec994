//! Per-context counter storage
//!
//! A `Scoreboard` keeps `n_counters` 64-bit counters for each one of `n_contexts` execution
//! contexts (virtual processors). Every context owns a disjoint row of cache-line aligned storage,
//! so two contexts never write to the same cache line and increments need no synchronization
//! between contexts. The value of a counter is the sum of its per-context shards, computed on
//! demand.
//!
//! ```text
//!              counter 0   counter 1   ...   counter n-1   (padding)
//! context 0  | shard     | shard     | ... | shard       | ......... |  <- own cache lines
//! context 1  | shard     | shard     | ... | shard       | ......... |  <- own cache lines
//! ...
//! ```
//!
//! Every shard has a single writer, its context, so an increment is a relaxed load followed by a
//! relaxed store. Two threads incrementing through the same context id may lose updates.
//!
//! Counters saturate at `u64::MAX` instead of wrapping around, so an overflowing counter is
//! reported as `u64::MAX` and never as a small value.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

/// Number of u64 counters that fit in a cache line
const CACHE_LINE_WORDS: usize = 8;

#[derive(Default)]
#[repr(align(64))]
struct CacheLine([AtomicU64; CACHE_LINE_WORDS]);

/// Handle to one counter of a scoreboard
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Counter(usize);

impl Counter {
    pub(crate) const fn new(index: usize) -> Self {
        Counter(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

pub struct Scoreboard {
    lines: Box<[CacheLine]>,
    lines_per_context: usize,
    n_counters: usize,
    n_contexts: usize,
}

impl Scoreboard {
    /// Allocates `n_counters` counters, each with one zeroed shard per context. At least one
    /// context is always allocated.
    pub fn new(n_counters: usize, n_contexts: usize) -> Self {
        let n_contexts = n_contexts.max(1);
        let lines_per_context = n_counters.div_ceil(CACHE_LINE_WORDS).max(1);
        let lines = (0..lines_per_context * n_contexts).map(|_| CacheLine::default()).collect();
        Self { lines, lines_per_context, n_counters, n_contexts }
    }

    pub fn n_counters(&self) -> usize {
        self.n_counters
    }

    pub fn n_contexts(&self) -> usize {
        self.n_contexts
    }

    /// Returns the handle of the counter at `index`, if it was allocated
    pub fn counter(&self, index: usize) -> Option<Counter> {
        (index < self.n_counters).then_some(Counter(index))
    }

    /// Iterates over the handles of all the allocated counters
    pub fn counters(&self) -> impl Iterator<Item = Counter> {
        (0..self.n_counters).map(Counter)
    }

    #[inline(always)]
    fn shard(&self, counter: Counter, context_id: usize) -> Option<&AtomicU64> {
        if counter.0 >= self.n_counters || context_id >= self.n_contexts {
            return None;
        }
        let line = context_id * self.lines_per_context + counter.0 / CACHE_LINE_WORDS;
        Some(&self.lines[line].0[counter.0 % CACHE_LINE_WORDS])
    }

    /// Adds `amount` to the shard of `context_id`, saturating at `u64::MAX`
    ///
    /// Must only be called by the execution context that owns `context_id`. Unknown counters or
    /// contexts are logged and ignored.
    #[inline(always)]
    pub fn add(&self, counter: Counter, context_id: usize, amount: u64) {
        match self.shard(counter, context_id) {
            Some(shard) => {
                let value = shard.load(Ordering::Relaxed);
                shard.store(value.saturating_add(amount), Ordering::Relaxed);
            }
            None => warn!(
                "Scoreboard::add() ignored counter={} context={} (counters={} contexts={})",
                counter.0, context_id, self.n_counters, self.n_contexts
            ),
        }
    }

    /// Value of one shard of a counter, or 0 if the counter or context do not exist
    pub fn get(&self, counter: Counter, context_id: usize) -> u64 {
        self.shard(counter, context_id).map_or(0, |shard| shard.load(Ordering::Relaxed))
    }

    /// Per-context values of a counter, in context order
    pub fn per_context(&self, counter: Counter) -> impl Iterator<Item = u64> + '_ {
        (0..self.n_contexts).map(move |context_id| self.get(counter, context_id))
    }

    /// Saturating sum of all the shards of a counter
    ///
    /// Exact once every context has stopped incrementing, a best-effort snapshot otherwise.
    pub fn sum(&self, counter: Counter) -> u64 {
        self.per_context(counter).fold(0u64, u64::saturating_add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn sums_all_context_shards() {
        let scoreboard = Scoreboard::new(2, 4);
        let a = scoreboard.counter(0).unwrap();
        let b = scoreboard.counter(1).unwrap();

        for context_id in 0..4 {
            scoreboard.add(a, context_id, context_id as u64 + 1);
        }
        scoreboard.add(b, 2, 7);

        assert_eq!(scoreboard.sum(a), 1 + 2 + 3 + 4);
        assert_eq!(scoreboard.sum(b), 7);
        assert_eq!(scoreboard.per_context(b).collect::<Vec<_>>(), vec![0, 0, 7, 0]);
        assert_eq!(scoreboard.get(a, 3), 4);
    }

    #[test]
    fn counters_do_not_alias_across_contexts() {
        // More counters than a cache line holds, to exercise multi-line rows
        let scoreboard = Scoreboard::new(CACHE_LINE_WORDS + 3, 3);
        for counter in scoreboard.counters() {
            scoreboard.add(counter, 1, counter.index() as u64);
        }
        for counter in scoreboard.counters() {
            assert_eq!(scoreboard.get(counter, 0), 0);
            assert_eq!(scoreboard.get(counter, 1), counter.index() as u64);
            assert_eq!(scoreboard.get(counter, 2), 0);
        }
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let scoreboard = Scoreboard::new(1, 2);
        let counter = scoreboard.counter(0).unwrap();
        scoreboard.add(counter, 0, u64::MAX - 1);
        scoreboard.add(counter, 0, 5);
        assert_eq!(scoreboard.get(counter, 0), u64::MAX);

        // The sum saturates as well
        scoreboard.add(counter, 1, 10);
        assert_eq!(scoreboard.sum(counter), u64::MAX);
    }

    #[test]
    fn ignores_unknown_counters_and_contexts() {
        let scoreboard = Scoreboard::new(1, 2);
        let counter = scoreboard.counter(0).unwrap();
        assert!(scoreboard.counter(1).is_none());

        scoreboard.add(counter, 2, 1);
        scoreboard.add(Counter::new(9), 0, 1);
        assert_eq!(scoreboard.sum(counter), 0);
        assert_eq!(scoreboard.get(counter, 5), 0);
    }

    #[test]
    fn allocates_at_least_one_context() {
        let scoreboard = Scoreboard::new(1, 0);
        assert_eq!(scoreboard.n_contexts(), 1);
        let counter = scoreboard.counter(0).unwrap();
        scoreboard.add(counter, 0, 3);
        assert_eq!(scoreboard.sum(counter), 3);
    }

    #[test]
    fn concurrent_contexts_lose_no_updates() {
        const CONTEXTS: usize = 8;
        const EVENTS: u64 = 10_000;

        let scoreboard = Scoreboard::new(1, CONTEXTS);
        let counter = scoreboard.counter(0).unwrap();
        (0..CONTEXTS).into_par_iter().for_each(|context_id| {
            for _ in 0..EVENTS {
                scoreboard.add(counter, context_id, 1);
            }
        });

        assert_eq!(scoreboard.sum(counter), CONTEXTS as u64 * EVENTS);
        assert!(scoreboard.per_context(counter).all(|value| value == EVENTS));
    }
}
