//! Session-wide instruction counters: total of executed instructions and one counter per
//! instruction bucket, all of them sharded per execution context.

use std::sync::atomic::{AtomicU64, Ordering};

use tbprof_core::{InsnBucket, BUCKET_COUNT};
use tracing::warn;

use crate::{Counter, RetireBinding, Scoreboard};

/// Scoreboard position of the total instructions counter; buckets follow it
const TOTAL_COUNTER: usize = 0;

pub struct GlobalCounters {
    scoreboard: Scoreboard,
    rejected_context_events: AtomicU64,
}

impl GlobalCounters {
    pub fn new(n_contexts: usize) -> Self {
        Self {
            scoreboard: Scoreboard::new(1 + BUCKET_COUNT, n_contexts),
            rejected_context_events: AtomicU64::new(0),
        }
    }

    pub fn n_contexts(&self) -> usize {
        self.scoreboard.n_contexts()
    }

    /// Returns true if `context_id` has its own shards; otherwise counts the event as rejected
    ///
    /// Only the first rejection is logged.
    #[inline(always)]
    pub fn accepts(&self, context_id: usize) -> bool {
        if context_id < self.scoreboard.n_contexts() {
            return true;
        }
        if self.rejected_context_events.fetch_add(1, Ordering::Relaxed) == 0 {
            warn!(
                "GlobalCounters: event in context {} ignored, the session has {} contexts",
                context_id,
                self.scoreboard.n_contexts()
            );
        }
        false
    }

    /// Events ignored because their context id was out of range
    pub fn rejected_context_events(&self) -> u64 {
        self.rejected_context_events.load(Ordering::Relaxed)
    }

    #[inline(always)]
    pub fn total(&self) -> Counter {
        Counter::new(TOTAL_COUNTER)
    }

    #[inline(always)]
    pub fn bucket(&self, bucket: InsnBucket) -> Counter {
        Counter::new(TOTAL_COUNTER + 1 + bucket.index())
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    /// Accounts one retired instruction
    #[inline(always)]
    pub fn retire(&self, context_id: usize, binding: &RetireBinding) {
        self.scoreboard.add(self.total(), context_id, 1);
        if let Some(bucket) = binding.bucket() {
            self.scoreboard.add(self.bucket(bucket), context_id, 1);
        }
    }

    /// Accounts `n_insns` retired instructions, `per_bucket[b]` of them in bucket `b`
    #[inline(always)]
    pub fn retire_many(&self, context_id: usize, n_insns: u64, per_bucket: &[u64; BUCKET_COUNT]) {
        self.scoreboard.add(self.total(), context_id, n_insns);
        for bucket in InsnBucket::ALL {
            let amount = per_bucket[bucket.index()];
            if amount != 0 {
                self.scoreboard.add(self.bucket(bucket), context_id, amount);
            }
        }
    }

    /// Sums the shards of every counter
    pub fn totals(&self) -> GlobalTotals {
        let mut buckets = [0u64; BUCKET_COUNT];
        for bucket in InsnBucket::ALL {
            buckets[bucket.index()] = self.scoreboard.sum(self.bucket(bucket));
        }
        GlobalTotals { total_instructions: self.scoreboard.sum(self.total()), buckets }
    }

    /// Total instructions retired by each context
    pub fn total_per_context(&self) -> Vec<u64> {
        self.scoreboard.per_context(self.total()).collect()
    }
}

/// Counter values summed over all the contexts
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GlobalTotals {
    pub total_instructions: u64,
    pub buckets: [u64; BUCKET_COUNT],
}

impl GlobalTotals {
    pub fn bucket(&self, bucket: InsnBucket) -> u64 {
        self.buckets[bucket.index()]
    }

    /// Share of the bucket over the total instructions, in percent
    pub fn bucket_percentage(&self, bucket: InsnBucket) -> f64 {
        percentage(self.bucket(bucket), self.total_instructions)
    }
}

/// Returns `part * 100 / total`, or 0 when `total` is 0
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 * 100.0 / total as f64
}
