//! Code units
//!
//! A code unit is a region of guest instructions translated at once by the execution engine (a
//! translation block). Its static content is classified once, when it is registered, and every
//! dynamic event is then accounted through counters bound at that moment:
//!
//! * entering the unit increments its own execution counter,
//! * retiring one of its instructions increments the total instructions counter and, if the
//!   instruction belongs to a bucket, that bucket counter.
//!
//! None of the hot path methods (`enter`, `retire`, `execute`) allocate, lock, or compare strings.

use std::sync::Arc;

use tbprof_core::{InsnBucket, StaticInsn, BUCKET_COUNT};

use crate::{Counter, GlobalCounters, Scoreboard};

/// Accounting of one static instruction when it retires, resolved at registration time
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RetireBinding {
    bucket: Option<InsnBucket>,
}

impl RetireBinding {
    pub const fn new(bucket: Option<InsnBucket>) -> Self {
        Self { bucket }
    }

    #[inline(always)]
    pub fn bucket(&self) -> Option<InsnBucket> {
        self.bucket
    }
}

/// Classified static content of a code unit
#[derive(Clone, Debug, Default)]
pub struct StaticListing {
    instructions: Vec<StaticInsn>,
    bindings: Vec<RetireBinding>,
    bucket_totals: [u64; BUCKET_COUNT],
}

impl StaticListing {
    /// Classifies every instruction and counts how many of them fall in each bucket
    pub fn new(instructions: Vec<StaticInsn>) -> Self {
        let mut bucket_totals = [0u64; BUCKET_COUNT];
        let bindings = instructions
            .iter()
            .map(|insn| {
                let bucket = insn.bucket();
                if let Some(bucket) = bucket {
                    bucket_totals[bucket.index()] += 1;
                }
                RetireBinding::new(bucket)
            })
            .collect();
        Self { instructions, bindings, bucket_totals }
    }

    pub fn instructions(&self) -> &[StaticInsn] {
        &self.instructions
    }

    pub fn bindings(&self) -> &[RetireBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Registered code unit: static listing plus its sharded execution counter
///
/// The execution counter storage is shared between all the registrations of the same entry
/// address, so re-translating a unit never resets its count.
pub struct CodeUnit {
    entry_address: u64,
    listing: StaticListing,
    executions: Arc<Scoreboard>,
}

impl CodeUnit {
    pub(crate) fn new(entry_address: u64, listing: StaticListing, executions: Arc<Scoreboard>) -> Self {
        Self { entry_address, listing, executions }
    }

    pub fn entry_address(&self) -> u64 {
        self.entry_address
    }

    pub fn instructions(&self) -> &[StaticInsn] {
        self.listing.instructions()
    }

    pub fn listing(&self) -> &StaticListing {
        &self.listing
    }

    pub(crate) fn executions(&self) -> &Arc<Scoreboard> {
        &self.executions
    }

    #[inline(always)]
    fn execution_counter(&self) -> Counter {
        Counter::new(0)
    }

    /// Times the unit has been entered, summed over all the contexts
    pub fn execution_count(&self) -> u64 {
        self.executions.sum(self.execution_counter())
    }
}

/// Pre-bound accounting handle of a registered code unit, returned at translation time
///
/// Engines keep the handle next to their translated code and call it on every execution, so the
/// hot path never looks the unit up by address.
#[derive(Clone)]
pub struct UnitHandle {
    unit: Arc<CodeUnit>,
    globals: Arc<GlobalCounters>,
}

impl UnitHandle {
    pub(crate) fn new(unit: Arc<CodeUnit>, globals: Arc<GlobalCounters>) -> Self {
        Self { unit, globals }
    }

    pub fn entry_address(&self) -> u64 {
        self.unit.entry_address()
    }

    pub fn instructions(&self) -> &[StaticInsn] {
        self.unit.instructions()
    }

    pub fn execution_count(&self) -> u64 {
        self.unit.execution_count()
    }

    /// Retirement binding of the instruction at `index` inside the unit
    pub fn binding(&self, index: usize) -> Option<RetireBinding> {
        self.unit.listing.bindings.get(index).copied()
    }

    /// Accounts one entry of the unit in `context_id`
    ///
    /// Events of out-of-range contexts are not accounted and are counted as rejected.
    #[inline(always)]
    pub fn enter(&self, context_id: usize) {
        if self.globals.accepts(context_id) {
            self.unit.executions.add(self.unit.execution_counter(), context_id, 1);
        }
    }

    /// Accounts the retirement of the instruction at `index`; returns false if there is no such
    /// instruction
    #[inline(always)]
    pub fn retire(&self, context_id: usize, index: usize) -> bool {
        match self.unit.listing.bindings.get(index) {
            Some(binding) => {
                if self.globals.accepts(context_id) {
                    self.globals.retire(context_id, binding);
                }
                true
            }
            None => false,
        }
    }

    /// Accounts one entry of the unit followed by the retirement of all its instructions
    #[inline(always)]
    pub fn execute(&self, context_id: usize) {
        if !self.globals.accepts(context_id) {
            return;
        }
        self.unit.executions.add(self.unit.execution_counter(), context_id, 1);
        let listing = &self.unit.listing;
        self.globals.retire_many(context_id, listing.len() as u64, &listing.bucket_totals);
    }
}
