//! Code-unit registry: entry address -> registered code unit
//!
//! Registration happens once per translation and takes the write lock only around the insert.
//! Re-registering an address replaces its static listing (last registration wins) but keeps its
//! execution counter, so counts accumulated before the re-translation are preserved.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, PoisonError, RwLock,
    },
};

use tbprof_core::StaticInsn;
use tracing::debug;

use crate::{CodeUnit, Scoreboard, StaticListing};

pub struct Registry {
    units: RwLock<HashMap<u64, Arc<CodeUnit>>>,
    n_contexts: usize,
    retranslations: AtomicU64,
}

impl Registry {
    pub fn new(n_contexts: usize) -> Self {
        Self {
            units: RwLock::new(HashMap::new()),
            n_contexts: n_contexts.max(1),
            retranslations: AtomicU64::new(0),
        }
    }

    /// Registers the code unit starting at `entry_address`
    pub fn register(&self, entry_address: u64, instructions: Vec<StaticInsn>) -> Arc<CodeUnit> {
        // Classify outside of the lock
        let listing = StaticListing::new(instructions);
        let n_insns = listing.len();

        let mut units = self.units.write().unwrap_or_else(PoisonError::into_inner);
        let executions = match units.get(&entry_address) {
            Some(previous) => {
                self.retranslations.fetch_add(1, Ordering::Relaxed);
                previous.executions().clone()
            }
            None => Arc::new(Scoreboard::new(1, self.n_contexts)),
        };
        let unit = Arc::new(CodeUnit::new(entry_address, listing, executions));
        units.insert(entry_address, unit.clone());
        drop(units);

        debug!("Registry::register() unit={:#x} instructions={}", entry_address, n_insns);
        unit
    }

    pub fn lookup(&self, entry_address: u64) -> Option<Arc<CodeUnit>> {
        self.units.read().unwrap_or_else(PoisonError::into_inner).get(&entry_address).cloned()
    }

    pub fn len(&self) -> usize {
        self.units.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of registrations of an already known entry address
    pub fn retranslations(&self) -> u64 {
        self.retranslations.load(Ordering::Relaxed)
    }

    /// Returns all the units with their execution counts, most executed first; units with the same
    /// count are ordered by ascending entry address
    pub fn ranked(&self) -> Vec<(u64, Arc<CodeUnit>)> {
        let mut ranked: Vec<(u64, Arc<CodeUnit>)> = self
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|unit| (unit.execution_count(), unit.clone()))
            .collect();
        ranked.sort_by(|(count_a, unit_a), (count_b, unit_b)| {
            count_b.cmp(count_a).then(unit_a.entry_address().cmp(&unit_b.entry_address()))
        });
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Counter;

    fn insns(entry: u64, mnemonics: &[&str]) -> Vec<StaticInsn> {
        mnemonics
            .iter()
            .enumerate()
            .map(|(i, mnemonic)| StaticInsn::new(entry + 4 * i as u64, *mnemonic))
            .collect()
    }

    #[test]
    fn registers_and_looks_up_units() {
        let registry = Registry::new(1);
        assert!(registry.is_empty());
        registry.register(0x1000, insns(0x1000, &["add a0,a0,a1"]));

        let unit = registry.lookup(0x1000).unwrap();
        assert_eq!(unit.entry_address(), 0x1000);
        assert_eq!(unit.instructions().len(), 1);
        assert!(registry.lookup(0x2000).is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reregistration_keeps_execution_count() {
        let registry = Registry::new(2);
        let first = registry.register(0x1000, insns(0x1000, &["add a0,a0,a1"]));
        first.executions().add(Counter::new(0), 0, 5);

        let second = registry.register(0x1000, insns(0x1000, &["sub a0,a0,a1", "ret"]));
        second.executions().add(Counter::new(0), 1, 2);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.retranslations(), 1);
        let unit = registry.lookup(0x1000).unwrap();
        assert_eq!(unit.execution_count(), 7);
        // Last registration wins
        assert_eq!(unit.instructions()[0].mnemonic, "sub a0,a0,a1");
        assert_eq!(unit.instructions().len(), 2);
    }

    #[test]
    fn ranks_by_count_then_address() {
        let registry = Registry::new(1);
        for (entry, count) in [(0x3000, 2), (0x1000, 5), (0x2000, 2), (0x4000, 0)] {
            let unit = registry.register(entry, insns(entry, &["nop"]));
            unit.executions().add(Counter::new(0), 0, count);
        }

        let ranked: Vec<(u64, u64)> =
            registry.ranked().iter().map(|(count, unit)| (unit.entry_address(), *count)).collect();
        assert_eq!(ranked, vec![(0x1000, 5), (0x2000, 2), (0x3000, 2), (0x4000, 0)]);
    }

    #[test]
    fn concurrent_registration_of_different_addresses() {
        let registry = Registry::new(4);
        std::thread::scope(|scope| {
            for context_id in 0..4u64 {
                let registry = &registry;
                scope.spawn(move || {
                    for i in 0..100u64 {
                        let entry = 0x10_0000 * (context_id + 1) + 0x10 * i;
                        registry.register(entry, insns(entry, &["nop", "nop"]));
                    }
                });
            }
        });
        assert_eq!(registry.len(), 400);
        assert_eq!(registry.retranslations(), 0);
    }
}
