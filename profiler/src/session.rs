//! Profiling session
//!
//! A `Session` owns every piece of profiling state for one emulation run: the code-unit registry
//! and the global instruction counters. The execution engine drives it through its event
//! callbacks:
//!
//! ```text
//! engine                         Session
//! ------                         -------
//! translate unit   ---------->   on_unit_translated()    classify, bind counters -> UnitHandle
//! enter unit       ---------->   UnitHandle::enter()     or on_unit_entered(address)
//! retire insn      ---------->   on_instruction_retired(binding)
//! exit             ---------->   on_session_end()        sum, rank, write report
//! ```
//!
//! No callback returns an error to the engine: inconsistencies such as events for unknown units
//! are logged and counted, and the run goes on.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use tbprof_core::StaticInsn;
use tracing::{info, warn};

use crate::{
    GlobalCounters, GlobalTotals, ProfilerError, Registry, Report, ReportFormat, ReportSink,
    RetireBinding, UnitHandle,
};

pub struct Session {
    registry: Registry,
    globals: Arc<GlobalCounters>,
    unknown_unit_events: AtomicU64,
}

impl Session {
    /// Creates a session for `n_contexts` concurrent execution contexts (at least one)
    pub fn new(n_contexts: usize) -> Self {
        Self {
            registry: Registry::new(n_contexts),
            globals: Arc::new(GlobalCounters::new(n_contexts)),
            unknown_unit_events: AtomicU64::new(0),
        }
    }

    pub fn n_contexts(&self) -> usize {
        self.globals.n_contexts()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Registers a translated code unit and returns its pre-bound accounting handle
    pub fn on_unit_translated<I, T>(&self, entry_address: u64, instructions: I) -> UnitHandle
    where
        I: IntoIterator<Item = T>,
        T: Into<StaticInsn>,
    {
        let instructions = instructions.into_iter().map(Into::into).collect();
        let unit = self.registry.register(entry_address, instructions);
        UnitHandle::new(unit, self.globals.clone())
    }

    pub fn lookup(&self, entry_address: u64) -> Option<UnitHandle> {
        self.registry.lookup(entry_address).map(|unit| UnitHandle::new(unit, self.globals.clone()))
    }

    /// Accounts one entry of the unit at `entry_address`
    ///
    /// Looks the unit up by address; engines that keep the `UnitHandle` returned at translation
    /// should call `UnitHandle::enter` instead.
    pub fn on_unit_entered(&self, entry_address: u64, context_id: usize) {
        match self.lookup(entry_address) {
            Some(unit) => unit.enter(context_id),
            None => self.unknown_unit("entered", entry_address, context_id),
        }
    }

    /// Accounts one retired instruction with the binding resolved at translation time
    #[inline(always)]
    pub fn on_instruction_retired(&self, context_id: usize, binding: &RetireBinding) {
        if self.globals.accepts(context_id) {
            self.globals.retire(context_id, binding);
        }
    }

    /// Accounts the retirement of instruction `index` of the unit at `entry_address`
    pub fn on_instruction_retired_at(&self, entry_address: u64, index: usize, context_id: usize) {
        match self.lookup(entry_address) {
            Some(unit) => {
                if !unit.retire(context_id, index) {
                    self.unknown_instruction(entry_address, index, context_id);
                }
            }
            None => self.unknown_unit("retired", entry_address, context_id),
        }
    }

    /// Accounts one entry of the unit at `entry_address` plus the retirement of all its
    /// instructions
    pub fn on_unit_executed(&self, entry_address: u64, context_id: usize) {
        match self.lookup(entry_address) {
            Some(unit) => unit.execute(context_id),
            None => self.unknown_unit("executed", entry_address, context_id),
        }
    }

    pub(crate) fn unknown_unit(&self, event: &str, entry_address: u64, context_id: usize) {
        warn!(
            "Session: unit {:#x} {} in context {} was never translated",
            entry_address, event, context_id
        );
        self.unknown_unit_events.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unknown_instruction(&self, entry_address: u64, index: usize, context_id: usize) {
        warn!(
            "Session: unit {:#x} has no instruction {} (context {})",
            entry_address, index, context_id
        );
        self.unknown_unit_events.fetch_add(1, Ordering::Relaxed);
    }

    /// Events ignored because they referred to unknown units or instructions
    pub fn unknown_unit_events(&self) -> u64 {
        self.unknown_unit_events.load(Ordering::Relaxed)
    }

    /// Events ignored because their context id is not below `n_contexts()`
    pub fn rejected_context_events(&self) -> u64 {
        self.globals.rejected_context_events()
    }

    pub fn totals(&self) -> GlobalTotals {
        self.globals.totals()
    }

    /// Sums every counter and ranks the code units; a snapshot if contexts are still running
    pub fn build_report(&self, top_n: usize) -> Report {
        Report::build(self.globals.totals(), self.globals.total_per_context(), &self.registry, top_n)
    }

    /// Ends the session: builds the report, releases the session state and writes the report to
    /// `sink`
    ///
    /// The session state is released before writing, so a failing sink still completes the
    /// teardown. On success the written report is returned.
    pub fn on_session_end(
        self,
        top_n: usize,
        format: ReportFormat,
        sink: &ReportSink,
    ) -> Result<Report, ProfilerError> {
        let report = self.build_report(top_n);
        info!(
            "Session ended: {} instructions, {} code units ({} retranslations), {} unknown unit events, {} rejected context events",
            report.totals.total_instructions,
            report.registered_units,
            self.registry.retranslations(),
            self.unknown_unit_events(),
            self.rejected_context_events()
        );
        drop(self);

        let mut writer = sink.open()?;
        report.write_to(&mut *writer, format)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tbprof_core::InsnBucket;

    fn scenario_unit(session: &Session) -> UnitHandle {
        session.on_unit_translated(0x1000, [(0x1000u64, "czero.eqz a0,a1"), (0x1004u64, "add a0,a0,a1")])
    }

    #[test]
    fn end_to_end_scenario() {
        let session = Session::new(1);
        let unit = scenario_unit(&session);

        for _ in 0..3 {
            session.on_unit_entered(0x1000, 0);
            for index in 0..2 {
                let binding = unit.binding(index).unwrap();
                session.on_instruction_retired(0, &binding);
            }
        }

        let totals = session.totals();
        assert_eq!(totals.total_instructions, 6);
        assert_eq!(totals.bucket(InsnBucket::CzeroEqz), 3);
        assert_eq!(totals.bucket(InsnBucket::CzeroNez), 0);
        assert_eq!(totals.bucket(InsnBucket::Cmov), 0);

        let report = session.build_report(10);
        assert_eq!(report.top_units.len(), 1);
        let top = &report.top_units[0];
        assert_eq!(top.entry_address, 0x1000);
        assert_eq!(top.execution_count, 3);
        assert_eq!(
            top.instructions,
            vec![StaticInsn::new(0x1000, "czero.eqz a0,a1"), StaticInsn::new(0x1004, "add a0,a0,a1")]
        );

        let text = report.render(ReportFormat::Plain);
        assert!(text.contains("czero.eqz / total instructions: 50.00%"));
        assert!(text.contains(
            "Basic Block at 0x1000 executed 3 times\nInstructions:\n  0x1000: czero.eqz a0,a1\n  0x1004: add a0,a0,a1\n"
        ));
    }

    #[test]
    fn total_matches_number_of_retirements() {
        let session = Session::new(3);
        let unit = session.on_unit_translated(
            0x2000,
            [(0x2000u64, "cmovne %eax,%ebx"), (0x2003u64, "czero.nez a0,a1"), (0x2007u64, "ret")],
        );

        let mut calls = 0u64;
        for context_id in [0, 2, 1, 1, 0, 2, 2] {
            for index in 0..3 {
                session.on_instruction_retired(context_id, &unit.binding(index).unwrap());
                calls += 1;
            }
        }

        let totals = session.totals();
        assert_eq!(totals.total_instructions, calls);
        assert_eq!(totals.bucket(InsnBucket::Cmov), 7);
        assert_eq!(totals.bucket(InsnBucket::CzeroNez), 7);
        assert_eq!(totals.bucket(InsnBucket::CzeroEqz), 0);
    }

    #[test]
    fn retranslation_does_not_reset_execution_count() {
        let session = Session::new(1);
        let first = scenario_unit(&session);
        first.enter(0);
        first.enter(0);

        let second = scenario_unit(&session);
        second.enter(0);
        // Handles bound before the retranslation keep counting into the same unit
        first.enter(0);

        assert_eq!(session.registry().len(), 1);
        assert_eq!(session.lookup(0x1000).unwrap().execution_count(), 4);
        assert_eq!(session.build_report(10).top_units[0].execution_count, 4);
    }

    #[test]
    fn unknown_units_are_ignored() {
        let session = Session::new(1);
        session.on_unit_entered(0xdead, 0);
        session.on_unit_executed(0xdead, 0);
        session.on_instruction_retired_at(0xdead, 0, 0);
        scenario_unit(&session);
        session.on_instruction_retired_at(0x1000, 7, 0);

        assert_eq!(session.unknown_unit_events(), 4);
        assert_eq!(session.totals().total_instructions, 0);
        assert_eq!(session.build_report(10).top_units[0].execution_count, 0);
    }

    #[test]
    fn out_of_range_contexts_are_rejected_and_counted() {
        let session = Session::new(2);
        let unit = scenario_unit(&session);
        let binding = unit.binding(0).unwrap();

        session.on_instruction_retired(1, &binding);
        session.on_instruction_retired(2, &binding);
        session.on_unit_entered(0x1000, 5);
        session.on_instruction_retired_at(0x1000, 0, 2);
        session.on_unit_executed(0x1000, 2);

        assert_eq!(session.rejected_context_events(), 4);
        assert_eq!(session.unknown_unit_events(), 0);
        assert_eq!(session.totals().total_instructions, 1);
        assert_eq!(unit.execution_count(), 0);
    }

    #[test]
    fn ranking_is_sorted_and_deterministic() {
        let build = || {
            let session = Session::new(2);
            for (entry, executions) in [(0x500, 1), (0x100, 4), (0x300, 4), (0x200, 9), (0x400, 0)] {
                let unit = session.on_unit_translated(entry, [(entry, "nop")]);
                for i in 0..executions {
                    unit.execute(i % 2);
                }
            }
            session.build_report(3)
        };

        let report = build();
        let ranked: Vec<(u64, u64)> = report
            .top_units
            .iter()
            .map(|unit| (unit.entry_address, unit.execution_count))
            .collect();
        assert_eq!(ranked, vec![(0x200, 9), (0x100, 4), (0x300, 4)]);
        assert_eq!(report.registered_units, 5);
        assert_eq!(report.totals.total_instructions, 18);
        for _ in 0..5 {
            assert_eq!(build(), report);
        }
    }

    #[test]
    fn concurrent_contexts_lose_no_updates() {
        const CONTEXTS: usize = 6;
        const EXECUTIONS: usize = 5_000;

        let session = Session::new(CONTEXTS);
        let unit = scenario_unit(&session);
        std::thread::scope(|scope| {
            for context_id in 0..CONTEXTS {
                let (session, unit) = (&session, unit.clone());
                scope.spawn(move || {
                    for _ in 0..EXECUTIONS {
                        unit.enter(context_id);
                        for index in 0..2 {
                            session.on_instruction_retired(context_id, &unit.binding(index).unwrap());
                        }
                    }
                });
            }
        });

        let totals = session.totals();
        assert_eq!(totals.total_instructions, (CONTEXTS * EXECUTIONS * 2) as u64);
        assert_eq!(totals.bucket(InsnBucket::CzeroEqz), (CONTEXTS * EXECUTIONS) as u64);
        assert_eq!(unit.execution_count(), (CONTEXTS * EXECUTIONS) as u64);
    }

    #[test]
    fn session_end_writes_report_file() {
        let path = std::env::temp_dir().join(format!("tbprof-session-{}.txt", std::process::id()));
        let session = Session::new(1);
        scenario_unit(&session).execute(0);

        let report = session
            .on_session_end(10, ReportFormat::Plain, &ReportSink::File(path.clone()))
            .unwrap();
        let written = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(written, report.render(ReportFormat::Plain));
        assert!(written.starts_with("Total instructions: 2\n"));
    }

    #[test]
    fn session_end_reports_unavailable_sink() {
        let session = Session::new(1);
        scenario_unit(&session);
        let sink = ReportSink::File("/nonexistent-tbprof-dir/report.txt".into());

        let result = session.on_session_end(10, ReportFormat::Plain, &sink);
        assert!(matches!(result, Err(ProfilerError::SinkUnavailable { .. })));
    }
}
