//! Replays a recorded event trace into a session
//!
//! The replay plays the role of the execution engine: it keeps the `UnitHandle` returned by every
//! translation in its own table and accounts each execution event through the handle installed at
//! that entry address at that point of the trace, so execution events never go through the
//! registry lock. An event for an address with no translation before it is an unknown unit event.
//!
//! Sequential replay applies the events in trace order. Parallel replay plays the role of an
//! engine with one thread per virtual processor: a first sequential pass registers the
//! translations and resolves the handle of every execution event, then the events of each context
//! are replayed on the rayon thread pool, one worker per context, so every context keeps a single
//! writer. Both modes give the same counts. Events after `end` are ignored in both modes.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::debug;

use crate::{Session, TraceEvent, UnitHandle};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub events: usize,
    pub translations: usize,
    pub contexts: usize,
    pub ended: bool,
}

/// Handles of the translated units, in translation order, and the one installed at each address
#[derive(Default)]
struct UnitTable {
    handles: Vec<UnitHandle>,
    installed: HashMap<u64, usize>,
}

impl UnitTable {
    fn translate(&mut self, session: &Session, pc: u64, insns: &[(u64, String)]) {
        let handle = session.on_unit_translated(pc, TraceEvent::static_insns(insns));
        self.installed.insert(pc, self.handles.len());
        self.handles.push(handle);
    }

    /// Position in `handles` of the unit currently installed at `pc`
    fn resolve(&self, pc: u64) -> Option<usize> {
        self.installed.get(&pc).copied()
    }

    fn handle(&self, position: Option<usize>) -> Option<&UnitHandle> {
        position.and_then(|position| self.handles.get(position))
    }
}

/// Accounts one execution event through the handle it was resolved to
fn execute(session: &Session, unit: Option<&UnitHandle>, event: &TraceEvent) {
    match (event, unit) {
        (TraceEvent::Enter { ctx, .. }, Some(unit)) => unit.enter(*ctx),
        (TraceEvent::Retire { index, ctx, .. }, Some(unit)) => {
            if !unit.retire(*ctx, *index) {
                session.unknown_instruction(unit.entry_address(), *index, *ctx);
            }
        }
        (TraceEvent::Exec { ctx, .. }, Some(unit)) => unit.execute(*ctx),
        (TraceEvent::Enter { pc, ctx }, None) => session.unknown_unit("entered", *pc, *ctx),
        (TraceEvent::Retire { pc, ctx, .. }, None) => session.unknown_unit("retired", *pc, *ctx),
        (TraceEvent::Exec { pc, ctx }, None) => session.unknown_unit("executed", *pc, *ctx),
        (TraceEvent::Translate { .. } | TraceEvent::End, _) => {}
    }
}

/// Events up to, and not including, the first `end` event
fn until_end(events: &[TraceEvent]) -> (&[TraceEvent], bool) {
    match events.iter().position(|event| *event == TraceEvent::End) {
        Some(end) => (&events[..end], true),
        None => (events, false),
    }
}

/// Number of contexts a session needs to account every event of the trace: the highest context
/// id plus one, or 0 for a trace without execution events
pub fn trace_contexts(events: &[TraceEvent]) -> usize {
    let (events, _) = until_end(events);
    events.iter().filter_map(TraceEvent::context).max().map_or(0, |ctx| ctx.saturating_add(1))
}

pub fn replay(session: &Session, events: &[TraceEvent]) -> ReplayStats {
    let (events, ended) = until_end(events);
    let mut stats = ReplayStats { events: events.len(), ended, ..Default::default() };
    let mut contexts = BTreeSet::new();
    let mut table = UnitTable::default();
    for event in events {
        match event {
            TraceEvent::Translate { pc, insns } => {
                table.translate(session, *pc, insns);
                stats.translations += 1;
            }
            _ => {
                if let Some(ctx) = event.context() {
                    contexts.insert(ctx);
                }
                let position = event.unit_address().and_then(|pc| table.resolve(pc));
                execute(session, table.handle(position), event);
            }
        }
    }
    stats.contexts = contexts.len();
    stats
}

pub fn replay_parallel(session: &Session, events: &[TraceEvent]) -> ReplayStats {
    let (events, ended) = until_end(events);
    let mut stats = ReplayStats { events: events.len(), ended, ..Default::default() };

    let mut table = UnitTable::default();
    let mut streams: BTreeMap<usize, Vec<(Option<usize>, &TraceEvent)>> = BTreeMap::new();
    for event in events {
        match event {
            TraceEvent::Translate { pc, insns } => {
                table.translate(session, *pc, insns);
                stats.translations += 1;
            }
            _ => {
                if let Some(ctx) = event.context() {
                    let position = event.unit_address().and_then(|pc| table.resolve(pc));
                    streams.entry(ctx).or_default().push((position, event));
                }
            }
        }
    }
    stats.contexts = streams.len();
    debug!(
        "replay_parallel() {} translations, {} context streams",
        stats.translations, stats.contexts
    );

    let table = &table;
    streams.into_par_iter().for_each(|(_, stream)| {
        for (position, event) in stream {
            execute(session, table.handle(position), event);
        }
    });
    stats
}
