//! Recorded execution-engine events
//!
//! A trace is a JSON-lines file, one event per line, as an instrumented engine would emit them:
//!
//! ```text
//! {"event":"translate","pc":4096,"insns":[[4096,"czero.eqz a0,a1"],[4100,"add a0,a0,a1"]]}
//! {"event":"enter","pc":4096,"ctx":0}
//! {"event":"retire","pc":4096,"index":0,"ctx":0}
//! {"event":"exec","pc":4096,"ctx":1}
//! {"event":"end"}
//! ```
//!
//! `ctx` defaults to context 0. Blank lines and lines starting with `#` are skipped.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tbprof_core::StaticInsn;

use crate::ProfilerError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A code unit was translated
    Translate { pc: u64, insns: Vec<(u64, String)> },
    /// A code unit was entered
    Enter {
        pc: u64,
        #[serde(default)]
        ctx: usize,
    },
    /// The instruction at position `index` of a code unit retired
    Retire {
        pc: u64,
        index: usize,
        #[serde(default)]
        ctx: usize,
    },
    /// A code unit was entered and ran to its end
    Exec {
        pc: u64,
        #[serde(default)]
        ctx: usize,
    },
    /// The emulation finished
    End,
}

impl TraceEvent {
    /// Context of an execution event; translations and the end event have none
    pub fn context(&self) -> Option<usize> {
        match self {
            TraceEvent::Enter { ctx, .. }
            | TraceEvent::Retire { ctx, .. }
            | TraceEvent::Exec { ctx, .. } => Some(*ctx),
            TraceEvent::Translate { .. } | TraceEvent::End => None,
        }
    }

    /// Entry address of the code unit the event refers to; the end event has none
    pub fn unit_address(&self) -> Option<u64> {
        match self {
            TraceEvent::Translate { pc, .. }
            | TraceEvent::Enter { pc, .. }
            | TraceEvent::Retire { pc, .. }
            | TraceEvent::Exec { pc, .. } => Some(*pc),
            TraceEvent::End => None,
        }
    }

    pub fn static_insns(insns: &[(u64, String)]) -> impl Iterator<Item = StaticInsn> + '_ {
        insns.iter().map(|(address, mnemonic)| StaticInsn::new(*address, mnemonic.as_str()))
    }
}

/// Reads every event of a JSON-lines trace
pub fn read_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEvent>, ProfilerError> {
    let mut events = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let event = serde_json::from_str(line)
            .map_err(|e| ProfilerError::TraceFormat { line: i + 1, description: e.to_string() })?;
        events.push(event);
    }
    Ok(events)
}
