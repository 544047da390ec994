//! tbprof counts how often every translated code unit runs and how many instructions, and of
//! which kind, an emulated program executes, with per-context counters cheap enough to run on
//! every executed unit.
//!
//! ```text
//! engine translation --> Session::on_unit_translated --> Registry    (CodeUnit, RetireBinding)
//!                                                           |
//! engine execution ----> UnitHandle / Session::on_* ---> Scoreboard  (per-context shards)
//!                                                           |
//! engine exit ---------> Session::on_session_end ------> Report      (totals, top-N units)
//! ```

mod code_unit;
mod global_counters;
pub mod logger;
pub mod profiler_errors;
pub mod profiler_options;
mod registry;
pub mod replay;
mod report;
mod report_writer;
mod scoreboard;
mod session;
mod trace_event;

pub use code_unit::*;
pub use global_counters::*;
pub use profiler_errors::*;
pub use profiler_options::*;
pub use registry::*;
pub use replay::*;
pub use report::*;
pub use report_writer::*;
pub use scoreboard::*;
pub use session::*;
pub use trace_event::*;
