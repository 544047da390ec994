//! Profiler options

use clap::Parser;
use std::fmt;
use tbprof_core::{
    DEFAULT_CONTEXTS, DEFAULT_CONTEXTS_STR, DEFAULT_REPORT_FILE, DEFAULT_TOP_N, DEFAULT_TOP_N_STR,
    MAX_CONTEXTS,
};

use crate::{ErrWrongArguments, ProfilerError, ReportFormat, ReportSink};

/// tbprof options structure
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct ProfilerOptions {
    /// Sets the event trace file path (JSON lines) to replay
    #[clap(short, long, value_name = "TRACE_FILE")]
    pub trace: Option<String>,
    /// Sets the report output file path; `-` writes the report to the console
    #[clap(short, long, value_name = "OUTPUT_FILE", default_value = DEFAULT_REPORT_FILE)]
    pub output: String,
    /// Sets the number of most executed code units listed in the report
    #[clap(short = 'T', long, value_name = "TOP", default_value = DEFAULT_TOP_N_STR)]
    pub top: usize,
    /// Sets the minimum number of concurrent execution contexts (virtual processors); grown to
    /// cover every context id found in the trace
    #[clap(short, long, value_name = "CONTEXTS", default_value = DEFAULT_CONTEXTS_STR)]
    pub contexts: usize,
    /// Sets the report format
    #[clap(short, long, value_enum, default_value_t = ReportFormat::Plain)]
    pub format: ReportFormat,
    /// Replays the events of every context in parallel.  Enabled with `-p`.
    #[clap(short, long, default_value = "false")]
    pub parallel: bool,
    /// Sets the verbose mode
    #[clap(short, long, default_value = "false")]
    pub verbose: bool,
}

impl Default for ProfilerOptions {
    fn default() -> Self {
        Self {
            trace: None,
            output: DEFAULT_REPORT_FILE.to_string(),
            top: DEFAULT_TOP_N,
            contexts: DEFAULT_CONTEXTS,
            format: ReportFormat::Plain,
            parallel: false,
            verbose: false,
        }
    }
}

impl fmt::Display for ProfilerOptions {
    /// Formats a string with the configuration information
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "TRACE: {:?}", self.trace)?;
        writeln!(f, "OUTPUT: {}", self.output)?;
        writeln!(f, "TOP: {}", self.top)?;
        writeln!(f, "CONTEXTS: {}", self.contexts)?;
        writeln!(f, "FORMAT: {}", self.format)?;
        writeln!(f, "PARALLEL: {}", self.parallel)?;
        writeln!(f, "VERBOSE: {}", self.verbose)?;
        Ok(())
    }
}

impl ProfilerOptions {
    pub fn validate(&self) -> Result<(), ProfilerError> {
        if self.contexts == 0 || self.contexts > MAX_CONTEXTS {
            return Err(ErrWrongArguments::new(format!(
                "contexts must be in the range 1..={MAX_CONTEXTS}, got {}",
                self.contexts
            ))
            .into());
        }
        Ok(())
    }

    /// Number of contexts of a session that replays a trace using `trace_contexts` contexts
    pub fn session_contexts(&self, trace_contexts: usize) -> Result<usize, ProfilerError> {
        let contexts = self.contexts.max(trace_contexts);
        if contexts > MAX_CONTEXTS {
            return Err(ErrWrongArguments::new(format!(
                "the trace uses {trace_contexts} contexts, the maximum is {MAX_CONTEXTS}"
            ))
            .into());
        }
        Ok(contexts)
    }

    pub fn sink(&self) -> ReportSink {
        ReportSink::from_arg(&self.output)
    }
}
