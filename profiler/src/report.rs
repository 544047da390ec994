//! End of session report
//!
//! The report is built once, after every execution context has stopped. It contains the global
//! totals (total instructions, one count per bucket and each bucket share of the total) followed
//! by the most executed code units, ranked by execution count and listed with their static
//! instructions in original order.
//!
//! Two renderings are available: `plain`, the fixed line format consumed by scripts, and `table`,
//! aligned columns with thousands separators.

use std::{
    fmt,
    fs::File,
    io::{self, BufWriter, Write},
    path::PathBuf,
};

use clap::ValueEnum;
use tbprof_core::{InsnBucket, StaticInsn};

use crate::{GlobalTotals, ProfilerError, Registry, ReportWriter};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Plain,
    Table,
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportFormat::Plain => write!(f, "plain"),
            ReportFormat::Table => write!(f, "table"),
        }
    }
}

/// Destination of the report
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportSink {
    Stdout,
    File(PathBuf),
}

impl ReportSink {
    /// `-` selects the standard output, anything else is a file path
    pub fn from_arg(arg: &str) -> Self {
        match arg {
            "-" => ReportSink::Stdout,
            path => ReportSink::File(PathBuf::from(path)),
        }
    }

    pub fn open(&self) -> Result<Box<dyn Write>, ProfilerError> {
        match self {
            ReportSink::Stdout => Ok(Box::new(io::stdout().lock())),
            ReportSink::File(path) => match File::create(path) {
                Ok(file) => Ok(Box::new(BufWriter::new(file))),
                Err(source) => Err(ProfilerError::SinkUnavailable {
                    path: path.display().to_string(),
                    source,
                }),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitSummary {
    pub entry_address: u64,
    pub execution_count: u64,
    pub instructions: Vec<StaticInsn>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub totals: GlobalTotals,
    pub total_per_context: Vec<u64>,
    pub registered_units: usize,
    pub top_n: usize,
    pub top_units: Vec<UnitSummary>,
}

impl Report {
    /// Ranks the registered units and keeps the `top_n` most executed ones
    pub fn build(
        totals: GlobalTotals,
        total_per_context: Vec<u64>,
        registry: &Registry,
        top_n: usize,
    ) -> Self {
        let ranked = registry.ranked();
        let registered_units = ranked.len();
        let top_units = ranked
            .into_iter()
            .take(top_n)
            .map(|(execution_count, unit)| UnitSummary {
                entry_address: unit.entry_address(),
                execution_count,
                instructions: unit.instructions().to_vec(),
            })
            .collect();
        Self { totals, total_per_context, registered_units, top_n, top_units }
    }

    pub fn render(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Plain => self.render_plain(),
            ReportFormat::Table => self.render_table(),
        }
    }

    pub fn write_to<W: Write + ?Sized>(
        &self,
        writer: &mut W,
        format: ReportFormat,
    ) -> Result<(), ProfilerError> {
        writer.write_all(self.render(format).as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    fn render_plain(&self) -> String {
        let totals = &self.totals;
        let mut output = format!("Total instructions: {}\n", totals.total_instructions);
        for bucket in InsnBucket::ALL {
            output += &format!("{} instructions: {}\n", bucket, totals.bucket(bucket));
        }
        for bucket in InsnBucket::ALL {
            output += &format!(
                "{} / total instructions: {:.2}%\n",
                bucket,
                totals.bucket_percentage(bucket)
            );
        }

        output += &format!(
            "\nTop {} Most Executed Basic Blocks with Instructions:\n\n",
            self.top_n
        );
        for unit in &self.top_units {
            output += &format!(
                "Basic Block at {:#x} executed {} times\n",
                unit.entry_address, unit.execution_count
            );
            output += "Instructions:\n";
            for insn in &unit.instructions {
                output += &format!("  {insn}\n");
            }
            output += "\n";
        }
        output
    }

    fn render_table(&self) -> String {
        let totals = &self.totals;
        let mut writer = ReportWriter::new();

        writer.title_count_perc("Instructions", "COUNT");
        writer.add_count("Total instructions", totals.total_instructions);
        for bucket in InsnBucket::ALL {
            writer.add_perc(bucket.name(), totals.bucket(bucket), totals.total_instructions);
        }

        if self.total_per_context.len() > 1 {
            writer.title_count_perc("Instructions per context", "COUNT");
            for (context_id, count) in self.total_per_context.iter().enumerate() {
                writer.add_perc(
                    &format!("context {context_id}"),
                    *count,
                    totals.total_instructions,
                );
            }
        }

        let executions: u64 =
            self.top_units.iter().fold(0u64, |acc, unit| acc.saturating_add(unit.execution_count));
        writer.set_and_push_label_width(32);
        writer.title_count_perc(
            &format!("Top {} of {} code units", self.top_n, self.registered_units),
            "EXECUTIONS",
        );
        for unit in &self.top_units {
            writer.add_perc(
                &format!("{:#x}", unit.entry_address),
                unit.execution_count,
                executions,
            );
            writer.set_identation(1);
            for insn in &unit.instructions {
                let line = format!("{}{insn}\n", writer.identation);
                writer.add(&line);
            }
            writer.set_identation(0);
        }
        writer.add_separator();
        writer.pop_label_width();
        writer.output
    }
}
