use std::{fs::File, io::BufReader};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tbprof::{
    logger, read_trace, replay, replay_parallel, trace_contexts, ProfilerOptions, ReportSink,
    Session,
};
use tracing::info;

fn main() -> Result<()> {
    // Create a profiler options instance based on arguments or default values
    let options = ProfilerOptions::parse();
    logger::init(options.verbose)?;
    options.validate()?;

    if options.verbose {
        info!("tbprof replays a recorded translation/execution event trace and reports the most executed code units and instruction counts");
        info!("\n{}", options);
    }

    let trace_path =
        options.trace.as_ref().ok_or_else(|| anyhow!("an event trace file must be provided"))?;
    let file =
        File::open(trace_path).with_context(|| format!("Could not read trace file {trace_path}"))?;
    let events = read_trace(BufReader::new(file))?;

    let contexts = options.session_contexts(trace_contexts(&events))?;
    if contexts > options.contexts {
        info!("The trace uses {} contexts, more than the {} requested", contexts, options.contexts);
    }
    let session = Session::new(contexts);
    let stats = if options.parallel {
        replay_parallel(&session, &events)
    } else {
        replay(&session, &events)
    };
    info!(
        "Replayed {} events ({} translations, {} contexts){}",
        stats.events,
        stats.translations,
        stats.contexts,
        if stats.ended { "" } else { ", trace has no end event" }
    );

    let sink = options.sink();
    session.on_session_end(options.top, options.format, &sink)?;
    if let ReportSink::File(path) = &sink {
        println!("Results have been written to {}", path.display());
    }

    Ok(())
}
