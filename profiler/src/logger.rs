use std::env;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

pub const LOGGING_LEVEL_ENV: &str = "TBPROF_LOGGING_LEVEL";
pub const LOGGING_FORMAT_ENV: &str = "TBPROF_LOGGING_FORMAT";

/// Log level and format read through `var`, with the defaults of a `verbose` run
fn level_and_format(verbose: bool, var: impl Fn(&str) -> Option<String>) -> (String, String) {
    let default_level = if verbose { "debug" } else { "info" };
    let log_level = var(LOGGING_LEVEL_ENV).unwrap_or_else(|| default_level.to_string());
    let log_format = var(LOGGING_FORMAT_ENV).unwrap_or_else(|| "pretty".to_string());
    (log_level, log_format)
}

/// Initializes the global tracing subscriber
///
/// The level comes from `RUST_LOG`, then `TBPROF_LOGGING_LEVEL`, then `debug` when verbose or
/// `info` otherwise. `TBPROF_LOGGING_FORMAT` selects `json`, `compact` or the default format.
/// Logs go to stderr so that a report written to stdout stays clean.
pub fn init(verbose: bool) -> Result<()> {
    let (log_level, log_format) = level_and_format(verbose, |name| env::var(name).ok());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .try_init()
        }
        "compact" => {
            tracing_subscriber::fmt()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .try_init()
        }
        _ => {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_env_filter(env_filter)
                .try_init()
        }
    };
    result.map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_tbprof_logging_variables() {
        let var = |name: &str| match name {
            "TBPROF_LOGGING_LEVEL" => Some("trace".to_string()),
            "TBPROF_LOGGING_FORMAT" => Some("json".to_string()),
            _ => None,
        };
        assert_eq!(level_and_format(false, var), ("trace".to_string(), "json".to_string()));
    }

    #[test]
    fn defaults_depend_on_verbose() {
        assert_eq!(level_and_format(false, |_| None), ("info".to_string(), "pretty".to_string()));
        assert_eq!(level_and_format(true, |_| None), ("debug".to_string(), "pretty".to_string()));
    }
}
