//! This module contains constant definitions used by other modules and crates.

/// Number of most executed code units listed in the report when not configured
pub const DEFAULT_TOP_N: usize = 10;
pub const DEFAULT_TOP_N_STR: &str = "10";

/// Number of concurrent execution contexts (virtual processors) when not configured
pub const DEFAULT_CONTEXTS: usize = 1;
pub const DEFAULT_CONTEXTS_STR: &str = "1";

/// Upper bound of execution contexts accepted by a profiling session
pub const MAX_CONTEXTS: usize = 4096;

/// Report file written at session end when no other output is requested
pub const DEFAULT_REPORT_FILE: &str = "top_blocks_with_instructions.txt";
