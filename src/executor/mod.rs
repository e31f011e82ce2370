//! Command execution for validated shell commands
//!
//! - `runner` - runs a [`ValidatedCommand`](crate::security::ValidatedCommand)
//!   under `sh -c` with a timeout, output caps and cancellation
//! - `analyzer` - pulls build errors and test failures out of tool output

pub mod analyzer;
pub mod runner;

pub use analyzer::{analyze_output, AnalysisResult, BuildError, OutputKind, TestFailure};
pub use runner::{
    CommandResult, CommandRunner, RunnerError, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT,
};
