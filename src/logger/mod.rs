//! Reporting of run progress and results.
//!
//! The execution loop talks to exactly one [`Logger`]. Two implementations ship with the crate:
//! [`ConsoleLogger`] for humans and [`JsonLogger`] for machines.

use serde::{Deserialize, Serialize};

use crate::error::{TestError, TestResult};

pub mod console;
pub mod json;

pub use console::ConsoleLogger;
pub use json::JsonLogger;

/// What the loop hands the logger alongside a non-OK result.
///
/// For FAILED tests `message` is the rendered assertion diagnostic; for errors it is the full
/// traceback text.
#[derive(Debug, Clone, Copy)]
pub struct ErrorReport<'a> {
    pub error: &'a TestError,
    pub message: &'a str,
}

/// Receives run events, in order: start, then per module its info, test results or an execution
/// error, then the results, then terminate.
pub trait Logger {
    fn log_start_info(&mut self);

    fn log_module_info(&mut self, module_path: &str);

    fn log_test_info(&mut self, name: &str, result: TestResult, error: Option<ErrorReport<'_>>);

    fn log_module_exec_error(&mut self, module_path: &str, error: ErrorReport<'_>);

    fn log_results(&mut self, tests: usize, failed: usize, errors: usize, elapsed_seconds: f64);

    fn terminate(&mut self);
}

/// How much the console logger prints.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Only non-OK tests, errors and the summary.
    Minimal,
    #[default]
    Default,
    /// Also the traceback under failed assertions.
    Verbose,
}
