//! Human-readable console reporting.

use std::io::{self, Write};

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing::warn;
use unicode_width::UnicodeWidthStr;

use crate::error::TestResult;
use crate::logger::{ErrorReport, Logger, OutputMode};

const MIN_WIDTH: usize = 60;
const MAX_WIDTH: usize = 120;
const DEFAULT_WIDTH: usize = 75;

/// Writes test progress as `name ....... RESULT` lines with a closing summary.
pub struct ConsoleLogger<W: WriteColor> {
    out: W,
    mode: OutputMode,
    width: usize,
}

impl ConsoleLogger<StandardStream> {
    pub fn stdout(mode: OutputMode, color: ColorChoice) -> Self {
        Self::new(StandardStream::stdout(color), mode).with_width(terminal_width())
    }
}

impl<W: WriteColor> ConsoleLogger<W> {
    pub fn new(out: W, mode: OutputMode) -> Self {
        Self {
            out,
            mode,
            width: DEFAULT_WIDTH,
        }
    }

    /// Line width, clamped to the supported range.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width.clamp(MIN_WIDTH, MAX_WIDTH);
        self
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_colored(&mut self, text: &str, color: Option<Color>) -> io::Result<()> {
        match color {
            Some(color) => {
                self.out.set_color(ColorSpec::new().set_fg(Some(color)))?;
                write!(self.out, "{}", text)?;
                self.out.reset()
            }
            None => write!(self.out, "{}", text),
        }
    }

    fn write_separator(&mut self, ch: char) -> io::Result<()> {
        writeln!(self.out, "{}", ch.to_string().repeat(self.width))
    }

    fn write_start(&mut self) -> io::Result<()> {
        self.write_separator('=')?;
        writeln!(self.out, "Started testing...")?;
        self.write_separator('=')
    }

    fn write_module(&mut self, module_path: &str) -> io::Result<()> {
        self.write_colored(&format!("\n{}\n", module_path), Some(Color::Cyan))
    }

    fn write_test(
        &mut self,
        name: &str,
        result: TestResult,
        error: Option<ErrorReport<'_>>,
    ) -> io::Result<()> {
        let label = result.as_str();
        let padding = self
            .width
            .saturating_sub(name.width() + label.len() + 2)
            .max(1);
        write!(self.out, "{} {} ", name, ".".repeat(padding))?;
        let color = match result {
            TestResult::Ok => Color::Green,
            TestResult::Failed | TestResult::Error => Color::Red,
        };
        self.write_colored(label, Some(color))?;
        writeln!(self.out)?;

        let Some(report) = error else {
            return Ok(());
        };
        match result {
            TestResult::Failed => {
                self.write_colored(report.message, Some(Color::Red))?;
                if self.mode == OutputMode::Verbose {
                    let traceback = report.error.render_traceback();
                    self.write_colored(&format!("{}\n", traceback), Some(Color::Red))?;
                }
                Ok(())
            }
            TestResult::Error => self.write_traceback(report.message),
            TestResult::Ok => Ok(()),
        }
    }

    fn write_traceback(&mut self, traceback: &str) -> io::Result<()> {
        writeln!(self.out)?;
        self.write_colored(traceback, Some(Color::Red))?;
        writeln!(self.out)
    }

    fn write_results(
        &mut self,
        tests: usize,
        failed: usize,
        errors: usize,
        elapsed_seconds: f64,
    ) -> io::Result<()> {
        writeln!(self.out)?;
        self.write_separator('-')?;
        writeln!(self.out, "Ran {} tests in {}s.\n", tests, elapsed_seconds)?;

        if failed == 0 && errors == 0 {
            self.write_colored("OK.\n\n", Some(Color::Green))?;
            return Ok(());
        }
        self.write_colored("ERRORS: ", Some(Color::Red))?;
        writeln!(self.out, "{}", errors)?;
        self.write_colored("FAILED: ", Some(Color::Red))?;
        writeln!(self.out, "{}\n", failed)
    }

    fn report(&self, result: io::Result<()>) {
        if let Err(err) = result {
            warn!(error = %err, "failed to write test output");
        }
    }
}

impl<W: WriteColor> Logger for ConsoleLogger<W> {
    fn log_start_info(&mut self) {
        if self.mode != OutputMode::Minimal {
            let result = self.write_start();
            self.report(result);
        }
    }

    fn log_module_info(&mut self, module_path: &str) {
        if self.mode != OutputMode::Minimal {
            let result = self.write_module(module_path);
            self.report(result);
        }
    }

    fn log_test_info(&mut self, name: &str, result: TestResult, error: Option<ErrorReport<'_>>) {
        if self.mode == OutputMode::Minimal && result == TestResult::Ok {
            return;
        }
        let result = self.write_test(name, result, error);
        self.report(result);
    }

    fn log_module_exec_error(&mut self, module_path: &str, error: ErrorReport<'_>) {
        let mut result = Ok(());
        if self.mode == OutputMode::Minimal {
            result = self.write_module(module_path);
        }
        let result = result.and_then(|_| self.write_traceback(error.message));
        self.report(result);
    }

    fn log_results(&mut self, tests: usize, failed: usize, errors: usize, elapsed_seconds: f64) {
        let result = self.write_results(tests, failed, errors, elapsed_seconds);
        self.report(result);
    }

    fn terminate(&mut self) {
        let result = self.out.flush();
        self.report(result);
    }
}

/// Width from `COLUMNS`, clamped; the default when unset or unparsable.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|cols| cols.trim().parse::<usize>().ok())
        .map(|cols| cols.clamp(MIN_WIDTH, MAX_WIDTH))
        .unwrap_or(DEFAULT_WIDTH)
}
