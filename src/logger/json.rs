//! Line-delimited JSON reporting.

use std::io::Write;

use serde::Serialize;
use tracing::warn;

use crate::error::TestResult;
use crate::logger::{ErrorReport, Logger};

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum Event<'a> {
    Start,
    Module {
        path: &'a str,
    },
    Test {
        name: &'a str,
        result: TestResult,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<&'a str>,
    },
    ModuleError {
        path: &'a str,
        kind: &'a str,
        message: &'a str,
    },
    Results {
        tests: usize,
        failed: usize,
        errors: usize,
        elapsed_seconds: f64,
    },
    Terminate,
}

/// Writes one JSON object per event.
pub struct JsonLogger<W: Write> {
    out: W,
}

impl<W: Write> JsonLogger<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, event: &Event<'_>) {
        let result = serde_json::to_writer(&mut self.out, event)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out));
        if let Err(err) = result {
            warn!(error = %err, "failed to write json event");
        }
    }
}

impl<W: Write> Logger for JsonLogger<W> {
    fn log_start_info(&mut self) {
        self.emit(&Event::Start);
    }

    fn log_module_info(&mut self, module_path: &str) {
        self.emit(&Event::Module { path: module_path });
    }

    fn log_test_info(&mut self, name: &str, result: TestResult, error: Option<ErrorReport<'_>>) {
        self.emit(&Event::Test {
            name,
            result,
            kind: error.map(|report| report.error.kind()),
            message: error.map(|report| report.message),
        });
    }

    fn log_module_exec_error(&mut self, module_path: &str, error: ErrorReport<'_>) {
        self.emit(&Event::ModuleError {
            path: module_path,
            kind: error.error.kind(),
            message: error.message,
        });
    }

    fn log_results(&mut self, tests: usize, failed: usize, errors: usize, elapsed_seconds: f64) {
        self.emit(&Event::Results {
            tests,
            failed,
            errors,
            elapsed_seconds,
        });
    }

    fn terminate(&mut self) {
        self.emit(&Event::Terminate);
        if let Err(err) = self.out.flush() {
            warn!(error = %err, "failed to flush json output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestError;
    use serde_json::Value;

    fn events(logger: JsonLogger<Vec<u8>>) -> Vec<Value> {
        String::from_utf8(logger.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_events_are_tagged_lines() {
        let error = TestError::raised("RuntimeError", "boom");
        let mut logger = JsonLogger::new(Vec::new());
        logger.log_start_info();
        logger.log_module_info("tests/test_a.rs");
        logger.log_test_info("test_a::ok", TestResult::Ok, None);
        logger.log_test_info(
            "test_a::bad",
            TestResult::Error,
            Some(ErrorReport {
                error: &error,
                message: "RuntimeError: boom\n",
            }),
        );
        logger.log_results(2, 0, 1, 0.25);
        logger.terminate();

        let events = events(logger);
        assert_eq!(events.len(), 6);
        assert_eq!(events[0]["event"], "start");
        assert_eq!(events[1]["path"], "tests/test_a.rs");
        assert_eq!(events[2]["result"], "OK");
        assert!(events[2].get("kind").is_none());
        assert_eq!(events[3]["kind"], "RuntimeError");
        assert_eq!(events[3]["result"], "ERROR");
        assert_eq!(events[4]["event"], "results");
        assert_eq!(events[4]["errors"], 1);
        assert_eq!(events[5]["event"], "terminate");
    }
}
