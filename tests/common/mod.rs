//! Shared helpers for microtest integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use microtest::{Callable, Engine, ErrorReport, Logger, TestError, TestResult};

/// One logger call, as seen by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Start,
    Module(String),
    Test {
        name: String,
        result: TestResult,
        message: Option<String>,
    },
    ModuleError {
        path: String,
        message: String,
    },
    Results {
        tests: usize,
        failed: usize,
        errors: usize,
    },
    Terminate,
    /// Pushed by test code itself, to interleave with logger calls.
    Note(String),
}

pub type Events = Rc<RefCell<Vec<Event>>>;

/// Logger that records every call into a shared event list.
pub struct RecordingLogger {
    events: Events,
}

impl Logger for RecordingLogger {
    fn log_start_info(&mut self) {
        self.events.borrow_mut().push(Event::Start);
    }

    fn log_module_info(&mut self, module_path: &str) {
        self.events
            .borrow_mut()
            .push(Event::Module(module_path.to_string()));
    }

    fn log_test_info(&mut self, name: &str, result: TestResult, error: Option<ErrorReport<'_>>) {
        self.events.borrow_mut().push(Event::Test {
            name: name.to_string(),
            result,
            message: error.map(|report| report.message.to_string()),
        });
    }

    fn log_module_exec_error(&mut self, module_path: &str, error: ErrorReport<'_>) {
        self.events.borrow_mut().push(Event::ModuleError {
            path: module_path.to_string(),
            message: error.message.to_string(),
        });
    }

    fn log_results(&mut self, tests: usize, failed: usize, errors: usize, _elapsed_seconds: f64) {
        self.events.borrow_mut().push(Event::Results {
            tests,
            failed,
            errors,
        });
    }

    fn terminate(&mut self) {
        self.events.borrow_mut().push(Event::Terminate);
    }
}

/// An engine reporting into a fresh event list.
pub fn recording_engine() -> (Engine, Events) {
    let events = Events::default();
    let logger = RecordingLogger {
        events: Rc::clone(&events),
    };
    (Engine::new(Box::new(logger)), events)
}

/// Shared call log for lifecycle and test bodies.
pub type Calls = Rc<RefCell<Vec<String>>>;

/// A callable that appends `label` to `calls` and then returns `outcome()`.
pub fn recorder<F>(calls: &Calls, label: &str, outcome: F) -> Callable
where
    F: Fn() -> Result<(), TestError> + 'static,
{
    let calls = Rc::clone(calls);
    let entry = label.to_string();
    Callable::new(label, move |_| {
        calls.borrow_mut().push(entry.clone());
        outcome()
    })
}

pub fn test_results(events: &Events) -> Vec<(String, TestResult)> {
    events
        .borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Test { name, result, .. } => Some((name.clone(), *result)),
            _ => None,
        })
        .collect()
}

pub fn final_results(events: &Events) -> Option<(usize, usize, usize)> {
    events.borrow().iter().find_map(|event| match event {
        Event::Results {
            tests,
            failed,
            errors,
        } => Some((*tests, *failed, *errors)),
        _ => None,
    })
}
