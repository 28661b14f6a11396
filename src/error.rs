//! Error types for microtest.
//!
//! [`TestError`] is everything that can cross a test, lifecycle or module-declaration boundary.
//! [`ConfigError`] covers configuration and command-line problems and is rendered with miette.

use std::any::type_name;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

use crate::assertion::{AssertionFailure, Frame, Traceback};

// ============================================================================
// RESULT TAXONOMY
// ============================================================================

/// Outcome of one test invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestResult {
    Ok,
    Failed,
    Error,
}

impl TestResult {
    /// Classifies the error a test returned, if any.
    pub fn classify(error: Option<&TestError>) -> Self {
        match error {
            None => TestResult::Ok,
            Some(TestError::Assertion(_)) => TestResult::Failed,
            Some(_) => TestResult::Error,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Ok => "OK",
            TestResult::Failed => "FAILED",
            TestResult::Error => "ERROR",
        }
    }
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three fixture lifecycle slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStage {
    Setup,
    Reset,
    Cleanup,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LifecycleStage::Setup => "Setup",
            LifecycleStage::Reset => "Reset",
            LifecycleStage::Cleanup => "Cleanup",
        })
    }
}

// ============================================================================
// TEST ERROR
// ============================================================================

/// An error raised by test, lifecycle or declaration code.
#[derive(Debug, Clone, Error)]
pub enum TestError {
    #[error("{0}")]
    Assertion(Box<AssertionFailure>),

    #[error("{kind}: {message}")]
    Raised {
        kind: String,
        message: String,
        traceback: Traceback,
    },

    #[error("Undefined resource \"{name}\"")]
    MissingResource { name: String },

    #[error("Resource \"{name}\" is not of type `{expected}`")]
    ResourceType { name: String, expected: &'static str },

    #[error("{stage} function is already set for this module")]
    DuplicateLifecycle { stage: LifecycleStage },

    #[error("Test \"{name}\" is already declared in this module")]
    DuplicateTest { name: String },

    #[error("No module registered for path \"{path}\"")]
    UnknownModule { path: String },

    #[error("Fixture {stage} failed: {source}")]
    Fixture {
        stage: LifecycleStage,
        #[source]
        source: Box<TestError>,
    },

    #[error("Interrupted")]
    Interrupted,

    #[error("Exit requested with status {code}")]
    Exit { code: i32 },
}

impl TestError {
    /// A generic error of the given kind, located at the caller.
    #[track_caller]
    pub fn raised(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::raised_at(kind, message, Location::caller())
    }

    pub fn raised_at(
        kind: impl Into<String>,
        message: impl Into<String>,
        location: &Location<'_>,
    ) -> Self {
        TestError::Raised {
            kind: kind.into(),
            message: message.into(),
            traceback: Traceback::from_frame(Frame::from_location(location)),
        }
    }

    /// Wraps any std error, keeping its `caused by` chain in the message.
    pub fn from_error<E: StdError>(err: &E, location: &Location<'_>) -> Self {
        let mut message = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            message.push_str(&format!("\n  caused by: {}", cause));
            source = cause.source();
        }
        Self::raised_at(short_type_name::<E>(), message, location)
    }

    /// Requests the whole run to stop with the given exit status.
    pub fn exit(code: i32) -> Self {
        TestError::Exit { code }
    }

    /// Interrupt and exit requests are never recovered.
    pub fn is_stop_signal(&self) -> bool {
        match self {
            TestError::Interrupted | TestError::Exit { .. } => true,
            TestError::Fixture { source, .. } => source.is_stop_signal(),
            _ => false,
        }
    }

    /// Exception-style kind name used in reports.
    pub fn kind(&self) -> &str {
        match self {
            TestError::Assertion(_) => AssertionFailure::KIND,
            TestError::Raised { kind, .. } => kind,
            TestError::MissingResource { .. } | TestError::ResourceType { .. } => "ResourceError",
            TestError::DuplicateLifecycle { .. } | TestError::Fixture { .. } => "FixtureError",
            TestError::DuplicateTest { .. } | TestError::UnknownModule { .. } => "ModuleError",
            TestError::Interrupted => "Interrupted",
            TestError::Exit { .. } => "Exit",
        }
    }

    pub fn traceback(&self) -> Option<&Traceback> {
        match self {
            TestError::Assertion(failure) => Some(failure.traceback()),
            TestError::Raised { traceback, .. } => Some(traceback),
            TestError::Fixture { source, .. } => source.traceback(),
            _ => None,
        }
    }

    /// The full traceback text shown for ERROR results and module-execution errors.
    pub fn render_traceback(&self) -> String {
        let message = match self {
            TestError::Raised { message, .. } => message.clone(),
            TestError::Assertion(failure) => failure.message().unwrap_or_default().to_string(),
            other => other.to_string(),
        };
        if let TestError::Fixture { source, .. } = self {
            return format!("{}{}: {}\n", source.render_traceback(), self.kind(), self);
        }
        let empty = Traceback::new();
        self.traceback().unwrap_or(&empty).render(self.kind(), &message)
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Converts fallible results inside test bodies into [`TestError`]s located at the call site.
///
/// ```rust
/// use microtest::{Raise, TestError};
///
/// fn body() -> Result<(), TestError> {
///     let n = "42".parse::<i32>().raised()?;
///     assert_eq!(n, 42);
///     Ok(())
/// }
/// assert!(body().is_ok());
/// ```
pub trait Raise<T> {
    fn raised(self) -> Result<T, TestError>;
}

impl<T, E: StdError> Raise<T> for Result<T, E> {
    #[track_caller]
    fn raised(self) -> Result<T, TestError> {
        let location = Location::caller();
        self.map_err(|err| TestError::from_error(&err, location))
    }
}

// ============================================================================
// CONFIG ERROR
// ============================================================================

/// Configuration and command-line errors.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    #[diagnostic(code(microtest::config::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file '{path}': {message}")]
    #[diagnostic(
        code(microtest::config::invalid),
        help("expected keys: include_modules, exclude_modules, include_groups, exclude_groups, output, entrypoint")
    )]
    Invalid { path: String, message: String },

    #[error("unknown entrypoint '{name}'")]
    #[diagnostic(code(microtest::config::unknown_entrypoint))]
    UnknownEntrypoint {
        name: String,
        #[help]
        available: String,
    },

    #[error("configuration entrypoint '{name}' failed")]
    #[diagnostic(code(microtest::config::entrypoint_failed))]
    Entrypoint {
        name: String,
        #[source]
        source: TestError,
    },

    #[error("failed to install the interrupt handler")]
    #[diagnostic(code(microtest::config::signal))]
    Signal {
        #[source]
        source: ctrlc::Error,
    },
}
