//! microtest: a minimalist test framework.
//!
//! Tests are [`Callable`]s declared per module through a [`Suite`]. The [`Engine`] runs them with
//! injected resources, wraps them in per-module setup/reset/cleanup fixtures, classifies every
//! outcome and reports to a pluggable [`Logger`]. Failed assertions are rendered with the values of
//! their operands:
//!
//! ```text
//! AssertionError on line 12:
//!
//! assert None is not None
//! ```

pub use crate::assertion::{raises, AssertionFailure, Frame, Traceback};
pub use crate::engine::{Counters, Engine, RunSummary};
pub use crate::error::{ConfigError, LifecycleStage, Raise, TestError, TestResult};
pub use crate::fixture::{Fixture, FixtureState};
pub use crate::logger::{ConsoleLogger, ErrorReport, JsonLogger, Logger, OutputMode};
pub use crate::registry::{Filters, Module, TestObject};
pub use crate::resources::{Args, Callable, ResourceGraph, Signature};
pub use crate::suite::{ModuleScope, ModuleSource, Suite};
pub use crate::value::{Bindings, IntoValue, Value};

pub mod assertion;
pub mod cli;
pub mod config;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod fixture;
pub mod logger;
pub mod registry;
pub mod resources;
pub mod suite;
pub mod value;

mod capture;
