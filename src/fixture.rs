//! Per-module setup/reset/cleanup lifecycle.
//!
//! A [`Fixture`] wraps the queue of a module's selected tests. Asking it for the next runnable test
//! drives its state machine:
//!
//! ```text
//! NotSetup --first request--> Running --queue empty--> Done
//!     |                          |
//!     +--setup fails--> Aborted <+--reset fails
//! ```
//!
//! Setup runs at most once, reset immediately before every test, and cleanup exactly once: either
//! after the last test or right after a lifecycle failure, never both. `Aborted` and `Done` are
//! terminal.

use std::collections::VecDeque;

use tracing::{trace, warn};

use crate::error::{LifecycleStage, TestError};
use crate::resources::{call_with_resources, Callable, ResourceGraph};

/// Lifecycle state of a fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    NotSetup,
    Running,
    Aborted,
    Done,
}

/// Setup/reset/cleanup controller for one module.
#[derive(Debug)]
pub struct Fixture {
    setup: Option<Callable>,
    reset: Option<Callable>,
    cleanup: Option<Callable>,
    pending: VecDeque<usize>,
    state: FixtureState,
    error: Option<TestError>,
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            setup: None,
            reset: None,
            cleanup: None,
            pending: VecDeque::new(),
            state: FixtureState::NotSetup,
            error: None,
        }
    }

    pub fn set_setup(&mut self, callable: Callable) -> Result<&mut Self, TestError> {
        Self::fill(&mut self.setup, LifecycleStage::Setup, callable)?;
        Ok(self)
    }

    pub fn set_reset(&mut self, callable: Callable) -> Result<&mut Self, TestError> {
        Self::fill(&mut self.reset, LifecycleStage::Reset, callable)?;
        Ok(self)
    }

    pub fn set_cleanup(&mut self, callable: Callable) -> Result<&mut Self, TestError> {
        Self::fill(&mut self.cleanup, LifecycleStage::Cleanup, callable)?;
        Ok(self)
    }

    fn fill(
        slot: &mut Option<Callable>,
        stage: LifecycleStage,
        callable: Callable,
    ) -> Result<(), TestError> {
        if slot.is_some() {
            return Err(TestError::DuplicateLifecycle { stage });
        }
        *slot = Some(callable);
        Ok(())
    }

    /// Queues the tests (indices into the module's test list) this fixture guards.
    pub fn load(&mut self, tests: impl IntoIterator<Item = usize>) {
        self.pending = tests.into_iter().collect();
    }

    pub fn state(&self) -> FixtureState {
        self.state
    }

    pub fn setup_done(&self) -> bool {
        self.state != FixtureState::NotSetup
    }

    /// The lifecycle failure that ended this fixture, if any.
    pub fn error(&self) -> Option<&TestError> {
        self.error.as_ref()
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Advances the lifecycle and returns the next test to run.
    ///
    /// `Ok(None)` means no further tests will be yielded. A lifecycle failure is returned once,
    /// wrapped in [`TestError::Fixture`], after cleanup has run.
    pub fn next_test(&mut self, resources: &ResourceGraph) -> Result<Option<usize>, TestError> {
        match self.state {
            FixtureState::Aborted | FixtureState::Done => return Ok(None),
            FixtureState::NotSetup => {
                self.transition(FixtureState::Running);
                if let Some(setup) = &self.setup {
                    if let Err(err) = call_with_resources(setup, resources) {
                        return Err(self.abort(LifecycleStage::Setup, err, resources));
                    }
                }
            }
            FixtureState::Running => {}
        }

        let Some(index) = self.pending.pop_front() else {
            self.transition(FixtureState::Done);
            if let Some(cleanup) = &self.cleanup {
                if let Err(err) = call_with_resources(cleanup, resources) {
                    let err = TestError::Fixture {
                        stage: LifecycleStage::Cleanup,
                        source: Box::new(err),
                    };
                    self.error = Some(err.clone());
                    return Err(err);
                }
            }
            return Ok(None);
        };

        if let Some(reset) = &self.reset {
            if let Err(err) = call_with_resources(reset, resources) {
                return Err(self.abort(LifecycleStage::Reset, err, resources));
            }
        }
        Ok(Some(index))
    }

    fn abort(&mut self, stage: LifecycleStage, err: TestError, resources: &ResourceGraph) -> TestError {
        self.transition(FixtureState::Aborted);
        self.pending.clear();
        if let Some(cleanup) = &self.cleanup {
            if let Err(cleanup_err) = call_with_resources(cleanup, resources) {
                warn!(error = %cleanup_err, %stage, "fixture cleanup failed while aborting");
            }
        }
        let err = TestError::Fixture {
            stage,
            source: Box::new(err),
        };
        self.error = Some(err.clone());
        err
    }

    fn transition(&mut self, next: FixtureState) {
        trace!(from = ?self.state, to = ?next, "fixture transition");
        self.state = next;
    }
}

// ============================================================================
// SCHEDULE
// ============================================================================

/// The runnable sequence of one module: its selected tests, fixture-guarded or not.
#[derive(Debug)]
pub enum Schedule {
    Plain(VecDeque<usize>),
    Guarded(Box<Fixture>),
}

impl Schedule {
    pub fn new(fixture: Option<Fixture>, tests: Vec<usize>) -> Self {
        match fixture {
            Some(mut fixture) => {
                fixture.load(tests);
                Schedule::Guarded(Box::new(fixture))
            }
            None => Schedule::Plain(tests.into()),
        }
    }

    /// Index of the next test to invoke.
    pub fn next_test(&mut self, resources: &ResourceGraph) -> Result<Option<usize>, TestError> {
        match self {
            Schedule::Plain(queue) => Ok(queue.pop_front()),
            Schedule::Guarded(fixture) => fixture.next_test(resources),
        }
    }

    pub fn into_fixture(self) -> Option<Fixture> {
        match self {
            Schedule::Plain(_) => None,
            Schedule::Guarded(fixture) => Some(*fixture),
        }
    }
}
