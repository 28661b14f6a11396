//! Ordered exit operations.
//!
//! Normal operations run last-registered-first. Operations marked final run after all of them, in
//! registration order. The results summary is registered as final so it always follows user
//! `on_exit` hooks.

use std::collections::VecDeque;
use std::fmt;

use crate::error::TestError;

/// A cleanup operation; receives the stop signal that ended the run, if any.
pub type ExitOperation<S> = Box<dyn FnOnce(&mut S, Option<&TestError>)>;

pub struct ExecutionContext<S> {
    operations: VecDeque<ExitOperation<S>>,
}

impl<S> Default for ExecutionContext<S> {
    fn default() -> Self {
        Self {
            operations: VecDeque::new(),
        }
    }
}

impl<S> ExecutionContext<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_cleanup_operation<F>(&mut self, operation: F, final_op: bool)
    where
        F: FnOnce(&mut S, Option<&TestError>) + 'static,
    {
        if final_op {
            self.operations.push_back(Box::new(operation));
        } else {
            self.operations.push_front(Box::new(operation));
        }
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Runs and drains every operation.
    pub fn exit(&mut self, state: &mut S, stop: Option<&TestError>) {
        while let Some(operation) = self.operations.pop_front() {
            operation(state, stop);
        }
    }
}

impl<S> fmt::Debug for ExecutionContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("operations", &self.operations.len())
            .finish()
    }
}
