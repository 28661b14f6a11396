//! The execution loop.
//!
//! [`Engine`] is the single owned context of a test run: logger, resources, utilities, filters, the
//! module record, counters and exit operations. A run loads each selected module, drives its
//! (possibly fixture-guarded) schedule, classifies every outcome and reports it to the logger. Errors
//! escaping a module are reported against the module and the run continues; interrupt and exit
//! requests end the run, after which the exit operations (results summary last) still run.

use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::assertion::resolve_assertion_error;
use crate::capture::capture;
use crate::context::ExecutionContext;
use crate::error::{TestError, TestResult};
use crate::fixture::Schedule;
use crate::logger::{ErrorReport, Logger};
use crate::registry::{Filters, Module, Registry, TestObject};
use crate::resources::{call_with_resources, produce, Args, ResourceGraph};
use crate::suite::{Entrypoint, ModuleScope, ModuleSource};

/// Exit status of an interrupted run.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

// ============================================================================
// COUNTERS & SUMMARY
// ============================================================================

/// Running totals of the current process.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub tests: usize,
    pub failed: usize,
    pub errors: usize,
    pub started: Option<Instant>,
    pub stopped: Option<Instant>,
}

impl Counters {
    /// Seconds between start and stop (or now), rounded to milliseconds.
    pub fn elapsed_seconds(&self) -> f64 {
        let Some(started) = self.started else {
            return 0.0;
        };
        let stopped = self.stopped.unwrap_or_else(Instant::now);
        let secs = stopped.saturating_duration_since(started).as_secs_f64();
        (secs * 1000.0).round() / 1000.0
    }
}

/// Outcome of one run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub tests: usize,
    pub failed: usize,
    pub errors: usize,
    pub elapsed_seconds: f64,
    /// The interrupt or exit request that ended the run early.
    pub stop: Option<TestError>,
}

impl RunSummary {
    pub fn success(&self) -> bool {
        self.failed == 0 && self.errors == 0 && self.stop.is_none()
    }

    pub fn exit_code(&self) -> i32 {
        if let Some(code) = self.stop.as_ref().and_then(stop_code) {
            return code;
        }
        if self.failed == 0 && self.errors == 0 {
            0
        } else {
            1
        }
    }
}

fn stop_code(error: &TestError) -> Option<i32> {
    match error {
        TestError::Exit { code } => Some(*code),
        TestError::Interrupted => Some(INTERRUPTED_EXIT_CODE),
        TestError::Fixture { source, .. } => stop_code(source),
        _ => None,
    }
}

// ============================================================================
// ENGINE
// ============================================================================

/// Owned context of a test run.
pub struct Engine {
    logger: Box<dyn Logger>,
    resources: ResourceGraph,
    utilities: ResourceGraph,
    registry: Registry,
    counters: Counters,
    exec_context: ExecutionContext<Engine>,
    interrupt: Arc<AtomicBool>,
    running: bool,
}

impl Engine {
    pub fn new(logger: Box<dyn Logger>) -> Self {
        Self {
            logger,
            resources: ResourceGraph::new(),
            utilities: ResourceGraph::new(),
            registry: Registry::new(),
            counters: Counters::default(),
            exec_context: ExecutionContext::new(),
            interrupt: Arc::new(AtomicBool::new(false)),
            running: false,
        }
    }

    pub fn set_logger(&mut self, logger: Box<dyn Logger>) {
        self.logger = logger;
    }

    // ------------------------------------------------------------------------
    // Registration surface
    // ------------------------------------------------------------------------

    pub fn add_resource<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.resources.add(name, value);
    }

    /// Registers the value built by `factory`; the factory's parameters are resolved as resources.
    pub fn add_resource_with<T, F>(
        &mut self,
        name: impl Into<String>,
        params: &[&str],
        factory: F,
    ) -> Result<(), TestError>
    where
        T: Any,
        F: FnOnce(&Args) -> Result<T, TestError>,
    {
        let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
        let value = produce(&params, &self.resources, factory)?;
        self.resources.add(name, value);
        Ok(())
    }

    /// Makes `value` visible to module declarations.
    pub fn add_utility<T: Any>(&mut self, name: impl Into<String>, value: T) {
        self.utilities.add(name, value);
    }

    pub fn resources(&self) -> &ResourceGraph {
        &self.resources
    }

    pub fn utilities(&self) -> &ResourceGraph {
        &self.utilities
    }

    pub fn include_modules<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, paths: I) {
        self.registry.filters_mut().include_modules(paths);
    }

    pub fn exclude_modules<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, paths: I) {
        self.registry.filters_mut().exclude_modules(paths);
    }

    pub fn include_groups<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, groups: I) {
        self.registry.filters_mut().include_groups(groups);
    }

    pub fn exclude_groups<I: IntoIterator<Item = S>, S: Into<String>>(&mut self, groups: I) {
        self.registry.filters_mut().exclude_groups(groups);
    }

    pub fn filters(&self) -> &Filters {
        self.registry.filters()
    }

    /// Registers a hook run when the run ends, before the results summary. Hooks run in reverse
    /// registration order.
    pub fn on_exit<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut Engine, Option<&TestError>) + 'static,
    {
        self.exec_context.add_cleanup_operation(hook, false);
    }

    /// Setting this flag stops the run before the next module or test.
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Runs a configuration entrypoint against this engine.
    pub fn run_config(&mut self, configure: &Entrypoint) -> Result<(), TestError> {
        capture(|| configure(self))
    }

    // ------------------------------------------------------------------------
    // Execution loop
    // ------------------------------------------------------------------------

    /// Runs every module of `source`, in its declaration order.
    pub fn run(&mut self, source: &dyn ModuleSource) -> RunSummary {
        let paths = source.module_paths();
        self.exec_modules(source, &paths)
    }

    /// Runs the modules at `paths`, in order, skipping those the filters reject.
    pub fn exec_modules(&mut self, source: &dyn ModuleSource, paths: &[String]) -> RunSummary {
        self.initialize();
        let selected = self.registry.filters().filter_modules(paths);
        debug!(total = paths.len(), selected = selected.len(), "selected modules");

        let mut stop = None;
        for path in selected {
            if let Err(err) = self.check_interrupt() {
                stop = Some(err);
                break;
            }
            self.logger.log_module_info(path);
            match self.exec_module(source, path) {
                Ok(()) => {}
                Err(err) if err.is_stop_signal() => {
                    stop = Some(err);
                    break;
                }
                Err(err) => self.register_module_exec_error(path, &err),
            }
        }
        self.finish(stop)
    }

    fn initialize(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.logger.log_start_info();
        self.counters.started = Some(Instant::now());
        self.counters.stopped = None;
        self.exec_context.add_cleanup_operation(stop_testing, true);
    }

    fn finish(&mut self, stop: Option<TestError>) -> RunSummary {
        let mut context = std::mem::take(&mut self.exec_context);
        context.exit(self, stop.as_ref());
        self.running = false;
        RunSummary {
            tests: self.counters.tests,
            failed: self.counters.failed,
            errors: self.counters.errors,
            elapsed_seconds: self.counters.elapsed_seconds(),
            stop,
        }
    }

    fn check_interrupt(&self) -> Result<(), TestError> {
        if self.interrupt.load(Ordering::SeqCst) {
            info!("interrupt received, stopping run");
            return Err(TestError::Interrupted);
        }
        Ok(())
    }

    fn exec_module(&mut self, source: &dyn ModuleSource, path: &str) -> Result<(), TestError> {
        debug!(module = path, "loading module");
        let mut module = Module::new(path);
        let loaded = {
            let mut scope = ModuleScope::new(&mut module, &mut self.resources, &self.utilities);
            capture(|| source.load(path, &mut scope))
        };
        let result = loaded.and_then(|()| self.drive_module(&mut module));
        self.registry.record(module);
        result
    }

    fn drive_module(&mut self, module: &mut Module) -> Result<(), TestError> {
        let selected = module.select(self.registry.filters());
        debug!(module = module.path(), tests = selected.len(), "running module");
        let mut schedule = Schedule::new(module.take_fixture(), selected);
        let result = self.drive(module, &mut schedule);
        module.restore_fixture(schedule.into_fixture());
        result
    }

    fn drive(&mut self, module: &mut Module, schedule: &mut Schedule) -> Result<(), TestError> {
        while let Some(index) = schedule.next_test(&self.resources)? {
            self.check_interrupt()?;
            let test = &mut module.tests_mut()[index];
            match call_with_resources(test.callable(), &self.resources) {
                Err(err) if err.is_stop_signal() => return Err(err),
                outcome => self.register_test_results(test, outcome.err()),
            }
        }
        Ok(())
    }

    fn register_test_results(&mut self, test: &mut TestObject, error: Option<TestError>) {
        let result = TestResult::classify(error.as_ref());
        self.counters.tests += 1;
        match result {
            TestResult::Ok => {}
            TestResult::Failed => self.counters.failed += 1,
            TestResult::Error => self.counters.errors += 1,
        }

        let message = error.as_ref().map(report_message);
        let report = error
            .as_ref()
            .zip(message.as_deref())
            .map(|(error, message)| ErrorReport { error, message });
        self.logger.log_test_info(test.name(), result, report);
        test.record(result, error);
    }

    fn register_module_exec_error(&mut self, path: &str, error: &TestError) {
        debug!(module = path, error = %error, "module execution error");
        self.counters.errors += 1;
        let message = error.render_traceback();
        self.logger.log_module_exec_error(
            path,
            ErrorReport {
                error,
                message: &message,
            },
        );
    }
}

/// Final exit operation: stamps the stop time and reports the results.
fn stop_testing(engine: &mut Engine, stop: Option<&TestError>) {
    engine.counters.stopped = Some(Instant::now());
    if let Some(stop) = stop {
        info!(reason = %stop, "run stopped early");
    }
    let counters = engine.counters;
    engine.logger.log_results(
        counters.tests,
        counters.failed,
        counters.errors,
        counters.elapsed_seconds(),
    );
    engine.logger.terminate();
}

fn report_message(error: &TestError) -> String {
    match error {
        TestError::Assertion(failure) => resolve_assertion_error(failure),
        other => other.render_traceback(),
    }
}
