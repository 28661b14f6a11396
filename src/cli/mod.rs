//! Entry point for microtest harness binaries.
//!
//! A harness binary builds its [`Suite`] and hands it to [`main`]:
//!
//! ```rust,no_run
//! use microtest::Suite;
//!
//! fn main() -> std::process::ExitCode {
//!     microtest::cli::main(Suite::new("my-suite"))
//! }
//! ```

use std::process::ExitCode;

use clap::Parser;
use miette::Report;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::MicrotestArgs;
use crate::config::RunConfig;
use crate::discovery::{discover_test_files, order_by_discovery};
use crate::engine::{Engine, RunSummary};
use crate::error::ConfigError;
use crate::logger::{ConsoleLogger, JsonLogger, Logger};
use crate::suite::{ModuleSource, Suite};

pub mod args;

/// Environment variable holding the internal log filter.
pub const LOG_ENV: &str = "MICROTEST_LOG";

const DEFAULT_ENTRYPOINT: &str = "main";

/// Parses the process arguments and runs `suite`.
pub fn main(suite: Suite) -> ExitCode {
    init_tracing();
    let args = MicrotestArgs::parse();
    match run(&suite, &args) {
        Ok(summary) => exit_code(summary.exit_code()),
        Err(err) => {
            eprintln!("{:?}", Report::new(err));
            ExitCode::from(2)
        }
    }
}

/// Runs `suite` as configured by `args`.
pub fn run(suite: &Suite, args: &MicrotestArgs) -> Result<RunSummary, ConfigError> {
    let mut config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    };
    config.merge(args.as_config());

    let mut engine = Engine::new(logger(args, &config));
    config.apply(&mut engine);
    run_entrypoint(suite, &mut engine, config.entrypoint.as_deref())?;

    let flag = engine.interrupt_flag();
    if let Err(source) = ctrlc::set_handler(move || {
        flag.store(true, std::sync::atomic::Ordering::SeqCst);
    }) {
        // Only one handler per process; embedding callers may already have one.
        if matches!(source, ctrlc::Error::MultipleHandlers) {
            warn!("interrupt handler already installed");
        } else {
            return Err(ConfigError::Signal { source });
        }
    }

    let registered = suite.module_paths();
    let paths = match &args.root {
        Some(root) => {
            let discovered = discover_test_files(root);
            debug!(root = %root.display(), files = discovered.len(), "discovered test files");
            order_by_discovery(&registered, &discovered)
        }
        None => registered,
    };
    Ok(engine.exec_modules(suite, &paths))
}

fn logger(args: &MicrotestArgs, config: &RunConfig) -> Box<dyn Logger> {
    if args.json {
        return Box::new(JsonLogger::new(std::io::stdout()));
    }
    let mode = config.output.unwrap_or_default();
    Box::new(ConsoleLogger::stdout(mode, args.color.choice()))
}

/// Runs the named entrypoint. The default name may be missing; an explicitly chosen one may not.
fn run_entrypoint(
    suite: &Suite,
    engine: &mut Engine,
    requested: Option<&str>,
) -> Result<(), ConfigError> {
    let name = requested.unwrap_or(DEFAULT_ENTRYPOINT);
    let Some(entrypoint) = suite.get_entrypoint(name) else {
        if requested.is_none() {
            return Ok(());
        }
        return Err(ConfigError::UnknownEntrypoint {
            name: name.to_string(),
            available: format!("available entrypoints: {}", suite.entrypoint_names().join(", ")),
        });
    };
    debug!(entrypoint = name, "running configuration entrypoint");
    engine
        .run_config(entrypoint)
        .map_err(|source| ConfigError::Entrypoint {
            name: name.to_string(),
            source,
        })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed by an embedding binary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
