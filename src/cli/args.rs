//! Command-line arguments of microtest harness binaries.
//!
//! Uses the `clap` derive API; every binary built on [`crate::cli::main`] accepts the same flags.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use termcolor::ColorChoice;

use crate::config::RunConfig;
use crate::logger::OutputMode;

/// Environment variable overriding the configuration entrypoint.
pub const ENTRYPOINT_ENV: &str = "MICROTEST_ENTRYPOINT";

#[derive(Debug, Parser)]
#[command(name = "microtest", version, about = "Run a microtest suite.")]
pub struct MicrotestArgs {
    /// Only run modules whose path contains (or, if absolute, equals) this value.
    #[arg(long = "include-module", value_name = "PATH")]
    pub include_modules: Vec<String>,

    /// Skip modules whose path contains (or, if absolute, equals) this value.
    #[arg(long = "exclude-module", value_name = "PATH")]
    pub exclude_modules: Vec<String>,

    /// Only run tests tagged with this group.
    #[arg(long = "include-group", value_name = "GROUP")]
    pub include_groups: Vec<String>,

    /// Skip tests tagged with this group.
    #[arg(long = "exclude-group", value_name = "GROUP")]
    pub exclude_groups: Vec<String>,

    /// How much to print.
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,

    /// Emit one JSON object per event instead of console output.
    #[arg(long)]
    pub json: bool,

    /// When to color console output.
    #[arg(long, value_enum, default_value_t = ColorArg::Auto)]
    pub color: ColorArg,

    /// YAML run configuration.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Discover test files under this directory and run matching modules in discovery order.
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration entrypoint to run before testing.
    #[arg(long, env = ENTRYPOINT_ENV, value_name = "NAME")]
    pub entrypoint: Option<String>,
}

impl MicrotestArgs {
    /// The flags that overlay a configuration file.
    pub fn as_config(&self) -> RunConfig {
        RunConfig {
            include_modules: self.include_modules.clone(),
            exclude_modules: self.exclude_modules.clone(),
            include_groups: self.include_groups.clone(),
            exclude_groups: self.exclude_groups.clone(),
            output: self.output,
            entrypoint: self.entrypoint.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorArg {
    Auto,
    Always,
    Never,
}

impl ColorArg {
    /// `auto` colors only when stdout is a terminal.
    pub fn choice(self) -> ColorChoice {
        match self {
            ColorArg::Always => ColorChoice::Always,
            ColorArg::Never => ColorChoice::Never,
            ColorArg::Auto if atty::is(atty::Stream::Stdout) => ColorChoice::Auto,
            ColorArg::Auto => ColorChoice::Never,
        }
    }
}
