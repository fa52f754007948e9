//! CLI layer: argument parsing, logging setup and command dispatch

pub mod args;
pub mod commands;
pub mod error;
pub mod output;

use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, Layer};

use crate::application::ApplicationResult;
use crate::config::Settings;
use crate::domain::ComponentTree;
use crate::exitcode;

pub use args::{Cli, Commands, ConfigCommands};
pub use commands::{execute, manifest_writer, render_release, synth_into, validators};
pub use error::{CliError, CliResult};

/// Parse the process arguments, run the command and return the exit code.
///
/// `build` receives the effective settings (including `--set` context
/// values) and returns the release tree to synthesize.
pub fn run<F>(build: F) -> i32
where
    F: FnOnce(&Settings) -> ApplicationResult<ComponentTree>,
{
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                exitcode::USAGE
            } else {
                exitcode::OK
            };
        }
    };
    setup_logging(cli.debug);

    match execute(&cli, build) {
        Ok(()) => exitcode::OK,
        Err(e) => {
            output::error(&e);
            e.exit_code()
        }
    }
}

pub fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        3 => LevelFilter::TRACE,
        _ => {
            eprintln!("Don't be crazy, max is -d -d -d");
            LevelFilter::TRACE
        }
    };

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .with_span_events(FmtSpan::ENTER | FmtSpan::CLOSE);

    // try_init: a host application may already own the global subscriber
    let _ = tracing_subscriber::registry()
        .with(fmt_layer.with_filter(filter))
        .try_init();

    match filter {
        LevelFilter::INFO => tracing::info!("Debug mode: info"),
        LevelFilter::DEBUG => tracing::debug!("Debug mode: debug"),
        LevelFilter::TRACE => tracing::debug!("Debug mode: trace"),
        _ => {}
    }
}
