//! fscache - command-line access to a filesystem-backed cache

use std::io;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fscache::cli::{self, Cli};

/// Logs go to stderr so stdout carries only payloads.
/// Defaults to warnings, can be overridden with RUST_LOG.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "fscache=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() -> ExitCode {
    init_tracing();

    let cli = Cli::parse();
    let cache = cli.cache();

    match cli::run(&cli, &cache) {
        Ok(outcome) => {
            if let Some(output) = outcome.output {
                println!("{output}");
            }
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(2)
        }
    }
}
