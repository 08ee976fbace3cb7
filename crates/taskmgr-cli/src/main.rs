//! taskmgr - a small task manager for the terminal.

use clap::Parser;
use taskmgr_core::StorageError;
use taskmgr_core::TaskError;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod cli;
mod render;
mod settings;

use cli::Cli;

fn main() {
    // Diagnostics are opt-in via RUST_LOG and go to stderr.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new("off"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let cli = Cli::parse();
    if let Err(err) = cli.run() {
        eprintln!("error: {err:#}");
        std::process::exit(exit_code(&err));
    }
}

/// 2 for anything the user can fix by changing the command, 4 when the
/// store could not be read or written.
fn exit_code(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<StorageError>().is_some() {
        return 4;
    }
    match err.downcast_ref::<TaskError>() {
        Some(TaskError::Storage(_)) => 4,
        Some(_) => 2,
        None => 1,
    }
}
