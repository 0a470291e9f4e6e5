//! cli
//!
//! Command-line interface layer for tunrules.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the diagnostics subscriber
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap, loads configuration,
//! and dispatches to [`commands`], which call into [`crate::core`].

pub mod args;
pub mod commands;

pub use args::Cli;

use anyhow::{Context as _, Result};
use tracing_subscriber::EnvFilter;

use crate::core::config::Config;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let config = Config::load().context("Failed to load config")?;
    let paths = config
        .store_paths(cli.store_dir.as_deref())
        .context("Failed to resolve rule store location")?;

    let ctx = commands::Context {
        paths,
        tunnel_mode: config.tunnel_mode(),
    };

    commands::dispatch(cli.command, &ctx)
}

/// Send diagnostics to stderr, filtered by `RUST_LOG`.
///
/// Defaults to `warn`, or `debug` with `--debug`.
fn init_tracing(debug: bool) {
    let fallback = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    // A subscriber may already be installed when embedded; keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
