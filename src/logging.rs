//! Tracing subscriber initialisation.
//!
//! | Flag(s)       | Filter level |
//! |---------------|--------------|
//! | (none)        | WARN         |
//! | `--out DIR`   | INFO         |
//! | `-v`          | INFO         |
//! | `-vv`         | DEBUG        |
//! | `-vvv`        | TRACE        |
//! | `--quiet`     | ERROR        |
//!
//! `RUST_LOG` overrides all of the above. Everything goes to stderr.

use std::io::IsTerminal as _;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::Cli;

/// Install the global subscriber. Call once, before anything logs.
pub fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = derive_level(cli.verbose, cli.quiet, cli.out.is_some());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("ejs_render={level}")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise tracing: {e}"))?;

    Ok(())
}

/// Written files are reported at info, so `--out` raises the default level
fn derive_level(verbose: u8, quiet: bool, writes_files: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 if writes_files => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
