//! Upgate CLI - Command-line front end for the upload security gate.

mod cli;
mod commands;
mod error;
mod output;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();

    init_tracing(cli.verbose, cli.quiet);

    let output = output::Output::from_flags(cli.json, cli.verbose, cli.quiet);

    match &cli.command {
        cli::Commands::Check(args) => commands::check::execute(args, &output),
        cli::Commands::Tiers(args) => commands::tiers::execute(args, &output),
        cli::Commands::Completion(args) => {
            commands::completion::execute(args.shell);
            Ok(())
        }
    }
}

/// Sends library events to stderr. `RUST_LOG` overrides the flag defaults.
fn init_tracing(verbose: bool, quiet: bool) {
    let default = if quiet {
        "off"
    } else if verbose {
        "upgate_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
