//! CLI argument parsing using clap.

use clap::Parser;
use clap::Subcommand;
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "upgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output results in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate an uploaded file, archive or directory
    Check(CheckArgs),
    /// Show the upload ceilings of every tier
    Tiers(TiersArgs),
    /// Generate shell completions
    Completion(CompletionArgs),
}

#[derive(clap::Args)]
pub struct CheckArgs {
    /// Path to the uploaded file, archive or directory
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Trust tier of the uploader (basic, elevated, privileged)
    #[arg(short, long, default_value = "basic", value_name = "TIER")]
    pub tier: String,

    /// Uploader identity used for rate limiting
    #[arg(short, long, value_name = "ID")]
    pub identity: Option<String>,

    /// Run every check and collect recommendations instead of stopping at
    /// the first failure
    #[arg(short, long)]
    pub detailed: bool,

    /// JSON policy document replacing the built-in tier ceilings
    #[arg(long, value_name = "FILE")]
    pub policy_file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct TiersArgs {
    /// JSON policy document replacing the built-in tier ceilings
    #[arg(long, value_name = "FILE")]
    pub policy_file: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct CompletionArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: Shell,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_check_defaults() {
        let cli = Cli::try_parse_from(["upgate", "check", "upload.zip"]).unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check command");
        };
        assert_eq!(args.tier, "basic");
        assert!(args.identity.is_none());
        assert!(!args.detailed);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["upgate", "-v", "-q", "tiers"]);
        assert!(result.is_err());
    }
}
