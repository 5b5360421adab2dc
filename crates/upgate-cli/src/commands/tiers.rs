//! Tiers command implementation

use crate::cli::TiersArgs;
use crate::commands::load_registry;
use crate::output::Output;
use anyhow::Result;

pub fn execute(args: &TiersArgs, output: &Output) -> Result<()> {
    let registry = load_registry(args.policy_file.as_deref())?;
    output.tiers(&registry)
}
