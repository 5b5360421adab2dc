//! Subcommand implementations.

pub mod check;
pub mod completion;
pub mod tiers;

use crate::error::add_upload_context;
use anyhow::Context;
use anyhow::Result;
use std::fs;
use std::path::Path;
use upgate_core::PolicyRegistry;

/// Loads the tier registry from a policy document, or the built-in one.
pub fn load_registry(policy_file: Option<&Path>) -> Result<PolicyRegistry> {
    let Some(path) = policy_file else {
        return Ok(PolicyRegistry::default());
    };
    let document = fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file '{}'", path.display()))?;
    add_upload_context(PolicyRegistry::from_json(&document), path)
}
