//! Check command implementation

use crate::cli::CheckArgs;
use crate::commands::load_registry;
use crate::error::add_upload_context;
use crate::output::Output;
use anyhow::Result;
use anyhow::bail;
use std::sync::Arc;
use upgate_core::RateLimiter;
use upgate_core::ValidationMode;
use upgate_core::Validator;

pub fn execute(args: &CheckArgs, output: &Output) -> Result<()> {
    let registry = load_registry(args.policy_file.as_deref())?;
    let (tier, _) = add_upload_context(registry.lookup(&args.tier), &args.path)?;

    let mode = if args.detailed {
        ValidationMode::Detailed
    } else {
        ValidationMode::FailFast
    };
    // One process validates one target, so a fresh limiter only sees this upload.
    let limiter = Arc::new(RateLimiter::default());
    let validator = Validator::from_registry(&registry, tier, limiter).with_mode(mode);

    if args.identity.is_none() {
        output.notice("no --identity given; rate limiting is skipped");
    }

    let report = add_upload_context(
        validator.validate(&args.path, args.identity.as_deref()),
        &args.path,
    )?;

    output.report(&report)?;

    if report.is_safe {
        Ok(())
    } else {
        bail!("Upload rejected: {}", report.summary())
    }
}
