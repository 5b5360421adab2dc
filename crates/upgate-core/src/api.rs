//! Function-style entry points for collaborators.
//!
//! Each call builds a [`Validator`] for the tier's seeded policy. The rate
//! limiter is always passed in; callers that validate repeatedly should keep
//! one [`Validator`] from [`classify_validator`] instead.

use std::path::Path;
use std::sync::Arc;

use crate::Result;
use crate::Tier;
use crate::ValidationReport;
use crate::security::RateLimiter;
use crate::validator::ValidationMode;
use crate::validator::Validator;

/// Returns a detailed validator bound to one tier.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use upgate_core::{RateLimiter, Tier, ValidationMode, classify_validator};
///
/// let validator = classify_validator(Tier::Elevated, Arc::new(RateLimiter::default()));
/// assert_eq!(validator.tier(), Tier::Elevated);
/// assert_eq!(validator.mode(), ValidationMode::Detailed);
/// ```
#[must_use]
pub fn classify_validator(tier: Tier, limiter: Arc<RateLimiter>) -> Validator {
    Validator::for_tier(tier, limiter).with_mode(ValidationMode::Detailed)
}

/// Validates a single file.
///
/// # Errors
///
/// Returns `UploadError::Io` if the file cannot be read.
pub fn validate_file(
    path: impl AsRef<Path>,
    tier: Tier,
    identity: Option<&str>,
    mode: ValidationMode,
    limiter: &Arc<RateLimiter>,
) -> Result<ValidationReport> {
    Validator::for_tier(tier, Arc::clone(limiter))
        .with_mode(mode)
        .validate_file(path, identity)
}

/// Validates an archive in detailed mode.
///
/// # Errors
///
/// Returns `UploadError::Io` if the archive cannot be read.
pub fn validate_archive(
    path: impl AsRef<Path>,
    tier: Tier,
    identity: Option<&str>,
    limiter: &Arc<RateLimiter>,
) -> Result<ValidationReport> {
    classify_validator(tier, Arc::clone(limiter)).validate_archive(path, identity)
}

/// Validates every file below a directory.
///
/// # Errors
///
/// Returns `UploadError::Io` if the directory cannot be walked.
pub fn validate_directory(
    path: impl AsRef<Path>,
    tier: Tier,
    identity: Option<&str>,
    mode: ValidationMode,
    limiter: &Arc<RateLimiter>,
) -> Result<ValidationReport> {
    Validator::for_tier(tier, Arc::clone(limiter))
        .with_mode(mode)
        .validate_directory(path, identity)
}
