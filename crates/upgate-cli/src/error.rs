//! Error conversion utilities for CLI.
//!
//! Converts upgate-core's typed errors (thiserror) into user-friendly
//! contextual errors (anyhow) with actionable guidance.

use anyhow::anyhow;
use std::io::ErrorKind;
use std::path::Path;
use upgate_core::UploadError;

/// Converts `UploadError` to a user-friendly anyhow error naming `source`.
pub fn convert_upload_error(err: UploadError, source: &Path) -> anyhow::Error {
    match err {
        UploadError::Io(io_err) if io_err.kind() == ErrorKind::NotFound => {
            anyhow!(
                "Upload target not found: '{}'\n\
                 HINT: Check the path; directories are validated recursively.",
                source.display()
            )
        }
        UploadError::Io(io_err) => {
            anyhow!("I/O error while validating '{}': {}", source.display(), io_err)
        }
        UploadError::UnknownTier { name } => {
            anyhow!(
                "Unknown tier '{name}'\n\
                 HINT: Known tiers are basic, elevated and privileged \
                 (aliases: web, api, admin). Run `upgate tiers` to list them."
            )
        }
        UploadError::InvalidPolicy { reason } => {
            anyhow!(
                "Policy in '{}' is invalid: {reason}\n\
                 HINT: Every ceiling must be positive, and size and entry limits \
                 must grow from basic to privileged.",
                source.display()
            )
        }
        UploadError::Config(json_err) => {
            anyhow!(
                "Could not parse policy document '{}': {json_err}\n\
                 HINT: The `data` field of `upgate tiers --json` has the expected shape.",
                source.display()
            )
        }
    }
}

/// Adds context to a core result about the given source path.
pub fn add_upload_context<T>(
    result: Result<T, UploadError>,
    source: &Path,
) -> anyhow::Result<T> {
    result.map_err(|e| convert_upload_error(e, source))
}
