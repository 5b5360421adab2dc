//! Security gate for untrusted uploads.
//!
//! `upgate-core` decides whether a user-submitted file, archive or directory
//! may enter a publishing pipeline. Each upload runs through per-identity
//! rate limiting, filename safety rules, tier size ceilings, content
//! classification with magic-number sniffing, and, for archives, an
//! inspection of the entry directory that never extracts payloads.
//!
//! Every rejection is a value recorded in a [`ValidationReport`]; only
//! conditions that prevent a verdict (an unreadable file, a bad policy
//! document) surface as [`UploadError`].
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use upgate_core::{RateLimiter, Tier, classify_validator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimiter::default());
//! let validator = classify_validator(Tier::Basic, limiter);
//! let report = validator.validate("uploads/site.zip", Some("user-42"))?;
//! println!("{} risk, score {}", report.risk_level, report.security_score);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod archive;
pub mod content;
pub mod details;
pub mod error;
pub mod policy;
pub mod rejection;
pub mod report;
pub mod security;
pub mod validator;

#[cfg(test)]
mod test_utils;

pub use api::classify_validator;
pub use api::validate_archive;
pub use api::validate_directory;
pub use api::validate_file;
pub use archive::ArchiveSummary;
pub use content::AllowedTypeTable;
pub use content::Category;
pub use content::Signature;
pub use details::FileDetails;
pub use error::Result;
pub use error::UploadError;
pub use policy::PolicyRegistry;
pub use policy::Tier;
pub use policy::UploadPolicy;
pub use rejection::ArchiveRejection;
pub use rejection::ClassificationError;
pub use rejection::ContentThreat;
pub use rejection::NameRejection;
pub use rejection::RateLimited;
pub use rejection::Rejection;
pub use rejection::SizeExceeded;
pub use report::CheckKind;
pub use report::CheckOutcome;
pub use report::RiskLevel;
pub use report::ValidationReport;
pub use security::RateLimiter;
pub use validator::ValidationMode;
pub use validator::Validator;
