//! Fatal error type for upload validation.
//!
//! Rejections of an upload are not errors: they are recorded in the
//! [`ValidationReport`](crate::ValidationReport) as [`Rejection`](crate::Rejection)
//! values. `UploadError` covers only conditions that prevent a verdict from
//! being produced at all.

use thiserror::Error;

/// Result type alias using `UploadError`.
pub type Result<T> = std::result::Result<T, UploadError>;

/// Errors that prevent a validation verdict from being produced.
#[derive(Error, Debug)]
pub enum UploadError {
    /// I/O operation on the upload target failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Tier name is not registered.
    #[error("unknown upload tier: {name}")]
    UnknownTier {
        /// The name that failed to resolve.
        name: String,
    },

    /// Policy or type table violates a registry invariant.
    #[error("invalid policy: {reason}")]
    InvalidPolicy {
        /// Which invariant was violated.
        reason: String,
    },

    /// Policy document could not be parsed.
    #[error("invalid policy document: {0}")]
    Config(#[from] serde_json::Error),
}

impl UploadError {
    /// Returns `true` if this error came from configuration rather than from
    /// the upload target.
    ///
    /// # Examples
    ///
    /// ```
    /// use upgate_core::UploadError;
    ///
    /// let err = UploadError::UnknownTier { name: "guest".into() };
    /// assert!(err.is_configuration());
    ///
    /// let err = UploadError::Io(std::io::Error::other("disk gone"));
    /// assert!(!err.is_configuration());
    /// ```
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownTier { .. } | Self::InvalidPolicy { .. } | Self::Config(_)
        )
    }

    /// Returns `true` if the target path does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}
