//! Recoverable rejection outcomes.
//!
//! Every reason an upload can be turned away is a variant somewhere in this
//! module. Rejections are local verdicts: they are recorded in a
//! [`ValidationReport`](crate::ValidationReport) and never abort the process.

use std::time::Duration;

use thiserror::Error;

use crate::content::Category;
use crate::content::Signature;
use crate::report::RiskLevel;

/// A filename failed the path and name safety rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NameRejection {
    /// Name is empty.
    #[error("empty filename")]
    Empty,

    /// Name contains a parent-directory segment, a leading root separator or a
    /// drive/scheme separator.
    #[error("path traversal detected: {name}")]
    PathTraversal {
        /// The rejected name.
        name: String,
    },

    /// Name contains a character from the disallowed set.
    #[error("disallowed character {character:?} in filename: {name}")]
    DisallowedCharacter {
        /// The rejected name.
        name: String,
        /// First disallowed character found.
        character: char,
    },

    /// Name contains a token associated with malicious payloads.
    #[error("suspicious pattern '{token}' in filename: {name}")]
    SuspiciousPattern {
        /// The rejected name.
        name: String,
        /// The matched token.
        token: &'static str,
    },

    /// Name hides a dangerous extension behind or in front of a benign one.
    #[error("disguised dangerous extension '.{extension}' in filename: {name}")]
    DisguisedExtension {
        /// The rejected name.
        name: String,
        /// The dangerous extension segment.
        extension: String,
    },
}

/// A file's type is not on the whitelist or disagrees with its content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassificationError {
    /// Extension does not belong to any allowed category.
    #[error("file type not allowed: {name}")]
    UnsupportedType {
        /// The rejected name.
        name: String,
    },

    /// Sniffed content signature is not registered for the extension's category.
    #[error("content is {signature} but '{name}' claims to be {category}")]
    TypeMismatch {
        /// The rejected name.
        name: String,
        /// Category implied by the extension.
        category: Category,
        /// Signature sniffed from the leading bytes.
        signature: Signature,
    },
}

/// A size ceiling was exceeded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SizeExceeded {
    /// Single file exceeds `max_file_size`.
    #[error("file too large ({size} > {max} bytes)")]
    File {
        /// Actual size in bytes.
        size: u64,
        /// Ceiling in bytes.
        max: u64,
    },

    /// Archive container exceeds `max_archive_size`.
    #[error("archive too large ({size} > {max} bytes)")]
    Archive {
        /// Actual container size in bytes.
        size: u64,
        /// Ceiling in bytes.
        max: u64,
    },

    /// Running total of declared entry sizes exceeds `max_extracted_size`.
    #[error("extracted size exceeds limit ({total} > {max} bytes)")]
    Extracted {
        /// Running total in bytes.
        total: u64,
        /// Ceiling in bytes.
        max: u64,
    },

    /// File exceeds the ceiling registered for its category.
    #[error("{category} file too large ({size} > {max} bytes)")]
    Category {
        /// Category of the file.
        category: Category,
        /// Actual size in bytes.
        size: u64,
        /// Ceiling in bytes.
        max: u64,
    },
}

/// An archive's entry directory failed inspection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArchiveRejection {
    /// Archive lists more entries than `max_archive_entries`.
    #[error("archive contains too many entries ({count} > {max})")]
    TooManyEntries {
        /// Number of entries seen.
        count: usize,
        /// Ceiling.
        max: usize,
    },

    /// An entry path failed the name safety rules.
    #[error("unsafe entry '{entry}': {reason}")]
    UnsafeEntryName {
        /// Entry path as listed in the archive.
        entry: String,
        /// Why the name was rejected.
        reason: NameRejection,
    },

    /// An entry, or the running total up to it, exceeds a size ceiling.
    #[error("entry '{entry}': {limit}")]
    Oversized {
        /// Entry path as listed in the archive.
        entry: String,
        /// Which ceiling was exceeded.
        limit: SizeExceeded,
    },

    /// An entry claims to expand by more than the allowed ratio.
    #[error(
        "suspicious compression ratio for '{entry}' ({ratio:.1}:1 > {max:.1}:1), possible zip bomb"
    )]
    CompressionRatio {
        /// Entry path, or the archive name for aggregate checks.
        entry: String,
        /// Declared over compressed size.
        ratio: f64,
        /// Ceiling.
        max: f64,
    },

    /// Container format cannot be introspected.
    #[error("archive format cannot be inspected: {format}")]
    UnsupportedContainer {
        /// Detected or claimed format name.
        format: String,
    },

    /// Container could not be parsed.
    #[error("corrupt archive: {0}")]
    Corrupt(String),
}

/// A heuristic content scan found active or executable content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentThreat {
    /// Image carries a Windows PE header.
    #[error("hidden executable detected inside image")]
    EmbeddedExecutable,

    /// SVG carries script content.
    #[error("suspicious script content '{marker}' in SVG")]
    ActiveContent {
        /// The matched marker.
        marker: &'static str,
    },

    /// Document carries a macro marker.
    #[error("suspicious macro marker '{marker}' in document")]
    MacroMarker {
        /// The matched marker.
        marker: &'static str,
    },

    /// Source file calls a dangerous primitive.
    #[error("suspicious code pattern '{pattern}(' found")]
    DangerousCall {
        /// The matched function name.
        pattern: &'static str,
    },
}

/// An identity exceeded its upload ceiling.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RateLimited {
    /// Hourly ceiling reached.
    #[error("rate limit exceeded: {count} uploads in the last hour (limit {ceiling})")]
    Hourly {
        /// Uploads counted in the window.
        count: usize,
        /// Ceiling for the window.
        ceiling: usize,
        /// Time until the oldest counted upload leaves the window.
        retry_after: Duration,
    },

    /// Daily ceiling reached.
    #[error("rate limit exceeded: {count} uploads in the last 24 hours (limit {ceiling})")]
    Daily {
        /// Uploads counted in the window.
        count: usize,
        /// Ceiling for the window.
        ceiling: usize,
        /// Time until the oldest counted upload leaves the window.
        retry_after: Duration,
    },
}

impl RateLimited {
    /// Time until another upload could be admitted.
    #[must_use]
    pub const fn retry_after(&self) -> Duration {
        match self {
            Self::Hourly { retry_after, .. } | Self::Daily { retry_after, .. } => *retry_after,
        }
    }
}

/// Any recoverable reason for turning an upload away.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Rejection {
    /// Name safety rules.
    #[error(transparent)]
    Name(#[from] NameRejection),

    /// Type whitelist and content cross-check.
    #[error(transparent)]
    Classification(#[from] ClassificationError),

    /// Size ceilings.
    #[error(transparent)]
    Size(#[from] SizeExceeded),

    /// Archive inspection.
    #[error(transparent)]
    Archive(#[from] ArchiveRejection),

    /// Content heuristics.
    #[error(transparent)]
    Content(#[from] ContentThreat),

    /// Upload throttling.
    #[error(transparent)]
    RateLimited(#[from] RateLimited),
}

impl Rejection {
    /// Severity this rejection contributes to a report's risk level.
    ///
    /// # Examples
    ///
    /// ```
    /// use upgate_core::{Rejection, RiskLevel, SizeExceeded};
    ///
    /// let r = Rejection::from(SizeExceeded::File { size: 30, max: 25 });
    /// assert_eq!(r.severity(), RiskLevel::Medium);
    /// ```
    #[must_use]
    pub fn severity(&self) -> RiskLevel {
        match self {
            Self::Name(_) | Self::RateLimited(_) => RiskLevel::High,
            Self::Classification(_) if self.is_disguised_executable() => RiskLevel::Critical,
            Self::Classification(_) => RiskLevel::High,
            Self::Size(_) => RiskLevel::Medium,
            Self::Archive(a) => match a {
                ArchiveRejection::UnsafeEntryName { .. }
                | ArchiveRejection::CompressionRatio { .. }
                | ArchiveRejection::Corrupt(_) => RiskLevel::High,
                ArchiveRejection::TooManyEntries { .. }
                | ArchiveRejection::Oversized { .. }
                | ArchiveRejection::UnsupportedContainer { .. } => RiskLevel::Medium,
            },
            Self::Content(ContentThreat::EmbeddedExecutable) => RiskLevel::Critical,
            Self::Content(_) => RiskLevel::High,
        }
    }

    /// Returns `true` if the content is an executable wearing another type's
    /// extension.
    #[must_use]
    pub fn is_disguised_executable(&self) -> bool {
        match self {
            Self::Classification(ClassificationError::TypeMismatch { signature, .. }) => {
                signature.is_executable()
            }
            Self::Content(ContentThreat::EmbeddedExecutable) => true,
            _ => false,
        }
    }

    /// Actionable advice for the uploader.
    #[must_use]
    pub fn recommendation(&self) -> &'static str {
        match self {
            Self::Name(_) => "Rename the file and remove path separators or suspicious words",
            Self::Classification(ClassificationError::UnsupportedType { .. }) => {
                "Convert the file to one of the allowed formats"
            }
            Self::Classification(ClassificationError::TypeMismatch { .. }) => {
                "Make sure the file extension matches the actual file content"
            }
            Self::Size(_) => "Reduce the file size below the tier limit or use a higher tier",
            Self::Archive(ArchiveRejection::CompressionRatio { .. }) => {
                "Repack the archive without highly compressible padding"
            }
            Self::Archive(ArchiveRejection::UnsupportedContainer { .. }) => {
                "Repack the archive as zip or tar.gz"
            }
            Self::Archive(_) => {
                "Review the archive contents and remove unsafe or oversized entries"
            }
            Self::Content(_) => "Review the file content and remove suspicious elements",
            Self::RateLimited(_) => "Wait before uploading again",
        }
    }
}
