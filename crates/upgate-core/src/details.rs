//! Descriptive facts about an uploaded file.
//!
//! [`FileDetails`] is attached to single-file reports in detailed mode. None
//! of it feeds the verdict: hosting concerns surface as report warnings.

use std::fs::Metadata;
use std::time::Duration;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::content::Signature;
use crate::content::extension_of;

const KIB: u64 = 1024;
const MIB: u64 = KIB * 1024;

/// Files above this size cannot be pushed to a git host at all.
pub const HOSTING_HARD_LIMIT: u64 = 100 * MIB;

/// Files above this size should go through large-file storage.
pub const HOSTING_LFS_THRESHOLD: u64 = 25 * MIB;

/// Uplink assumed by [`estimate_upload`], in bytes per second.
pub const ASSUMED_UPLINK: u64 = 10 * MIB;

/// Characters git hosts refuse in path names.
const HOSTING_RESERVED: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Leading bytes searched for NUL when the content type is unknown.
const BINARY_WINDOW: usize = 1024;

/// Whether a file can be published to a git host as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostingCompatibility {
    /// `false` when the host would refuse the file.
    pub compatible: bool,
    /// Size is under [`HOSTING_HARD_LIMIT`].
    pub size_ok: bool,
    /// Name has no host-reserved characters.
    pub filename_ok: bool,
    /// Human-readable concerns, also copied into the report's warnings.
    pub warnings: Vec<String>,
}

/// Facts about a single file, gathered in detailed mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDetails {
    /// Lowercase extension without the dot.
    pub extension: Option<String>,
    /// Size as shown to people, e.g. `2.5 MB`.
    pub size_human: String,
    /// Content is not text.
    pub is_binary: bool,
    /// Transfer time at [`ASSUMED_UPLINK`].
    pub estimated_upload_secs: f64,
    /// Last modification time, when the platform reports one.
    pub modified: Option<DateTime<Utc>>,
    /// Creation time, when the platform reports one.
    pub created: Option<DateTime<Utc>>,
    /// Git hosting limits.
    pub hosting: HostingCompatibility,
}

impl FileDetails {
    /// Collects details from file metadata and the sniffed prefix.
    #[must_use]
    pub fn collect(
        name: &str,
        metadata: &Metadata,
        signature: Option<Signature>,
        prefix: &[u8],
    ) -> Self {
        let size = metadata.len();
        Self {
            extension: extension_of(name),
            size_human: human_size(size),
            is_binary: is_binary(signature, prefix),
            estimated_upload_secs: estimate_upload(size).as_secs_f64(),
            modified: metadata.modified().ok().map(DateTime::<Utc>::from),
            created: metadata.created().ok().map(DateTime::<Utc>::from),
            hosting: hosting_compatibility(name, size),
        }
    }
}

/// Formats a byte count in binary units with one decimal.
///
/// ```
/// use upgate_core::details::human_size;
///
/// assert_eq!(human_size(0), "0 B");
/// assert_eq!(human_size(1536), "1.5 KB");
/// assert_eq!(human_size(25 * 1024 * 1024), "25.0 MB");
/// ```
#[must_use]
pub fn human_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let units = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= KIB as f64 && unit < units.len() - 1 {
        value /= KIB as f64;
        unit += 1;
    }
    format!("{value:.1} {}", units[unit])
}

/// Time to transfer `bytes` at [`ASSUMED_UPLINK`].
#[must_use]
pub fn estimate_upload(bytes: u64) -> Duration {
    Duration::from_secs_f64(bytes as f64 / ASSUMED_UPLINK as f64)
}

/// Known textual signatures are text, other known signatures are binary,
/// unknown content is binary iff it holds a NUL early on.
fn is_binary(signature: Option<Signature>, prefix: &[u8]) -> bool {
    match signature {
        Some(signature) => !signature.is_textual(),
        None => prefix.iter().take(BINARY_WINDOW).any(|&b| b == 0),
    }
}

/// Checks a file against git hosting limits.
///
/// ```
/// use upgate_core::details::hosting_compatibility;
///
/// let large = hosting_compatibility("dump.sql", 30 * 1024 * 1024);
/// assert!(large.compatible);
/// assert_eq!(large.warnings.len(), 1);
///
/// let reserved = hosting_compatibility("what?.txt", 10);
/// assert!(!reserved.filename_ok);
/// ```
#[must_use]
pub fn hosting_compatibility(name: &str, size: u64) -> HostingCompatibility {
    let mut warnings = Vec::new();

    let size_ok = size <= HOSTING_HARD_LIMIT;
    if !size_ok {
        warnings.push(format!(
            "file exceeds the {} git hosting limit",
            human_size(HOSTING_HARD_LIMIT)
        ));
    } else if size > HOSTING_LFS_THRESHOLD {
        warnings.push(format!(
            "large file, use git LFS for files over {}",
            human_size(HOSTING_LFS_THRESHOLD)
        ));
    }

    let filename_ok = !name.contains(HOSTING_RESERVED);
    if !filename_ok {
        warnings.push("filename contains characters git hosts reject".to_string());
    }

    HostingCompatibility {
        compatible: size_ok,
        size_ok,
        filename_ok,
        warnings,
    }
}
