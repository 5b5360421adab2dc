//! Entry-directory inspection.

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::UploadPolicy;
use crate::rejection::ArchiveRejection;
use crate::rejection::SizeExceeded;
use crate::security::check_name;

/// Metadata of one archive entry, as listed in the container's directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntryMeta {
    /// Entry path as stored in the archive.
    pub name: String,
    /// Declared uncompressed size in bytes.
    pub declared_size: u64,
    /// Compressed size in bytes, `0` when the container does not record it.
    pub compressed_size: u64,
    /// Target of a symbolic or hard link entry.
    pub link_target: Option<String>,
}

impl ArchiveEntryMeta {
    /// Creates metadata for a regular entry.
    #[must_use]
    pub fn new(name: impl Into<String>, declared_size: u64, compressed_size: u64) -> Self {
        Self {
            name: name.into(),
            declared_size,
            compressed_size,
            link_target: None,
        }
    }

    /// Declared-to-compressed ratio, if the compressed size is known.
    #[must_use]
    pub fn compression_ratio(&self) -> Option<f64> {
        (self.compressed_size > 0).then(|| self.declared_size as f64 / self.compressed_size as f64)
    }
}

/// Result of a successful inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArchiveSummary {
    /// Number of entries listed.
    pub entry_count: usize,
    /// Sum of declared uncompressed sizes in bytes.
    pub total_declared_size: u64,
}

/// Inspects a stream of entry metadata against a policy.
///
/// `known_count`, when the container's directory states it up front, is
/// checked against `max_archive_entries` before any entry is looked at.
/// Streamed containers pass `None` and the count is enforced as entries
/// arrive. Per entry, in order: name safety, per-entry size, running total,
/// compression ratio. The first violation ends the walk.
///
/// # Errors
///
/// Returns the first [`ArchiveRejection`] encountered, including any error
/// yielded by the entry iterator itself.
///
/// # Examples
///
/// ```
/// use upgate_core::archive::{inspect_entries, ArchiveEntryMeta};
/// use upgate_core::{ArchiveRejection, Tier, UploadPolicy};
///
/// let policy = UploadPolicy::for_tier(Tier::Basic);
/// let entries = vec![
///     Ok(ArchiveEntryMeta::new("docs/readme.txt", 10_000, 1_000)),
///     Ok(ArchiveEntryMeta::new("docs/padding.txt", 1_000_000, 1_000)),
/// ];
/// let result = inspect_entries(Some(2), entries, &policy);
/// assert!(matches!(result, Err(ArchiveRejection::CompressionRatio { .. })));
/// ```
pub fn inspect_entries<I>(
    known_count: Option<usize>,
    entries: I,
    policy: &UploadPolicy,
) -> Result<ArchiveSummary, ArchiveRejection>
where
    I: IntoIterator<Item = Result<ArchiveEntryMeta, ArchiveRejection>>,
{
    let max_entries = policy.max_archive_entries;
    if let Some(count) = known_count
        && count > max_entries
    {
        return Err(ArchiveRejection::TooManyEntries {
            count,
            max: max_entries,
        });
    }

    let mut summary = ArchiveSummary::default();
    for entry in entries {
        let entry = entry?;
        summary.entry_count += 1;
        if summary.entry_count > max_entries {
            return Err(ArchiveRejection::TooManyEntries {
                count: summary.entry_count,
                max: max_entries,
            });
        }

        check_entry(&entry, &mut summary, policy)?;
    }

    debug!(
        entries = summary.entry_count,
        total = summary.total_declared_size,
        "archive directory inspected"
    );
    Ok(summary)
}

fn check_entry(
    entry: &ArchiveEntryMeta,
    summary: &mut ArchiveSummary,
    policy: &UploadPolicy,
) -> Result<(), ArchiveRejection> {
    check_name(&entry.name).map_err(|reason| ArchiveRejection::UnsafeEntryName {
        entry: entry.name.clone(),
        reason,
    })?;

    if let Some(target) = &entry.link_target {
        check_name(target).map_err(|reason| ArchiveRejection::UnsafeEntryName {
            entry: format!("{} -> {target}", entry.name),
            reason,
        })?;
    }

    if entry.declared_size > policy.max_file_size {
        return Err(ArchiveRejection::Oversized {
            entry: entry.name.clone(),
            limit: SizeExceeded::File {
                size: entry.declared_size,
                max: policy.max_file_size,
            },
        });
    }

    summary.total_declared_size = summary
        .total_declared_size
        .saturating_add(entry.declared_size);
    if summary.total_declared_size > policy.max_extracted_size {
        return Err(ArchiveRejection::Oversized {
            entry: entry.name.clone(),
            limit: SizeExceeded::Extracted {
                total: summary.total_declared_size,
                max: policy.max_extracted_size,
            },
        });
    }

    if let Some(ratio) = entry.compression_ratio()
        && ratio > policy.max_compression_ratio
    {
        return Err(ArchiveRejection::CompressionRatio {
            entry: entry.name.clone(),
            ratio,
            max: policy.max_compression_ratio,
        });
    }

    Ok(())
}

/// Applies the ratio ceiling to a whole container whose entries do not record
/// compressed sizes.
///
/// # Errors
///
/// Returns `CompressionRatio` labelled with `name` if the declared total
/// exceeds the container size by more than the policy allows.
pub fn check_aggregate_ratio(
    name: &str,
    summary: &ArchiveSummary,
    container_size: u64,
    policy: &UploadPolicy,
) -> Result<(), ArchiveRejection> {
    if container_size == 0 {
        return Ok(());
    }
    let ratio = summary.total_declared_size as f64 / container_size as f64;
    if ratio > policy.max_compression_ratio {
        return Err(ArchiveRejection::CompressionRatio {
            entry: name.to_string(),
            ratio,
            max: policy.max_compression_ratio,
        });
    }
    Ok(())
}
