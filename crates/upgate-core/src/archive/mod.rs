//! Archive inspection.
//!
//! [`inspect_entries`] is the policy walk over entry metadata;
//! [`inspect_archive`] feeds it from an opened container. Neither extracts
//! entry payloads.

mod inspect;
mod listing;

pub use inspect::ArchiveEntryMeta;
pub use inspect::ArchiveSummary;
pub use inspect::check_aggregate_ratio;
pub use inspect::inspect_entries;
pub use listing::ContainerFormat;
pub use listing::inspect_archive;
