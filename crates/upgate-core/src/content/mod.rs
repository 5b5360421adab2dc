//! Content classification.
//!
//! A filename's extension selects a [`Category`] from the
//! [`AllowedTypeTable`]; the file's leading bytes are then [`sniff`]ed and the
//! resulting [`Signature`] must be one the category accepts. Files that pass
//! are run through the category [heuristics](scan_content).

mod heuristics;
mod sniff;
mod types;

use std::fs::File;
use std::io::Read;
use std::path::Path;

pub use heuristics::scan_content;
pub use sniff::Signature;
pub use sniff::sniff;
pub use types::AllowedTypeTable;
pub use types::Category;
pub use types::TypeRule;
pub(crate) use types::extension_of;

/// Number of leading bytes read for sniffing and heuristics.
pub const SNIFF_LIMIT: usize = 16 * 1024;

/// Reads at most [`SNIFF_LIMIT`] bytes from the start of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or read.
pub fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut prefix = Vec::with_capacity(SNIFF_LIMIT);
    File::open(path)?
        .take(SNIFF_LIMIT as u64)
        .read_to_end(&mut prefix)?;
    Ok(prefix)
}
