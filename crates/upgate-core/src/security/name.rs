//! Path and name safety rules.
//!
//! [`check_name`] runs four rules in order and reports the first violation:
//!
//! 1. traversal: `..` segments, a leading root separator, or `:`
//! 2. disallowed characters: `\ < > | * ? "` and NUL
//! 3. suspicious tokens (heuristic, see below)
//! 4. disguised extensions such as `report.exe.txt` or `invoice.pdf.exe`
//!
//! The suspicious-token list is a defense-in-depth heuristic layered on top of
//! the type whitelist, not a security boundary by itself: renaming a payload
//! defeats it, and benign names like `seashell.png` trip it.

use crate::rejection::NameRejection;

/// Characters that never appear in an accepted filename.
pub const DISALLOWED_CHARS: [char; 8] = ['\\', '<', '>', '|', '*', '?', '"', '\0'];

/// Substrings strongly associated with malicious payload names.
pub const SUSPICIOUS_TOKENS: [&str; 13] = [
    "backdoor", "exploit", "trojan", "virus", "malware", "ransom", "keylog", "rootkit", "botnet",
    "payload", "shell", "reverse", "hack",
];

/// Extensions that must not be hidden among other extensions.
pub const DANGEROUS_EXTENSIONS: [&str; 10] =
    ["exe", "dll", "bat", "cmd", "sh", "com", "scr", "pif", "vbs", "ps1"];

/// Validates a candidate filename or archive entry path.
///
/// The function is pure: the same input always yields the same verdict.
///
/// # Errors
///
/// Returns the first [`NameRejection`] the name triggers.
///
/// # Examples
///
/// ```
/// use upgate_core::security::check_name;
/// use upgate_core::NameRejection;
///
/// assert!(check_name("photos/holiday.jpg").is_ok());
/// assert!(matches!(
///     check_name("../etc/passwd"),
///     Err(NameRejection::PathTraversal { .. })
/// ));
/// assert!(matches!(
///     check_name("invoice.pdf.exe"),
///     Err(NameRejection::DisguisedExtension { .. })
/// ));
/// ```
pub fn check_name(name: &str) -> Result<(), NameRejection> {
    if name.is_empty() {
        return Err(NameRejection::Empty);
    }

    if has_traversal(name) {
        return Err(NameRejection::PathTraversal {
            name: name.to_string(),
        });
    }

    if let Some(character) = name.chars().find(|c| DISALLOWED_CHARS.contains(c)) {
        return Err(NameRejection::DisallowedCharacter {
            name: name.to_string(),
            character,
        });
    }

    let lower = name.to_lowercase();
    if let Some(token) = SUSPICIOUS_TOKENS.iter().copied().find(|t| lower.contains(t)) {
        return Err(NameRejection::SuspiciousPattern {
            name: name.to_string(),
            token,
        });
    }

    if let Some(extension) = disguised_extension(&lower) {
        return Err(NameRejection::DisguisedExtension {
            name: name.to_string(),
            extension: extension.to_string(),
        });
    }

    Ok(())
}

fn has_traversal(name: &str) -> bool {
    name.starts_with('/')
        || name.contains(':')
        || name.split(['/', '\\']).any(|segment| segment == "..")
}

/// Finds a dangerous extension among the extension segments of the final path
/// component when the component carries more than one extension.
///
/// Only the final component is examined so dotted directory names do not
/// produce false positives.
fn disguised_extension(lower: &str) -> Option<&str> {
    let base = lower.rsplit('/').next().unwrap_or(lower);
    let segments: Vec<&str> = base.split('.').collect();
    if segments.len() <= 2 {
        return None;
    }
    segments[1..]
        .iter()
        .copied()
        .find(|segment| DANGEROUS_EXTENSIONS.contains(segment))
}
