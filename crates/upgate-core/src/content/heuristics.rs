//! Category-specific content heuristics.
//!
//! A cheap pattern layer over the sniffed prefix. It catches the obvious cases
//! (scripts in SVGs, macro markers, `eval(` in uploads) and nothing more: there
//! is no signature database and no emulation.

use super::Category;
use super::sniff::contains;
use super::types::extension_of;
use crate::rejection::ContentThreat;

const DOS_STUB: &[u8] = b"this program cannot be run in dos mode";
const SVG_MARKERS: [&str; 2] = ["<script", "javascript:"];
const MACRO_MARKERS: [&str; 3] = ["macro", "vba", "autoopen"];
const DANGEROUS_CALLS: [&str; 7] = [
    "eval",
    "exec",
    "system",
    "shell_exec",
    "passthru",
    "base64_decode",
    "__import__",
];

/// Scans the leading bytes of an already classified file.
///
/// # Errors
///
/// Returns the first [`ContentThreat`] found.
pub fn scan_content(
    filename: &str,
    category: Category,
    prefix: &[u8],
) -> Result<(), ContentThreat> {
    let lower = prefix.to_ascii_lowercase();
    match category {
        Category::Image => scan_image(filename, prefix, &lower),
        Category::Document => find_marker(&lower, &MACRO_MARKERS)
            .map_or(Ok(()), |marker| Err(ContentThreat::MacroMarker { marker })),
        Category::Code => find_call(&lower)
            .map_or(Ok(()), |pattern| Err(ContentThreat::DangerousCall { pattern })),
        Category::Archive | Category::Audio | Category::Video => Ok(()),
    }
}

fn scan_image(filename: &str, prefix: &[u8], lower: &[u8]) -> Result<(), ContentThreat> {
    if prefix.starts_with(b"MZ") || contains(lower, DOS_STUB) {
        return Err(ContentThreat::EmbeddedExecutable);
    }
    if extension_of(filename).as_deref() == Some("svg")
        && let Some(marker) = find_marker(lower, &SVG_MARKERS)
    {
        return Err(ContentThreat::ActiveContent { marker });
    }
    Ok(())
}

fn find_marker(lower: &[u8], markers: &[&'static str]) -> Option<&'static str> {
    markers
        .iter()
        .copied()
        .find(|marker| contains(lower, marker.as_bytes()))
}

/// Finds a dangerous function name followed by optional whitespace and `(`.
fn find_call(lower: &[u8]) -> Option<&'static str> {
    DANGEROUS_CALLS.iter().copied().find(|name| {
        let needle = name.as_bytes();
        lower
            .windows(needle.len())
            .enumerate()
            .filter(|(_, window)| *window == needle)
            .any(|(start, _)| {
                lower[start + needle.len()..]
                    .iter()
                    .find(|b| !b.is_ascii_whitespace())
                    == Some(&b'(')
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_image() {
        let png = b"\x89PNG\r\n\x1a\n\x00\x00\x00\rIHDR";
        assert_eq!(scan_content("logo.png", Category::Image, png), Ok(()));
    }

    #[test]
    fn test_pe_header_in_image() {
        assert_eq!(
            scan_content("cat.jpg", Category::Image, b"MZ\x90\x00"),
            Err(ContentThreat::EmbeddedExecutable)
        );
    }

    #[test]
    fn test_dos_stub_inside_image() {
        let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0];
        jpeg.extend_from_slice(b"....This program cannot be run in DOS mode.");
        assert_eq!(
            scan_content("cat.jpg", Category::Image, &jpeg),
            Err(ContentThreat::EmbeddedExecutable)
        );
    }

    #[test]
    fn test_svg_script() {
        let svg = b"<svg><SCRIPT>alert(1)</SCRIPT></svg>";
        assert_eq!(
            scan_content("icon.svg", Category::Image, svg),
            Err(ContentThreat::ActiveContent { marker: "<script" })
        );
        let svg = b"<svg><a href='JavaScript:alert(1)'/></svg>";
        assert_eq!(
            scan_content("icon.SVG", Category::Image, svg),
            Err(ContentThreat::ActiveContent {
                marker: "javascript:"
            })
        );
    }

    #[test]
    fn test_script_marker_ignored_outside_svg() {
        assert_eq!(scan_content("a.png", Category::Image, b"<script>"), Ok(()));
    }

    #[test]
    fn test_document_macro() {
        assert_eq!(
            scan_content("q3.doc", Category::Document, b"...Attribute VB_Name... AutoOpen"),
            Err(ContentThreat::MacroMarker { marker: "autoopen" })
        );
        assert_eq!(
            scan_content("notes.txt", Category::Document, b"quarterly figures"),
            Ok(())
        );
    }

    #[test]
    fn test_dangerous_calls() {
        let cases: [(&[u8], &str); 4] = [
            (b"x = eval(input())", "eval"),
            (b"EXEC  (code)", "exec"),
            (b"<?php passthru\t($_GET['c']); ?>", "passthru"),
            (b"__import__('os')", "__import__"),
        ];
        for (source, expected) in cases {
            assert_eq!(
                scan_content("x.py", Category::Code, source),
                Err(ContentThreat::DangerousCall { pattern: expected })
            );
        }
    }

    #[test]
    fn test_name_without_call_is_clean() {
        let source = b"// evaluate the system configuration\nconst evaluation = 1;";
        assert_eq!(scan_content("app.js", Category::Code, source), Ok(()));
    }

    #[test]
    fn test_media_not_scanned() {
        assert_eq!(scan_content("a.mp4", Category::Video, b"eval("), Ok(()));
    }
}
