//! Magic-number content sniffing.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

const SEVENZ_MAGIC: [u8; 6] = [0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C];
const RAR_MAGIC: [u8; 6] = *b"Rar!\x1a\x07";
const OLE_MAGIC: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];
const ASF_MAGIC: [u8; 8] = [0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11];
const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];
const PNG_MAGIC: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const MACHO_MAGICS: [[u8; 4]; 5] = [
    [0xFE, 0xED, 0xFA, 0xCE],
    [0xFE, 0xED, 0xFA, 0xCF],
    [0xCE, 0xFA, 0xED, 0xFE],
    [0xCF, 0xFA, 0xED, 0xFE],
    [0xCA, 0xFE, 0xBA, 0xBE],
];

const TAR_MAGIC_OFFSET: usize = 257;
const OOXML_MARKER: &[u8] = b"[Content_Types].xml";
const ODF_MARKER: &[u8] = b"mimetypeapplication/vnd.oasis.opendocument";

/// Content type inferred from a file's leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Signature {
    /// JPEG image.
    Jpeg,
    /// PNG image.
    Png,
    /// GIF image.
    Gif,
    /// Windows bitmap.
    Bmp,
    /// WebP image.
    Webp,
    /// SVG vector image.
    Svg,
    /// PDF document.
    Pdf,
    /// OLE compound file (legacy Office formats).
    OleCompound,
    /// Office Open XML package (docx, xlsx, pptx).
    OfficeOpenXml,
    /// OpenDocument package (odt, ods, odp).
    OpenDocument,
    /// Plain ZIP archive.
    Zip,
    /// Gzip stream.
    Gzip,
    /// POSIX tar archive.
    Tar,
    /// 7-Zip archive.
    SevenZ,
    /// RAR archive.
    Rar,
    /// MPEG audio layer III.
    Mp3,
    /// RIFF WAVE audio.
    Wav,
    /// Ogg container.
    Ogg,
    /// FLAC audio.
    Flac,
    /// AAC audio (ADTS or ADIF).
    Aac,
    /// ISO base media file (mp4, mov, m4a).
    Mp4,
    /// RIFF AVI video.
    Avi,
    /// Matroska or WebM container.
    Matroska,
    /// Advanced Systems Format (wmv, wma).
    Asf,
    /// Flash video.
    Flv,
    /// Native executable (PE, ELF or Mach-O).
    Executable,
    /// Interpreter script with a shebang line.
    Script,
    /// HTML document.
    Html,
    /// XML document.
    Xml,
    /// UTF-8 text without NUL bytes.
    Text,
}

impl Signature {
    /// Short stable name, also used for serialization.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Gif => "gif",
            Self::Bmp => "bmp",
            Self::Webp => "webp",
            Self::Svg => "svg",
            Self::Pdf => "pdf",
            Self::OleCompound => "ole-compound",
            Self::OfficeOpenXml => "office-open-xml",
            Self::OpenDocument => "open-document",
            Self::Zip => "zip",
            Self::Gzip => "gzip",
            Self::Tar => "tar",
            Self::SevenZ => "seven-z",
            Self::Rar => "rar",
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Aac => "aac",
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Matroska => "matroska",
            Self::Asf => "asf",
            Self::Flv => "flv",
            Self::Executable => "executable",
            Self::Script => "script",
            Self::Html => "html",
            Self::Xml => "xml",
            Self::Text => "text",
        }
    }

    /// Signatures whose content is human-readable text.
    #[must_use]
    pub const fn is_textual(self) -> bool {
        matches!(
            self,
            Self::Svg | Self::Script | Self::Html | Self::Xml | Self::Text
        )
    }

    /// MIME type conventionally associated with the signature.
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Gif => "image/gif",
            Self::Bmp => "image/bmp",
            Self::Webp => "image/webp",
            Self::Svg => "image/svg+xml",
            Self::Pdf => "application/pdf",
            Self::OleCompound => "application/x-ole-storage",
            Self::OfficeOpenXml => "application/vnd.openxmlformats-officedocument",
            Self::OpenDocument => "application/vnd.oasis.opendocument",
            Self::Zip => "application/zip",
            Self::Gzip => "application/gzip",
            Self::Tar => "application/x-tar",
            Self::SevenZ => "application/x-7z-compressed",
            Self::Rar => "application/vnd.rar",
            Self::Mp3 => "audio/mpeg",
            Self::Wav => "audio/wav",
            Self::Ogg => "application/ogg",
            Self::Flac => "audio/flac",
            Self::Aac => "audio/aac",
            Self::Mp4 => "video/mp4",
            Self::Avi => "video/x-msvideo",
            Self::Matroska => "video/x-matroska",
            Self::Asf => "video/x-ms-asf",
            Self::Flv => "video/x-flv",
            Self::Executable => "application/x-executable",
            Self::Script => "text/x-script",
            Self::Html => "text/html",
            Self::Xml => "application/xml",
            Self::Text => "text/plain",
        }
    }

    /// Returns `true` for content that runs directly when opened.
    #[must_use]
    pub const fn is_executable(self) -> bool {
        matches!(self, Self::Executable | Self::Script)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Infers a content signature from the leading bytes of a file.
///
/// Binary magic numbers are matched first, then markup and text. Returns
/// `None` for empty or unrecognised input.
///
/// # Examples
///
/// ```
/// use upgate_core::content::{sniff, Signature};
///
/// assert_eq!(sniff(b"%PDF-1.7\n"), Some(Signature::Pdf));
/// assert_eq!(sniff(b"MZ\x90\x00"), Some(Signature::Executable));
/// assert_eq!(sniff(b""), None);
/// ```
#[must_use]
pub fn sniff(prefix: &[u8]) -> Option<Signature> {
    if prefix.is_empty() {
        return None;
    }
    sniff_binary(prefix).or_else(|| sniff_markup(prefix))
}

fn sniff_binary(p: &[u8]) -> Option<Signature> {
    // A tar starts with its first member's name, so the offset magic wins
    // over every leading-byte signature.
    let signature = if is_tar(p) {
        Signature::Tar
    } else if p.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Signature::Jpeg
    } else if p.starts_with(&PNG_MAGIC) {
        Signature::Png
    } else if p.starts_with(b"GIF87a") || p.starts_with(b"GIF89a") {
        Signature::Gif
    } else if is_bmp(p) {
        Signature::Bmp
    } else if p.starts_with(b"RIFF") && p.len() >= 12 {
        match &p[8..12] {
            b"WEBP" => Signature::Webp,
            b"WAVE" => Signature::Wav,
            b"AVI " => Signature::Avi,
            _ => return None,
        }
    } else if p.starts_with(b"%PDF-") {
        Signature::Pdf
    } else if p.starts_with(&OLE_MAGIC) {
        Signature::OleCompound
    } else if p.starts_with(b"PK\x03\x04") || p.starts_with(b"PK\x05\x06") {
        zip_flavour(p)
    } else if p.starts_with(&GZIP_MAGIC) {
        Signature::Gzip
    } else if p.starts_with(&SEVENZ_MAGIC) {
        Signature::SevenZ
    } else if p.starts_with(&RAR_MAGIC) {
        Signature::Rar
    } else if p.starts_with(b"OggS") {
        Signature::Ogg
    } else if p.starts_with(b"fLaC") {
        Signature::Flac
    } else if p.starts_with(b"ADIF") || is_adts(p) {
        Signature::Aac
    } else if p.starts_with(b"ID3") || is_mpeg_frame(p) {
        Signature::Mp3
    } else if p.len() >= 8 && &p[4..8] == b"ftyp" {
        Signature::Mp4
    } else if p.starts_with(&EBML_MAGIC) {
        Signature::Matroska
    } else if p.starts_with(&ASF_MAGIC) {
        Signature::Asf
    } else if p.starts_with(b"FLV\x01") {
        Signature::Flv
    } else if p.starts_with(b"MZ")
        || p.starts_with(&ELF_MAGIC)
        || MACHO_MAGICS.iter().any(|m| p.starts_with(m))
    {
        Signature::Executable
    } else if p.starts_with(b"#!") {
        Signature::Script
    } else {
        return None;
    };
    Some(signature)
}

fn is_tar(p: &[u8]) -> bool {
    p.len() > TAR_MAGIC_OFFSET + 5 && &p[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
}

/// BMP headers carry two reserved zero words after the file size.
fn is_bmp(p: &[u8]) -> bool {
    p.len() >= 14 && p.starts_with(b"BM") && p[6..10] == [0, 0, 0, 0]
}

/// ADTS sync word with layer bits `00`.
fn is_adts(p: &[u8]) -> bool {
    p.len() >= 2 && p[0] == 0xFF && p[1] & 0xF6 == 0xF0
}

/// MPEG audio frame sync with a non-reserved layer.
fn is_mpeg_frame(p: &[u8]) -> bool {
    p.len() >= 2 && p[0] == 0xFF && p[1] & 0xE0 == 0xE0 && p[1] & 0x06 != 0
}

fn zip_flavour(p: &[u8]) -> Signature {
    if contains(p, OOXML_MARKER) {
        Signature::OfficeOpenXml
    } else if contains(p, ODF_MARKER) {
        Signature::OpenDocument
    } else {
        Signature::Zip
    }
}

fn sniff_markup(p: &[u8]) -> Option<Signature> {
    let text = utf8_prefix(p)?;
    if text.contains('\0') {
        return None;
    }

    let head: String = text
        .trim_start_matches('\u{feff}')
        .trim_start()
        .chars()
        .take(512)
        .collect::<String>()
        .to_ascii_lowercase();

    let signature = if head.starts_with("<svg") {
        Signature::Svg
    } else if head.starts_with("<!doctype html") || head.starts_with("<html") {
        Signature::Html
    } else if head.starts_with("<?xml") {
        if head.contains("<svg") {
            Signature::Svg
        } else {
            Signature::Xml
        }
    } else {
        Signature::Text
    };
    Some(signature)
}

/// Decodes the prefix as UTF-8, tolerating a code point cut off at the end.
fn utf8_prefix(p: &[u8]) -> Option<&str> {
    match std::str::from_utf8(p) {
        Ok(text) => Some(text),
        Err(e) if e.error_len().is_none() => std::str::from_utf8(&p[..e.valid_up_to()]).ok(),
        Err(_) => None,
    }
}

pub(crate) fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_signatures() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]), Some(Signature::Jpeg));
        assert_eq!(sniff(&PNG_MAGIC), Some(Signature::Png));
        assert_eq!(sniff(b"GIF89a\x01\x00"), Some(Signature::Gif));
        assert_eq!(sniff(b"RIFF\x24\x00\x00\x00WEBPVP8 "), Some(Signature::Webp));
        assert_eq!(
            sniff(b"BM\x36\x00\x0c\x00\x00\x00\x00\x00\x36\x00\x00\x00"),
            Some(Signature::Bmp)
        );
    }

    #[test]
    fn test_bm_text_is_not_bitmap() {
        assert_eq!(sniff(b"BMW service notes\n"), Some(Signature::Text));
    }

    #[test]
    fn test_executables() {
        assert_eq!(sniff(b"MZ\x90\x00\x03"), Some(Signature::Executable));
        assert_eq!(sniff(b"\x7fELF\x02\x01\x01"), Some(Signature::Executable));
        assert_eq!(sniff(&[0xCF, 0xFA, 0xED, 0xFE, 7]), Some(Signature::Executable));
        assert_eq!(sniff(b"#!/bin/sh\necho hi\n"), Some(Signature::Script));
        assert!(Signature::Script.is_executable());
        assert!(!Signature::Text.is_executable());
    }

    #[test]
    fn test_zip_flavours() {
        let mut docx = b"PK\x03\x04\x14\x00\x06\x00".to_vec();
        docx.extend_from_slice(b"....[Content_Types].xml");
        assert_eq!(sniff(&docx), Some(Signature::OfficeOpenXml));

        let mut odt = b"PK\x03\x04\x0a\x00\x00\x00".to_vec();
        odt.extend_from_slice(b"mimetypeapplication/vnd.oasis.opendocument.text");
        assert_eq!(sniff(&odt), Some(Signature::OpenDocument));

        assert_eq!(sniff(b"PK\x03\x04\x14\x00hello.txt"), Some(Signature::Zip));
        assert_eq!(sniff(b"PK\x05\x06\x00\x00"), Some(Signature::Zip));
    }

    #[test]
    fn test_tar_magic_at_offset() {
        let mut header = vec![0u8; 512];
        header[..8].copy_from_slice(b"file.txt");
        header[257..262].copy_from_slice(b"ustar");
        assert_eq!(sniff(&header), Some(Signature::Tar));
    }

    #[test]
    fn test_tar_magic_beats_member_name() {
        let names: [&[u8]; 5] = [
            b"MZ.txt",
            b"BM\0\0\0\0\0\0\0\0.bin",
            b"ID3.txt",
            b"#!run.sh",
            b"OggS.txt",
        ];
        for name in names {
            let mut header = vec![0u8; 512];
            header[..name.len()].copy_from_slice(name);
            header[257..262].copy_from_slice(b"ustar");
            assert_eq!(
                sniff(&header),
                Some(Signature::Tar),
                "{}",
                String::from_utf8_lossy(name)
            );
        }
    }

    #[test]
    fn test_audio_video() {
        assert_eq!(sniff(b"ID3\x04\x00"), Some(Signature::Mp3));
        assert_eq!(sniff(&[0xFF, 0xFB, 0x90, 0x00]), Some(Signature::Mp3));
        assert_eq!(sniff(&[0xFF, 0xF1, 0x50, 0x80]), Some(Signature::Aac));
        assert_eq!(sniff(b"\x00\x00\x00\x18ftypmp42"), Some(Signature::Mp4));
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00AVI LIST"), Some(Signature::Avi));
        assert_eq!(sniff(b"fLaC\x00\x00"), Some(Signature::Flac));
        assert_eq!(sniff(&EBML_MAGIC), Some(Signature::Matroska));
    }

    #[test]
    fn test_markup() {
        assert_eq!(sniff(b"<svg xmlns='http://www.w3.org/2000/svg'/>"), Some(Signature::Svg));
        assert_eq!(
            sniff(b"<?xml version=\"1.0\"?>\n<svg width=\"10\"></svg>"),
            Some(Signature::Svg)
        );
        assert_eq!(sniff(b"<?xml version=\"1.0\"?><root/>"), Some(Signature::Xml));
        assert_eq!(sniff(b"  <!DOCTYPE html><html></html>"), Some(Signature::Html));
        assert_eq!(sniff(b"{\"key\": 1}"), Some(Signature::Text));
    }

    #[test]
    fn test_truncated_utf8_is_text() {
        let mut prefix = "gr\u{fc}\u{df}e ".as_bytes().to_vec();
        prefix.extend_from_slice(&"\u{20ac}".as_bytes()[..2]);
        assert_eq!(sniff(&prefix), Some(Signature::Text));
    }

    #[test]
    fn test_unrecognised_binary() {
        assert_eq!(sniff(&[0x00, 0x01, 0x02, 0xFE]), None);
        assert_eq!(sniff(b"plain\0text"), None);
        assert_eq!(sniff(b""), None);
    }

    #[test]
    fn test_signature_display() {
        assert_eq!(Signature::OfficeOpenXml.to_string(), "office-open-xml");
        assert_eq!(Signature::Pdf.mime(), "application/pdf");
    }
}
