//! Container readers.
//!
//! Each reader turns a container into a stream of [`ArchiveEntryMeta`] using
//! only the format's directory or headers. Zip and 7z expose a central
//! directory, so nothing is decompressed. Tarballs have no central directory:
//! a gzip-wrapped tar is decompressed header by header, and the walk ends as
//! soon as the running declared total passes `max_extracted_size`, which
//! bounds the work an attacker can force.

use std::fmt;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use flate2::read::GzDecoder;
use sevenz_rust2::Archive as SevenZArchive;
use sevenz_rust2::Password;
use tracing::debug;

use super::inspect::ArchiveEntryMeta;
use super::inspect::ArchiveSummary;
use super::inspect::check_aggregate_ratio;
use super::inspect::inspect_entries;
use crate::UploadPolicy;
use crate::content::Signature;
use crate::content::extension_of;
use crate::rejection::ArchiveRejection;

const TAR_BLOCK: u64 = 512;
const TAR_MAGIC_OFFSET: usize = 257;
/// Minimum size of a gzip member: 10-byte header plus 8-byte trailer.
const GZIP_MIN_LEN: u64 = 18;

/// Container formats the inspector distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// ZIP, including Office Open XML and OpenDocument packages.
    Zip,
    /// Uncompressed tar.
    Tar,
    /// Gzip-compressed tar.
    TarGz,
    /// Single gzip-compressed file.
    Gzip,
    /// 7-Zip.
    SevenZ,
    /// RAR. Recognised but not introspectable.
    Rar,
}

impl ContainerFormat {
    /// Decides the container format from the sniffed signature, falling back
    /// to the filename's extension.
    ///
    /// A gzip stream counts as a tarball when the name says so or when its
    /// first decompressed block carries the `ustar` magic.
    #[must_use]
    pub fn detect(filename: &str, signature: Option<Signature>, prefix: &[u8]) -> Option<Self> {
        let lower = filename.to_ascii_lowercase();
        let tar_named = lower.ends_with(".tar.gz") || lower.ends_with(".tgz");

        let by_signature = match signature {
            Some(Signature::Zip | Signature::OfficeOpenXml | Signature::OpenDocument) => {
                Some(Self::Zip)
            }
            Some(Signature::Tar) => Some(Self::Tar),
            Some(Signature::Gzip) if tar_named || gzip_wraps_tar(prefix) => Some(Self::TarGz),
            Some(Signature::Gzip) => Some(Self::Gzip),
            Some(Signature::SevenZ) => Some(Self::SevenZ),
            Some(Signature::Rar) => Some(Self::Rar),
            _ => None,
        };

        by_signature.or_else(|| {
            if tar_named {
                return Some(Self::TarGz);
            }
            match extension_of(filename)?.as_str() {
                "zip" => Some(Self::Zip),
                "tar" => Some(Self::Tar),
                "gz" => Some(Self::Gzip),
                "7z" => Some(Self::SevenZ),
                "rar" => Some(Self::Rar),
                _ => None,
            }
        })
    }

    /// Short lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::Gzip => "gzip",
            Self::SevenZ => "7z",
            Self::Rar => "rar",
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn gzip_wraps_tar(prefix: &[u8]) -> bool {
    let mut head = Vec::with_capacity(TAR_BLOCK as usize);
    // A short read leaves whatever was decoded in `head`.
    let _ = GzDecoder::new(prefix).take(TAR_BLOCK).read_to_end(&mut head);
    head.len() > TAR_MAGIC_OFFSET + 5 && &head[TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5] == b"ustar"
}

/// Inspects an opened container.
///
/// `name` labels aggregate findings; `container_size` is the size of the
/// container on disk and feeds the aggregate ratio check of formats whose
/// entries carry no compressed size.
///
/// # Errors
///
/// Returns `UnsupportedContainer` for RAR, `Corrupt` when the container
/// cannot be parsed, and any rejection raised by [`inspect_entries`].
pub fn inspect_archive<R: Read + Seek>(
    mut reader: R,
    format: ContainerFormat,
    name: &str,
    container_size: u64,
    policy: &UploadPolicy,
) -> Result<ArchiveSummary, ArchiveRejection> {
    debug!(name, %format, container_size, "inspecting archive");
    match format {
        ContainerFormat::Zip => inspect_zip(reader, policy),
        ContainerFormat::Tar => inspect_tar(reader, format, policy),
        ContainerFormat::TarGz => {
            let summary = inspect_tar(GzDecoder::new(reader), format, policy)?;
            check_aggregate_ratio(name, &summary, container_size, policy)?;
            Ok(summary)
        }
        ContainerFormat::Gzip => {
            let entry = gzip_entry(&mut reader, name, container_size);
            inspect_entries(Some(1), [entry], policy)
        }
        ContainerFormat::SevenZ => {
            let entries = sevenz_entries(&mut reader)?;
            let count = entries.len();
            let summary = inspect_entries(Some(count), entries.into_iter().map(Ok), policy)?;
            check_aggregate_ratio(name, &summary, container_size, policy)?;
            Ok(summary)
        }
        ContainerFormat::Rar => Err(ArchiveRejection::UnsupportedContainer {
            format: format.to_string(),
        }),
    }
}

fn corrupt(format: ContainerFormat) -> impl Fn(String) -> ArchiveRejection {
    move |reason| ArchiveRejection::Corrupt(format!("{format}: {reason}"))
}

fn inspect_zip<R: Read + Seek>(
    reader: R,
    policy: &UploadPolicy,
) -> Result<ArchiveSummary, ArchiveRejection> {
    let corrupt = corrupt(ContainerFormat::Zip);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| corrupt(e.to_string()))?;
    let count = archive.len();

    let entries = (0..count).map(move |i| {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| ArchiveRejection::Corrupt(format!("zip entry {i}: {e}")))?;
        Ok(ArchiveEntryMeta::new(
            entry.name(),
            entry.size(),
            entry.compressed_size(),
        ))
    });

    inspect_entries(Some(count), entries, policy)
}

/// Walks tar headers. Entry payloads are skipped, never buffered.
///
/// `format` is the outer container, used to label parse failures.
fn inspect_tar<R: Read>(
    reader: R,
    format: ContainerFormat,
    policy: &UploadPolicy,
) -> Result<ArchiveSummary, ArchiveRejection> {
    let corrupt = corrupt(format);
    let mut archive = tar::Archive::new(reader);
    let entries = archive.entries().map_err(|e| corrupt(e.to_string()))?;

    let metas = entries.map(|entry| {
        let entry = entry.map_err(|e| corrupt(e.to_string()))?;
        Ok(ArchiveEntryMeta {
            name: String::from_utf8_lossy(&entry.path_bytes()).into_owned(),
            declared_size: entry.size(),
            compressed_size: 0,
            link_target: entry
                .link_name_bytes()
                .map(|target| String::from_utf8_lossy(&target).into_owned()),
        })
    });

    inspect_entries(None, metas, policy)
}

/// Builds the single entry of a bare gzip stream from its `ISIZE` trailer.
fn gzip_entry<R: Read + Seek>(
    reader: &mut R,
    name: &str,
    container_size: u64,
) -> Result<ArchiveEntryMeta, ArchiveRejection> {
    let corrupt = corrupt(ContainerFormat::Gzip);
    if container_size < GZIP_MIN_LEN {
        return Err(corrupt("stream shorter than a gzip member".into()));
    }

    let mut trailer = [0u8; 4];
    reader
        .seek(SeekFrom::End(-4))
        .and_then(|_| reader.read_exact(&mut trailer))
        .map_err(|e| corrupt(e.to_string()))?;
    let declared_size = u64::from(u32::from_le_bytes(trailer));

    let stem = name
        .rsplit(['/', '\\'])
        .next()
        .and_then(|base| base.rsplit_once('.').map(|(stem, _)| stem))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(name);

    Ok(ArchiveEntryMeta::new(stem, declared_size, container_size))
}

fn sevenz_entries<R: Read + Seek>(
    reader: &mut R,
) -> Result<Vec<ArchiveEntryMeta>, ArchiveRejection> {
    let archive = SevenZArchive::read(reader, &Password::empty())
        .map_err(|e| corrupt(ContainerFormat::SevenZ)(e.to_string()))?;
    Ok(archive
        .files
        .iter()
        .map(|file| ArchiveEntryMeta::new(file.name.clone(), file.size, 0))
        .collect())
}
