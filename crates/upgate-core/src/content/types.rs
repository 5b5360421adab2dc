//! Allowed-type whitelist and filename classification.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use super::Signature;
use crate::Result;
use crate::UploadError;
use crate::rejection::ClassificationError;

const MIB: u64 = 1024 * 1024;

/// Broad kind of content an upload claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Raster and vector images.
    Image,
    /// Office documents, PDF and plain text.
    Document,
    /// Archive containers.
    Archive,
    /// Source code and markup.
    Code,
    /// Audio files.
    Audio,
    /// Video files.
    Video,
}

impl Category {
    /// All categories.
    pub const ALL: [Self; 6] = [
        Self::Image,
        Self::Document,
        Self::Archive,
        Self::Code,
        Self::Audio,
        Self::Video,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Archive => "archive",
            Self::Code => "code",
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whitelist entry for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRule {
    /// Category the rule describes.
    pub category: Category,
    /// Accepted lowercase filename extensions, without the dot.
    pub extensions: Vec<&'static str>,
    /// Accepted sniffed signatures.
    pub signatures: Vec<Signature>,
    /// Size ceiling for files of this category, if any.
    pub max_size: Option<u64>,
}

/// Mapping from category to accepted extensions and signatures.
///
/// Every extension belongs to exactly one category. Signatures may be shared
/// between categories (an `.xml` file and an `.svg` image may both sniff as
/// XML).
#[derive(Debug, Clone)]
pub struct AllowedTypeTable {
    rules: BTreeMap<Category, TypeRule>,
    by_extension: HashMap<&'static str, Category>,
}

impl Default for AllowedTypeTable {
    fn default() -> Self {
        use Signature as S;

        let rules = [
            TypeRule {
                category: Category::Image,
                extensions: vec!["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg"],
                signatures: vec![S::Jpeg, S::Png, S::Gif, S::Bmp, S::Webp, S::Svg, S::Xml],
                max_size: Some(20 * MIB),
            },
            TypeRule {
                category: Category::Document,
                extensions: vec![
                    "pdf", "txt", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "odt", "ods", "odp",
                ],
                signatures: vec![
                    S::Pdf,
                    S::OleCompound,
                    S::OfficeOpenXml,
                    S::OpenDocument,
                    S::Zip,
                    S::Text,
                    S::Xml,
                ],
                max_size: Some(50 * MIB),
            },
            TypeRule {
                category: Category::Archive,
                extensions: vec!["zip", "tar", "gz", "tgz", "7z", "rar"],
                signatures: vec![
                    S::Zip,
                    S::OfficeOpenXml,
                    S::OpenDocument,
                    S::Gzip,
                    S::Tar,
                    S::SevenZ,
                    S::Rar,
                ],
                max_size: Some(200 * MIB),
            },
            TypeRule {
                category: Category::Code,
                extensions: vec!["py", "js", "html", "css", "json", "xml", "yaml", "yml", "md"],
                signatures: vec![S::Text, S::Script, S::Html, S::Xml, S::Svg],
                max_size: None,
            },
            TypeRule {
                category: Category::Audio,
                extensions: vec!["mp3", "wav", "ogg", "flac", "aac"],
                signatures: vec![S::Mp3, S::Wav, S::Ogg, S::Flac, S::Aac, S::Mp4],
                max_size: Some(100 * MIB),
            },
            TypeRule {
                category: Category::Video,
                extensions: vec!["mp4", "avi", "mkv", "mov", "wmv", "flv"],
                signatures: vec![S::Mp4, S::Avi, S::Matroska, S::Asf, S::Flv],
                max_size: Some(1024 * MIB),
            },
        ];

        let mut by_extension = HashMap::new();
        for rule in &rules {
            for ext in &rule.extensions {
                by_extension.insert(*ext, rule.category);
            }
        }
        Self {
            rules: rules.into_iter().map(|r| (r.category, r)).collect(),
            by_extension,
        }
    }
}

impl AllowedTypeTable {
    /// Builds a table from custom rules.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidPolicy` if an extension is claimed by two
    /// categories, a category appears twice, or an extension is not lowercase.
    ///
    /// # Examples
    ///
    /// ```
    /// use upgate_core::content::{AllowedTypeTable, Category, Signature, TypeRule};
    ///
    /// let table = AllowedTypeTable::new([TypeRule {
    ///     category: Category::Image,
    ///     extensions: vec!["png"],
    ///     signatures: vec![Signature::Png],
    ///     max_size: None,
    /// }])?;
    /// assert_eq!(table.classify("logo.png", Some(Signature::Png)), Ok(Category::Image));
    /// assert!(table.classify("logo.jpg", None).is_err());
    /// # Ok::<(), upgate_core::UploadError>(())
    /// ```
    pub fn new(rules: impl IntoIterator<Item = TypeRule>) -> Result<Self> {
        let mut table = Self {
            rules: BTreeMap::new(),
            by_extension: HashMap::new(),
        };

        for rule in rules {
            for ext in &rule.extensions {
                if ext.is_empty() || ext.chars().any(|c| c.is_ascii_uppercase() || c == '.') {
                    return Err(UploadError::InvalidPolicy {
                        reason: format!("extension '{ext}' must be lowercase without a dot"),
                    });
                }
                if let Some(owner) = table.by_extension.insert(*ext, rule.category) {
                    return Err(UploadError::InvalidPolicy {
                        reason: format!(
                            "extension '{ext}' registered for both {owner} and {}",
                            rule.category
                        ),
                    });
                }
            }
            let category = rule.category;
            if table.rules.insert(category, rule).is_some() {
                return Err(UploadError::InvalidPolicy {
                    reason: format!("category {category} registered twice"),
                });
            }
        }

        Ok(table)
    }

    /// Classifies a filename, cross-checking a sniffed signature if present.
    ///
    /// The category comes from the extension alone. A sniffed signature that
    /// the category does not accept is a type mismatch; a missing signature is
    /// tolerated.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedType` for an unknown extension and `TypeMismatch`
    /// when content and extension disagree.
    pub fn classify(
        &self,
        filename: &str,
        signature: Option<Signature>,
    ) -> std::result::Result<Category, ClassificationError> {
        let category = self
            .category_of(filename)
            .ok_or_else(|| ClassificationError::UnsupportedType {
                name: filename.to_string(),
            })?;

        if let Some(signature) = signature
            && !self.accepts(category, signature)
        {
            return Err(ClassificationError::TypeMismatch {
                name: filename.to_string(),
                category,
                signature,
            });
        }

        Ok(category)
    }

    /// Category implied by a filename's final extension.
    #[must_use]
    pub fn category_of(&self, filename: &str) -> Option<Category> {
        let extension = extension_of(filename)?;
        self.by_extension.get(extension.as_str()).copied()
    }

    /// Returns `true` if `category` accepts `signature`.
    #[must_use]
    pub fn accepts(&self, category: Category, signature: Signature) -> bool {
        self.rules
            .get(&category)
            .is_some_and(|rule| rule.signatures.contains(&signature))
    }

    /// Size ceiling registered for a category.
    #[must_use]
    pub fn max_size(&self, category: Category) -> Option<u64> {
        self.rules.get(&category).and_then(|rule| rule.max_size)
    }

    /// Iterates rules in category order.
    pub fn rules(&self) -> impl Iterator<Item = &TypeRule> {
        self.rules.values()
    }
}

/// Lowercased final extension of the last path component.
pub(crate) fn extension_of(filename: &str) -> Option<String> {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_consistent() {
        let default = AllowedTypeTable::default();
        let rebuilt = AllowedTypeTable::new(default.rules().cloned()).unwrap();
        assert_eq!(rebuilt.by_extension.len(), default.by_extension.len());
        assert_eq!(rebuilt.rules().count(), Category::ALL.len());
    }

    #[test]
    fn test_classify_by_extension() {
        let table = AllowedTypeTable::default();
        assert_eq!(table.classify("photo.JPG", None), Ok(Category::Image));
        assert_eq!(table.classify("notes.txt", Some(Signature::Text)), Ok(Category::Document));
        assert_eq!(table.classify("bundle.tar.gz", Some(Signature::Gzip)), Ok(Category::Archive));
        assert_eq!(table.classify("main.py", Some(Signature::Script)), Ok(Category::Code));
    }

    #[test]
    fn test_unsupported_type() {
        let table = AllowedTypeTable::default();
        for name in ["setup.exe", "README", ".bashrc", "trailing."] {
            assert!(
                matches!(
                    table.classify(name, None),
                    Err(ClassificationError::UnsupportedType { .. })
                ),
                "{name} should be unsupported"
            );
        }
    }

    #[test]
    fn test_executable_renamed_to_image() {
        let table = AllowedTypeTable::default();
        let result = table.classify("cat.jpg", Some(Signature::Executable));
        assert_eq!(
            result,
            Err(ClassificationError::TypeMismatch {
                name: "cat.jpg".into(),
                category: Category::Image,
                signature: Signature::Executable,
            })
        );
    }

    #[test]
    fn test_classify_is_deterministic() {
        let table = AllowedTypeTable::default();
        let first = table.classify("song.mp3", Some(Signature::Pdf));
        let second = table.classify("song.mp3", Some(Signature::Pdf));
        assert_eq!(first, second);
    }

    #[test]
    fn test_duplicate_extension_rejected() {
        let rules = [
            TypeRule {
                category: Category::Image,
                extensions: vec!["png"],
                signatures: vec![Signature::Png],
                max_size: None,
            },
            TypeRule {
                category: Category::Document,
                extensions: vec!["png"],
                signatures: vec![Signature::Pdf],
                max_size: None,
            },
        ];
        assert!(matches!(
            AllowedTypeTable::new(rules),
            Err(UploadError::InvalidPolicy { .. })
        ));
    }

    #[test]
    fn test_uppercase_extension_rejected() {
        let rules = [TypeRule {
            category: Category::Image,
            extensions: vec!["PNG"],
            signatures: vec![Signature::Png],
            max_size: None,
        }];
        assert!(AllowedTypeTable::new(rules).is_err());
    }

    #[test]
    fn test_category_ceilings() {
        let table = AllowedTypeTable::default();
        assert_eq!(table.max_size(Category::Image), Some(20 * MIB));
        assert_eq!(table.max_size(Category::Code), None);
    }

    #[test]
    fn test_extension_of_uses_last_component() {
        assert_eq!(extension_of("dir.v2/file.TXT").as_deref(), Some("txt"));
        assert_eq!(extension_of("dir.v2/file"), None);
    }
}
