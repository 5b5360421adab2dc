//! Validation pipeline.
//!
//! A [`Validator`] is bound to one tier's policy and runs, in order:
//!
//! 1. `rate_limiting` (only when an identity is given)
//! 2. `filename`
//! 3. `file_size`
//! 4. `content_scan`
//! 5. `archive_contents` (archive targets only)
//!
//! In [`ValidationMode::FailFast`] the pipeline stops at the first failed
//! check, so the report only holds the checks that ran. In
//! [`ValidationMode::Detailed`] every check runs and every failure is
//! recorded with a recommendation.

use std::fs;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::PolicyRegistry;
use crate::Rejection;
use crate::Result;
use crate::Tier;
use crate::UploadPolicy;
use crate::archive::ContainerFormat;
use crate::archive::inspect_archive;
use crate::content::AllowedTypeTable;
use crate::content::Category;
use crate::content::Signature;
use crate::content::extension_of;
use crate::content::read_prefix;
use crate::content::scan_content;
use crate::content::sniff;
use crate::details::FileDetails;
use crate::rejection::ArchiveRejection;
use crate::rejection::SizeExceeded;
use crate::report::CheckKind;
use crate::report::ValidationReport;
use crate::security::RateCeilings;
use crate::security::RateLimiter;
use crate::security::check_name;

/// Closing advice attached to safe verdicts in detailed mode.
const SAFE_RECOMMENDATIONS: [&str; 2] = [
    "File is safe to publish",
    "Make sure the file contains no sensitive data",
];

/// How much work a validation does after the first failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationMode {
    /// Stop at the first failed check.
    #[default]
    FailFast,
    /// Run every check and attach recommendations.
    Detailed,
}

/// Pipeline bound to one tier.
///
/// Validators are cheap to clone; clones share the rate limiter.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use upgate_core::{RateLimiter, Tier, ValidationMode, Validator};
///
/// let limiter = Arc::new(RateLimiter::default());
/// let validator = Validator::for_tier(Tier::Basic, limiter).with_mode(ValidationMode::Detailed);
/// let report = validator.validate("upload/photo.jpg", Some("alice"))?;
/// if !report.is_safe {
///     eprintln!("rejected: {}", report.summary());
/// }
/// # Ok::<(), upgate_core::UploadError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Validator {
    tier: Tier,
    policy: UploadPolicy,
    types: Arc<AllowedTypeTable>,
    limiter: Arc<RateLimiter>,
    mode: ValidationMode,
}

/// Which targets get archive inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveHandling {
    /// Only files whose extension names an archive.
    ByExtension,
    /// Always.
    Required,
}

impl Validator {
    /// Creates a fail-fast validator for a tier's seeded policy.
    #[must_use]
    pub fn for_tier(tier: Tier, limiter: Arc<RateLimiter>) -> Self {
        Self::new(tier, UploadPolicy::for_tier(tier), limiter)
    }

    /// Creates a fail-fast validator for a tier of a registry.
    #[must_use]
    pub fn from_registry(registry: &PolicyRegistry, tier: Tier, limiter: Arc<RateLimiter>) -> Self {
        Self::new(tier, *registry.policy_for(tier), limiter)
    }

    /// Creates a fail-fast validator with an explicit policy.
    #[must_use]
    pub fn new(tier: Tier, policy: UploadPolicy, limiter: Arc<RateLimiter>) -> Self {
        Self {
            tier,
            policy,
            types: Arc::new(AllowedTypeTable::default()),
            limiter,
            mode: ValidationMode::FailFast,
        }
    }

    /// Sets the validation mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replaces the allowed-type table.
    #[must_use]
    pub fn with_types(mut self, types: AllowedTypeTable) -> Self {
        self.types = Arc::new(types);
        self
    }

    /// Tier this validator applies.
    #[must_use]
    pub const fn tier(&self) -> Tier {
        self.tier
    }

    /// Policy this validator applies.
    #[must_use]
    pub const fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Current validation mode.
    #[must_use]
    pub const fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Validates a file, archive or directory, dispatching on the target.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the path does not exist or cannot be read.
    pub fn validate(
        &self,
        path: impl AsRef<Path>,
        identity: Option<&str>,
    ) -> Result<ValidationReport> {
        let path = path.as_ref();
        if fs::metadata(path)?.is_dir() {
            return self.validate_directory(path, identity);
        }
        let name = file_name(path);
        if self.types.category_of(&name) == Some(Category::Archive) {
            self.validate_archive(path, identity)
        } else {
            self.validate_file(path, identity)
        }
    }

    /// Validates a single file. Files with an archive extension also get
    /// their entry directory inspected.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file cannot be read.
    pub fn validate_file(
        &self,
        path: impl AsRef<Path>,
        identity: Option<&str>,
    ) -> Result<ValidationReport> {
        let path = path.as_ref();
        self.validate_single(path, &file_name(path), identity, ArchiveHandling::ByExtension)
    }

    /// Validates an archive, inspecting its entry directory regardless of
    /// extension.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the file cannot be read.
    pub fn validate_archive(
        &self,
        path: impl AsRef<Path>,
        identity: Option<&str>,
    ) -> Result<ValidationReport> {
        let path = path.as_ref();
        self.validate_single(path, &file_name(path), identity, ArchiveHandling::Required)
    }

    /// Validates every regular file below a directory.
    ///
    /// The identity is admitted once for the whole directory. Files are
    /// visited in name order without following symbolic links; links are
    /// reported as warnings and skipped. Each file is recorded as a
    /// `file:<relative path>` check.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::Io` if the path is not a readable directory.
    pub fn validate_directory(
        &self,
        path: impl AsRef<Path>,
        identity: Option<&str>,
    ) -> Result<ValidationReport> {
        let root = path.as_ref();
        if !fs::metadata(root)?.is_dir() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a directory: {}", root.display()),
            )
            .into());
        }

        let mut report = ValidationReport::new(root, 0, self.tier, identity);
        if let Some(identity) = identity
            && !self.admit(&mut report, identity)
            && self.mode == ValidationMode::FailFast
        {
            return Ok(self.finish(report));
        }

        let mut files = 0usize;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .min_depth(1)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            let relative = relative_name(root, entry.path());

            if entry.path_is_symlink() {
                warn!(path = %relative, "symbolic link skipped");
                report.warn(format!("symbolic link skipped: {relative}"));
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }

            files += 1;
            let file =
                self.validate_single(entry.path(), &relative, None, ArchiveHandling::ByExtension)?;
            report.file_size += file.file_size;
            report.warnings.extend(file.warnings.iter().map(|w| format!("{relative}: {w}")));

            let key = format!("file:{relative}");
            if file.is_safe {
                report.pass_as(key, CheckKind::DirectoryEntry, file.summary());
                continue;
            }

            report.fail_as(
                key,
                CheckKind::DirectoryEntry,
                file.risk_level,
                format!("{relative}: {}", file.summary()),
            );
            if self.mode == ValidationMode::FailFast {
                break;
            }
            for recommendation in file.recommendations {
                report.recommend(recommendation);
            }
        }

        if files == 0 {
            report.warn("directory contains no regular files");
        }
        Ok(self.finish(report))
    }

    /// Runs the single-target pipeline.
    ///
    /// `name` is what the name rules and the classifier see: the file name
    /// for direct uploads, the relative path for directory members.
    fn validate_single(
        &self,
        path: &Path,
        name: &str,
        identity: Option<&str>,
        archives: ArchiveHandling,
    ) -> Result<ValidationReport> {
        let metadata = fs::metadata(path)?;
        let file_size = metadata.len();
        let mut report = ValidationReport::new(path, file_size, self.tier, identity);
        let fail_fast = self.mode == ValidationMode::FailFast;

        if let Some(identity) = identity
            && !self.admit(&mut report, identity)
            && fail_fast
        {
            return Ok(self.finish(report));
        }

        let claimed = self.types.category_of(name);
        let is_archive =
            archives == ArchiveHandling::Required || claimed == Some(Category::Archive);

        let passed = self.check_filename(&mut report, name);
        if !passed && fail_fast {
            return Ok(self.finish(report));
        }

        let passed = self.check_size(&mut report, file_size, is_archive);
        if !passed && fail_fast {
            return Ok(self.finish(report));
        }

        let prefix = read_prefix(path)?;
        let signature = sniff(&prefix);
        if signature.is_none() {
            report.warn("content type could not be determined from file content");
        }
        if !fail_fast {
            let details = FileDetails::collect(name, &metadata, signature, &prefix);
            for warning in &details.hosting.warnings {
                report.warn(warning.clone());
            }
            report.details = Some(details);
        }

        let passed = self.check_content(&mut report, name, file_size, signature, &prefix);
        if !passed && fail_fast {
            return Ok(self.finish(report));
        }

        if is_archive {
            self.check_archive(&mut report, path, name, file_size, signature, &prefix)?;
        }

        Ok(self.finish(report))
    }

    fn admit(&self, report: &mut ValidationReport, identity: &str) -> bool {
        // The tier's ceilings, not the limiter's fallback.
        match self
            .limiter
            .admit_with(identity, RateCeilings::from(&self.policy))
        {
            Ok(()) => {
                report.pass(CheckKind::RateLimiting, format!("upload admitted for {identity}"));
                true
            }
            Err(limited) => {
                self.reject(report, CheckKind::RateLimiting, limited.into());
                false
            }
        }
    }

    fn check_filename(&self, report: &mut ValidationReport, name: &str) -> bool {
        match check_name(name) {
            Ok(()) => {
                report.pass(CheckKind::Filename, "filename is safe");
                true
            }
            Err(rejection) => {
                self.reject(report, CheckKind::Filename, rejection.into());
                false
            }
        }
    }

    fn check_size(&self, report: &mut ValidationReport, size: u64, is_archive: bool) -> bool {
        let exceeded = if is_archive {
            (size > self.policy.max_archive_size).then_some(SizeExceeded::Archive {
                size,
                max: self.policy.max_archive_size,
            })
        } else {
            (size > self.policy.max_file_size).then_some(SizeExceeded::File {
                size,
                max: self.policy.max_file_size,
            })
        };

        match exceeded {
            None => {
                let max = if is_archive {
                    self.policy.max_archive_size
                } else {
                    self.policy.max_file_size
                };
                report.pass(CheckKind::FileSize, format!("{size} bytes (max {max})"));
                true
            }
            Some(limit) => {
                self.reject(report, CheckKind::FileSize, limit.into());
                false
            }
        }
    }

    fn check_content(
        &self,
        report: &mut ValidationReport,
        name: &str,
        size: u64,
        signature: Option<Signature>,
        prefix: &[u8],
    ) -> bool {
        let category = match self.types.classify(name, signature) {
            Ok(category) => category,
            Err(rejection) => {
                self.reject(report, CheckKind::ContentScan, rejection.into());
                return false;
            }
        };
        report.category = Some(category);

        if let Some(max) = self.types.max_size(category)
            && size > max
        {
            let limit = SizeExceeded::Category {
                category,
                size,
                max,
            };
            self.reject(report, CheckKind::ContentScan, limit.into());
            return false;
        }

        if let Err(threat) = scan_content(name, category, prefix) {
            self.reject(report, CheckKind::ContentScan, threat.into());
            return false;
        }

        let detected = signature.map_or("unknown", Signature::as_str);
        report.pass(
            CheckKind::ContentScan,
            format!("{category} content ({detected})"),
        );
        true
    }

    fn check_archive(
        &self,
        report: &mut ValidationReport,
        path: &Path,
        name: &str,
        container_size: u64,
        signature: Option<Signature>,
        prefix: &[u8],
    ) -> Result<()> {
        let Some(format) = ContainerFormat::detect(name, signature, prefix) else {
            let format = extension_of(name).unwrap_or_else(|| "unknown".to_string());
            self.reject(
                report,
                CheckKind::ArchiveContents,
                ArchiveRejection::UnsupportedContainer { format }.into(),
            );
            return Ok(());
        };

        let reader = BufReader::new(File::open(path)?);
        match inspect_archive(reader, format, name, container_size, &self.policy) {
            Ok(summary) => {
                report.pass(
                    CheckKind::ArchiveContents,
                    format!(
                        "{format} archive with {} entries ({} bytes declared)",
                        summary.entry_count, summary.total_declared_size
                    ),
                );
                report.archive = Some(summary);
            }
            Err(rejection) => self.reject(report, CheckKind::ArchiveContents, rejection.into()),
        }
        Ok(())
    }

    fn reject(&self, report: &mut ValidationReport, kind: CheckKind, rejection: Rejection) {
        warn!(
            identity = report.identity.as_deref().unwrap_or("-"),
            filename = %report.filename,
            check = kind.key(),
            reason = %rejection,
            "upload rejected"
        );
        report.fail(kind, &rejection);
        if self.mode == ValidationMode::Detailed {
            report.recommend(rejection.recommendation());
        }
    }

    fn finish(&self, mut report: ValidationReport) -> ValidationReport {
        for (name, check) in &report.checks {
            debug!(
                check = %name,
                passed = check.passed,
                message = %check.message,
                "check finished"
            );
        }
        if self.mode == ValidationMode::Detailed && report.is_safe {
            for recommendation in SAFE_RECOMMENDATIONS {
                report.recommend(recommendation);
            }
        }
        info!(
            filename = %report.filename,
            tier = %self.tier,
            safe = report.is_safe,
            risk = %report.risk_level,
            score = report.security_score,
            "validation finished"
        );
        report
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
        .into_owned()
}

/// Relative path with `/` separators.
fn relative_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::RiskLevel;
    use crate::test_utils::PNG;
    use crate::test_utils::gzip_bytes;
    use crate::test_utils::tar_bytes;
    use crate::test_utils::write_file;
    use crate::test_utils::zip_bytes;
    use tempfile::TempDir;

    fn validator(mode: ValidationMode) -> Validator {
        Validator::for_tier(Tier::Basic, Arc::new(RateLimiter::default())).with_mode(mode)
    }

    #[test]
    fn test_clean_text_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.txt", b"quarterly figures\n");

        let report = validator(ValidationMode::FailFast)
            .validate_file(&path, None)
            .unwrap();
        assert!(report.is_safe);
        assert_eq!(report.category, Some(Category::Document));
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(!report.checks.contains_key("rate_limiting"));
        assert_eq!(report.checks.len(), 3);
    }

    #[test]
    fn test_disguised_executable_is_critical() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "cat.jpg", b"MZ\x90\x00\x03\x00\x00\x00");

        let report = validator(ValidationMode::Detailed)
            .validate_file(&path, None)
            .unwrap();
        assert!(!report.is_safe);
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert!(!report.checks["content_scan"].passed);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn test_fail_fast_stops_at_first_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "backdoor.txt", b"hello");

        let report = validator(ValidationMode::FailFast)
            .validate_file(&path, None)
            .unwrap();
        assert!(!report.is_safe);
        assert_eq!(report.checks.len(), 1);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_detailed_collects_every_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "backdoor.jpg", b"MZ\x90\x00");

        let report = validator(ValidationMode::Detailed)
            .validate_file(&path, None)
            .unwrap();
        assert_eq!(report.checks.len(), 3);
        assert_eq!(report.failed_checks(), 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.risk_level, RiskLevel::Critical);
    }

    #[test]
    fn test_safe_detailed_report_has_closing_recommendations() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "logo.png", PNG);

        let report = validator(ValidationMode::Detailed)
            .validate_file(&path, None)
            .unwrap();
        assert!(report.is_safe);
        assert_eq!(report.recommendations.len(), SAFE_RECOMMENDATIONS.len());
    }

    #[test]
    fn test_unknown_signature_warns() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "clip.mp4", &[0u8, 1, 2, 3, 0xFE]);

        let report = validator(ValidationMode::FailFast)
            .validate_file(&path, None)
            .unwrap();
        assert!(report.is_safe);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_detailed_report_carries_file_details() {
        let dir = TempDir::new().unwrap();
        let notes = write_file(dir.path(), "notes.txt", b"quarterly figures\n");
        let logo = write_file(dir.path(), "logo.png", PNG);

        let report = validator(ValidationMode::Detailed)
            .validate_file(&notes, None)
            .unwrap();
        let details = report.details.unwrap();
        assert_eq!(details.extension.as_deref(), Some("txt"));
        assert_eq!(details.size_human, "18.0 B");
        assert!(!details.is_binary);
        assert!(details.modified.is_some());
        assert!(details.hosting.compatible);

        let report = validator(ValidationMode::Detailed)
            .validate_file(&logo, None)
            .unwrap();
        assert!(report.details.unwrap().is_binary);
    }

    #[test]
    fn test_fail_fast_skips_file_details() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.txt", b"hi");

        let report = validator(ValidationMode::FailFast)
            .validate_file(&path, None)
            .unwrap();
        assert!(report.details.is_none());
    }

    #[test]
    fn test_rate_limit_recorded_and_terminal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.txt", b"hi");
        let limiter = Arc::new(RateLimiter::default());
        let policy = UploadPolicy {
            max_uploads_per_hour: 1,
            ..UploadPolicy::for_tier(Tier::Basic)
        };
        let validator = Validator::new(Tier::Basic, policy, limiter);

        assert!(validator.validate_file(&path, Some("alice")).unwrap().is_safe);
        let report = validator.validate_file(&path, Some("alice")).unwrap();
        assert!(!report.is_safe);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_zip_archive_inspected() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            dir.path(),
            "bundle.zip",
            &zip_bytes(&[("a.txt", b"alpha"), ("b.txt", b"beta")]),
        );

        let report = validator(ValidationMode::FailFast).validate(&path, None).unwrap();
        assert!(report.is_safe, "{:?}", report.errors);
        assert_eq!(report.archive.map(|a| a.entry_count), Some(2));
        assert!(report.checks["archive_contents"].passed);
    }

    #[test]
    fn test_tarball_with_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let mut bytes = tar_bytes(&[("ok.txt", b"x")]);
        // Rewrite the stored name to escape the root, then fix the checksum.
        let mut header = tar::Header::new_gnu();
        header.as_mut_bytes().copy_from_slice(&bytes[..512]);
        header.as_old_mut().name[..9].copy_from_slice(b"../ok.txt");
        header.set_cksum();
        bytes[..512].copy_from_slice(header.as_bytes());
        let path = write_file(dir.path(), "release.tar.gz", &gzip_bytes(&bytes));

        let report = validator(ValidationMode::FailFast).validate(&path, None).unwrap();
        assert!(!report.is_safe);
        assert!(!report.checks["archive_contents"].passed);
        assert_eq!(report.risk_level, RiskLevel::High);
    }

    #[test]
    fn test_validate_archive_requires_container() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "notes.txt", b"plain");

        let report = validator(ValidationMode::Detailed)
            .validate_archive(&path, None)
            .unwrap();
        assert!(!report.checks["archive_contents"].passed);
    }

    #[test]
    fn test_missing_path_is_io_error() {
        let err = validator(ValidationMode::FailFast)
            .validate("/definitely/not/here.txt", None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_directory_aggregates_files() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.txt", b"alpha");
        write_file(dir.path(), "sub/b.md", b"# title");

        let report = validator(ValidationMode::Detailed)
            .validate(dir.path(), Some("bob"))
            .unwrap();
        assert!(report.is_safe, "{:?}", report.errors);
        assert!(report.checks.contains_key("file:a.txt"));
        assert!(report.checks.contains_key("file:sub/b.md"));
        assert!(report.checks["rate_limiting"].passed);
        assert_eq!(report.file_size, 12);
    }

    #[test]
    fn test_directory_fail_fast() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.exe.txt", b"x");
        write_file(dir.path(), "b.txt", b"x");

        let report = validator(ValidationMode::FailFast)
            .validate_directory(dir.path(), None)
            .unwrap();
        assert!(!report.is_safe);
        assert_eq!(report.checks.len(), 1);
        assert!(!report.checks["file:a.exe.txt"].passed);
    }

    #[test]
    fn test_directory_detailed_continues() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "a.exe.txt", b"x");
        write_file(dir.path(), "b.txt", b"x");

        let report = validator(ValidationMode::Detailed)
            .validate_directory(dir.path(), None)
            .unwrap();
        assert_eq!(report.checks.len(), 2);
        assert!(report.checks["file:b.txt"].passed);
        assert!(!report.recommendations.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_directory_skips_symlinks() {
        let dir = TempDir::new().unwrap();
        let target = write_file(dir.path(), "real.txt", b"x");
        std::os::unix::fs::symlink(&target, dir.path().join("link.txt")).unwrap();

        let report = validator(ValidationMode::FailFast)
            .validate_directory(dir.path(), None)
            .unwrap();
        assert!(report.is_safe);
        assert_eq!(report.checks.len(), 1);
        assert_eq!(report.warnings, vec!["symbolic link skipped: link.txt".to_string()]);
    }

    #[test]
    fn test_validate_directory_rejects_file() {
        let dir = TempDir::new().unwrap();
        let path = write_file(dir.path(), "a.txt", b"x");
        assert!(validator(ValidationMode::FailFast)
            .validate_directory(&path, None)
            .is_err());
    }
}
