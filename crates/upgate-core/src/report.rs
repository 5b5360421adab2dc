//! Validation verdicts.
//!
//! A [`ValidationReport`] is built once per validation call and is plain data
//! afterwards. Its `is_safe`, `risk_level` and `security_score` fields are
//! derived from `checks` alone when the report is finished, so a consumer can
//! recompute them from the serialized form.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

use crate::Rejection;
use crate::Tier;
use crate::archive::ArchiveSummary;
use crate::content::Category;
use crate::details::FileDetails;

/// Ordinal severity of a failed check.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Nothing failed.
    #[default]
    Low,
    /// Limit exceeded without evidence of hostile content.
    Medium,
    /// Likely hostile or abusive.
    High,
    /// Disguised or embedded executable content.
    Critical,
}

impl RiskLevel {
    /// Score penalty applied when a report reaches this level.
    #[must_use]
    pub const fn penalty(self) -> u32 {
        match self {
            Self::Low => 0,
            Self::Medium => 20,
            Self::High => 50,
            Self::Critical => 80,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage a check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    /// Per-identity admission.
    RateLimiting,
    /// Path and name safety rules.
    Filename,
    /// Container or file size ceiling.
    FileSize,
    /// Type whitelist, category ceiling and heuristics.
    ContentScan,
    /// Archive entry directory inspection.
    ArchiveContents,
    /// One file inside a validated directory.
    DirectoryEntry,
}

impl CheckKind {
    /// Stable report key of the check. Directory entries are keyed by path
    /// instead.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::RateLimiting => "rate_limiting",
            Self::Filename => "filename",
            Self::FileSize => "file_size",
            Self::ContentScan => "content_scan",
            Self::ArchiveContents => "archive_contents",
            Self::DirectoryEntry => "directory_entry",
        }
    }

    /// Score deduction when this check fails.
    #[must_use]
    pub const fn deduction(self) -> u32 {
        match self {
            Self::ContentScan => 40,
            Self::ArchiveContents => 35,
            Self::RateLimiting => 30,
            Self::Filename => 25,
            Self::DirectoryEntry => 20,
            Self::FileSize => 15,
        }
    }
}

/// Outcome of a single check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckOutcome {
    /// Which stage produced the outcome.
    pub kind: CheckKind,
    /// Whether the check passed.
    pub passed: bool,
    /// Severity of the failure, `low` for passed checks.
    pub severity: RiskLevel,
    /// Human-readable result.
    pub message: String,
}

/// Score bonus per passed check.
const PASS_BONUS: u32 = 2;

/// Computes the security score of a set of checks at a given risk level.
///
/// Starts at 100, subtracts the risk penalty and each failed check's
/// deduction, adds a small bonus per passed check and clamps to `0..=100`.
///
/// # Examples
///
/// ```
/// use upgate_core::report::{security_score, CheckKind, CheckOutcome, RiskLevel};
///
/// let checks = [CheckOutcome {
///     kind: CheckKind::FileSize,
///     passed: false,
///     severity: RiskLevel::Medium,
///     message: "too large".into(),
/// }];
/// assert_eq!(security_score(&checks, RiskLevel::Medium), 65);
/// ```
#[must_use]
pub fn security_score<'a>(
    checks: impl IntoIterator<Item = &'a CheckOutcome>,
    risk: RiskLevel,
) -> u8 {
    let (mut bonus, mut deductions) = (0u32, risk.penalty());
    for check in checks {
        if check.passed {
            bonus += PASS_BONUS;
        } else {
            deductions += check.kind.deduction();
        }
    }
    let score = (100 + bonus).saturating_sub(deductions).min(100);
    u8::try_from(score).unwrap_or(100)
}

/// Result of validating one file, archive or directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Final path component of the target.
    pub filename: String,
    /// Path as given by the caller.
    pub path: PathBuf,
    /// Size of the target in bytes; for directories the sum of regular files.
    pub file_size: u64,
    /// Tier whose policy was applied.
    pub tier: Tier,
    /// Identity charged for the upload, if any.
    pub identity: Option<String>,
    /// When validation started.
    pub timestamp: DateTime<Utc>,
    /// Category the target was classified as.
    pub category: Option<Category>,
    /// `true` iff every check passed.
    pub is_safe: bool,
    /// Worst severity among failed checks.
    pub risk_level: RiskLevel,
    /// Derived score in `0..=100`.
    pub security_score: u8,
    /// Check outcomes by name.
    pub checks: BTreeMap<String, CheckOutcome>,
    /// Reasons for every failed check.
    pub errors: Vec<String>,
    /// Non-fatal observations.
    pub warnings: Vec<String>,
    /// Advice for the uploader, filled in detailed mode.
    pub recommendations: Vec<String>,
    /// Entry summary when an archive was inspected.
    pub archive: Option<ArchiveSummary>,
    /// File facts, collected for single files in detailed mode.
    #[serde(default)]
    pub details: Option<FileDetails>,
}

impl ValidationReport {
    /// Starts an empty report for a target.
    #[must_use]
    pub fn new(
        path: impl Into<PathBuf>,
        file_size: u64,
        tier: Tier,
        identity: Option<&str>,
    ) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map_or_else(|| path.to_string_lossy(), |name| name.to_string_lossy())
            .into_owned();
        Self {
            filename,
            path,
            file_size,
            tier,
            identity: identity.map(str::to_string),
            timestamp: Utc::now(),
            category: None,
            is_safe: true,
            risk_level: RiskLevel::Low,
            security_score: 100,
            checks: BTreeMap::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
            archive: None,
            details: None,
        }
    }

    /// Records a passed check under its own key.
    pub fn pass(&mut self, kind: CheckKind, message: impl Into<String>) {
        self.pass_as(kind.key(), kind, message);
    }

    /// Records a passed check under an explicit key.
    pub fn pass_as(&mut self, key: impl Into<String>, kind: CheckKind, message: impl Into<String>) {
        self.checks.insert(
            key.into(),
            CheckOutcome {
                kind,
                passed: true,
                severity: RiskLevel::Low,
                message: message.into(),
            },
        );
        self.refresh();
    }

    /// Records a failed check under its own key.
    pub fn fail(&mut self, kind: CheckKind, rejection: &Rejection) {
        self.fail_as(kind.key(), kind, rejection.severity(), rejection.to_string());
    }

    /// Records a failed check under an explicit key.
    pub fn fail_as(
        &mut self,
        key: impl Into<String>,
        kind: CheckKind,
        severity: RiskLevel,
        message: impl Into<String>,
    ) {
        let message = message.into();
        self.errors.push(message.clone());
        self.checks.insert(
            key.into(),
            CheckOutcome {
                kind,
                passed: false,
                severity,
                message,
            },
        );
        self.refresh();
    }

    /// Adds a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Adds a recommendation unless an identical one is already present.
    pub fn recommend(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.recommendations.contains(&message) {
            self.recommendations.push(message);
        }
    }

    /// Number of failed checks.
    #[must_use]
    pub fn failed_checks(&self) -> usize {
        self.checks.values().filter(|c| !c.passed).count()
    }

    /// First failure reason, or a short confirmation when safe.
    #[must_use]
    pub fn summary(&self) -> String {
        self.errors.first().cloned().unwrap_or_else(|| {
            format!("{} passed {} checks", self.filename, self.checks.len())
        })
    }

    /// Recomputes the derived fields from `checks`.
    fn refresh(&mut self) {
        self.is_safe = self.checks.values().all(|c| c.passed);
        self.risk_level = self
            .checks
            .values()
            .filter(|c| !c.passed)
            .map(|c| c.severity)
            .max()
            .unwrap_or_default();
        self.security_score = security_score(self.checks.values(), self.risk_level);
    }
}
