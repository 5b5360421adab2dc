//! Upload tiers and their limits.
//!
//! Each [`Tier`] maps to one immutable [`UploadPolicy`]. The registry is
//! seeded at construction and exposes no mutation API; a deployment that needs
//! different limits supplies a new policy document via
//! [`PolicyRegistry::from_json`].

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Result;
use crate::UploadError;

const MIB: u64 = 1024 * 1024;

/// Named trust level of an uploader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Anonymous or web uploads.
    Basic,
    /// Authenticated API uploads.
    Elevated,
    /// Administrative uploads.
    Privileged,
}

impl Tier {
    /// All tiers in ascending order of trust.
    pub const ALL: [Self; 3] = [Self::Basic, Self::Elevated, Self::Privileged];

    /// Canonical name of the tier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Elevated => "elevated",
            Self::Privileged => "privileged",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = UploadError;

    /// Parses a tier name, case-insensitively. The legacy upload-type names
    /// (`web_upload`, `api_upload`, `admin_upload`) are accepted as aliases.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" | "web" | "web_upload" => Ok(Self::Basic),
            "elevated" | "api" | "api_upload" => Ok(Self::Elevated),
            "privileged" | "admin" | "admin_upload" => Ok(Self::Privileged),
            _ => Err(UploadError::UnknownTier { name: s.to_string() }),
        }
    }
}

/// Upload ceilings for one tier.
///
/// # Examples
///
/// ```
/// use upgate_core::{Tier, UploadPolicy};
///
/// let basic = UploadPolicy::for_tier(Tier::Basic);
/// assert_eq!(basic.max_file_size, 25 * 1024 * 1024);
///
/// // Policies are plain values and can be tailored for tests or tooling.
/// let strict = UploadPolicy {
///     max_compression_ratio: 20.0,
///     ..basic
/// };
/// assert!(strict.max_compression_ratio < basic.max_compression_ratio);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadPolicy {
    /// Maximum size of a single file, or of a single archive entry, in bytes.
    pub max_file_size: u64,

    /// Maximum size of an archive container in bytes.
    pub max_archive_size: u64,

    /// Maximum total declared uncompressed size of an archive in bytes.
    pub max_extracted_size: u64,

    /// Maximum number of entries in an archive.
    pub max_archive_entries: usize,

    /// Maximum declared-to-compressed size ratio of a single entry.
    #[serde(default = "default_compression_ratio")]
    pub max_compression_ratio: f64,

    /// Maximum admitted uploads per identity in a trailing hour.
    pub max_uploads_per_hour: usize,

    /// Maximum admitted uploads per identity in a trailing 24 hours.
    pub max_uploads_per_day: usize,
}

const fn default_compression_ratio() -> f64 {
    100.0
}

impl UploadPolicy {
    /// Returns the seeded policy for a tier.
    ///
    /// Default values:
    ///
    /// | tier       | file    | archive | extracted | entries | hour | day  |
    /// |------------|---------|---------|-----------|---------|------|------|
    /// | basic      | 25 MiB  | 50 MiB  | 100 MiB   | 500     | 50   | 200  |
    /// | elevated   | 100 MiB | 200 MiB | 400 MiB   | 1000    | 100  | 500  |
    /// | privileged | 500 MiB | 1 GiB   | 2 GiB     | 5000    | 500  | 2000 |
    #[must_use]
    pub const fn for_tier(tier: Tier) -> Self {
        match tier {
            Tier::Basic => Self {
                max_file_size: 25 * MIB,
                max_archive_size: 50 * MIB,
                max_extracted_size: 100 * MIB,
                max_archive_entries: 500,
                max_compression_ratio: default_compression_ratio(),
                max_uploads_per_hour: 50,
                max_uploads_per_day: 200,
            },
            Tier::Elevated => Self {
                max_file_size: 100 * MIB,
                max_archive_size: 200 * MIB,
                max_extracted_size: 400 * MIB,
                max_archive_entries: 1000,
                max_compression_ratio: default_compression_ratio(),
                max_uploads_per_hour: 100,
                max_uploads_per_day: 500,
            },
            Tier::Privileged => Self {
                max_file_size: 500 * MIB,
                max_archive_size: 1024 * MIB,
                max_extracted_size: 2048 * MIB,
                max_archive_entries: 5000,
                max_compression_ratio: default_compression_ratio(),
                max_uploads_per_hour: 500,
                max_uploads_per_day: 2000,
            },
        }
    }

    /// Checks the policy for internal consistency.
    fn validate(&self, tier: Tier) -> Result<()> {
        let invalid = |reason: &str| UploadError::InvalidPolicy {
            reason: format!("{tier}: {reason}"),
        };

        if self.max_file_size == 0 || self.max_archive_size == 0 || self.max_archive_entries == 0 {
            return Err(invalid("size and entry limits must be non-zero"));
        }
        if self.max_extracted_size < self.max_file_size {
            return Err(invalid("max_extracted_size must be at least max_file_size"));
        }
        if !self.max_compression_ratio.is_finite() || self.max_compression_ratio < 1.0 {
            return Err(invalid("max_compression_ratio must be a finite value >= 1"));
        }
        if self.max_uploads_per_day < self.max_uploads_per_hour {
            return Err(invalid("max_uploads_per_day must be at least max_uploads_per_hour"));
        }
        Ok(())
    }

    /// Returns `true` if every size and entry ceiling of `self` is strictly
    /// below the corresponding ceiling of `other`.
    fn strictly_below(&self, other: &Self) -> bool {
        self.max_file_size < other.max_file_size
            && self.max_archive_size < other.max_archive_size
            && self.max_extracted_size < other.max_extracted_size
            && self.max_archive_entries < other.max_archive_entries
    }
}

/// Immutable table of tier policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRegistry {
    basic: UploadPolicy,
    elevated: UploadPolicy,
    privileged: UploadPolicy,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self {
            basic: UploadPolicy::for_tier(Tier::Basic),
            elevated: UploadPolicy::for_tier(Tier::Elevated),
            privileged: UploadPolicy::for_tier(Tier::Privileged),
        }
    }
}

impl PolicyRegistry {
    /// Builds a registry from explicit policies.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::InvalidPolicy` if a policy is inconsistent or the
    /// size limits do not strictly increase from basic to privileged.
    pub fn new(
        basic: UploadPolicy,
        elevated: UploadPolicy,
        privileged: UploadPolicy,
    ) -> Result<Self> {
        let registry = Self {
            basic,
            elevated,
            privileged,
        };
        registry.validate()?;
        Ok(registry)
    }

    /// Loads a registry from a JSON policy document.
    ///
    /// # Examples
    ///
    /// ```
    /// use upgate_core::PolicyRegistry;
    ///
    /// let doc = r#"{
    ///   "basic":      { "max_file_size": 10, "max_archive_size": 20, "max_extracted_size": 40,
    ///                   "max_archive_entries": 5,
    ///                   "max_uploads_per_hour": 1, "max_uploads_per_day": 2 },
    ///   "elevated":   { "max_file_size": 11, "max_archive_size": 21, "max_extracted_size": 41,
    ///                   "max_archive_entries": 6,
    ///                   "max_uploads_per_hour": 1, "max_uploads_per_day": 2 },
    ///   "privileged": { "max_file_size": 12, "max_archive_size": 22, "max_extracted_size": 42,
    ///                   "max_archive_entries": 7,
    ///                   "max_uploads_per_hour": 1, "max_uploads_per_day": 2 }
    /// }"#;
    /// let registry = PolicyRegistry::from_json(doc)?;
    /// assert_eq!(registry.policy_for(upgate_core::Tier::Basic).max_file_size, 10);
    /// # Ok::<(), upgate_core::UploadError>(())
    /// ```
    pub fn from_json(document: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(document)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Returns the policy of a tier.
    #[must_use]
    pub const fn policy_for(&self, tier: Tier) -> &UploadPolicy {
        match tier {
            Tier::Basic => &self.basic,
            Tier::Elevated => &self.elevated,
            Tier::Privileged => &self.privileged,
        }
    }

    /// Resolves a tier by name and returns it with its policy.
    ///
    /// # Errors
    ///
    /// Returns `UploadError::UnknownTier` if the name is not registered.
    pub fn lookup(&self, name: &str) -> Result<(Tier, &UploadPolicy)> {
        let tier: Tier = name.parse()?;
        Ok((tier, self.policy_for(tier)))
    }

    /// Iterates tiers with their policies in ascending order of trust.
    pub fn iter(&self) -> impl Iterator<Item = (Tier, &UploadPolicy)> {
        Tier::ALL.into_iter().map(|tier| (tier, self.policy_for(tier)))
    }

    fn validate(&self) -> Result<()> {
        for (tier, policy) in self.iter() {
            policy.validate(tier)?;
        }
        let ordered = self.basic.strictly_below(&self.elevated)
            && self.elevated.strictly_below(&self.privileged);
        if !ordered {
            return Err(UploadError::InvalidPolicy {
                reason: "size and entry limits must strictly increase from basic to privileged"
                    .into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_registry_is_valid() {
        let registry = PolicyRegistry::default();
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn test_tier_parse_aliases() {
        assert_eq!("basic".parse::<Tier>().unwrap(), Tier::Basic);
        assert_eq!("web_upload".parse::<Tier>().unwrap(), Tier::Basic);
        assert_eq!("API".parse::<Tier>().unwrap(), Tier::Elevated);
        assert_eq!("admin_upload".parse::<Tier>().unwrap(), Tier::Privileged);
    }

    #[test]
    fn test_unknown_tier() {
        let registry = PolicyRegistry::default();
        let result = registry.lookup("guest");
        assert!(matches!(result, Err(UploadError::UnknownTier { name }) if name == "guest"));
    }

    #[test]
    fn test_lookup_returns_policy() {
        let registry = PolicyRegistry::default();
        let (tier, policy) = registry.lookup("elevated").unwrap();
        assert_eq!(tier, Tier::Elevated);
        assert_eq!(policy.max_file_size, 100 * MIB);
    }

    #[test]
    fn test_limits_strictly_increase() {
        let registry = PolicyRegistry::default();
        let policies: Vec<_> = registry.iter().map(|(_, p)| *p).collect();
        assert!(policies[0].strictly_below(&policies[1]));
        assert!(policies[1].strictly_below(&policies[2]));
    }

    #[test]
    fn test_non_increasing_registry_rejected() {
        let basic = UploadPolicy::for_tier(Tier::Elevated);
        let result = PolicyRegistry::new(
            basic,
            UploadPolicy::for_tier(Tier::Elevated),
            UploadPolicy::for_tier(Tier::Privileged),
        );
        assert!(matches!(result, Err(UploadError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_inconsistent_policy_rejected() {
        let basic = UploadPolicy {
            max_compression_ratio: f64::NAN,
            ..UploadPolicy::for_tier(Tier::Basic)
        };
        let result = PolicyRegistry::new(
            basic,
            UploadPolicy::for_tier(Tier::Elevated),
            UploadPolicy::for_tier(Tier::Privileged),
        );
        assert!(matches!(result, Err(UploadError::InvalidPolicy { .. })));
    }

    #[test]
    fn test_from_json_round_trips_default() {
        let json = serde_json::to_string(&PolicyRegistry::default()).unwrap();
        let registry = PolicyRegistry::from_json(&json).unwrap();
        assert_eq!(registry, PolicyRegistry::default());
    }

    #[test]
    fn test_from_json_rejects_unknown_fields() {
        let doc = r#"{"basic": {"max_file_size": 1, "bogus": 2}}"#;
        assert!(matches!(
            PolicyRegistry::from_json(doc),
            Err(UploadError::Config(_))
        ));
    }
}
