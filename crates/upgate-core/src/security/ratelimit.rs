//! Per-identity sliding-window upload throttling.
//!
//! Each identity owns a queue of admission timestamps. Every call to
//! [`RateLimiter::admit`] prunes entries older than 24 hours, counts the
//! trailing hour and day, and appends "now" only if both counts are below
//! their ceilings. Bursts are permitted up to the ceiling and then hard-blocked.
//!
//! State lives in a sharded [`DashMap`]: the shard guard is held for the
//! whole prune-count-append sequence, so admissions for one identity are
//! serialized while different identities only contend when they hash to the
//! same shard.

use std::collections::VecDeque;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;
use tracing::warn;

use crate::UploadPolicy;
use crate::rejection::RateLimited;

/// Length of the hourly window.
pub const HOUR: Duration = Duration::from_secs(60 * 60);

/// Length of the daily window, which is also the pruning horizon.
pub const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Source of the current instant.
pub trait Clock: Send + Sync {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use upgate_core::security::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let start = clock.now();
/// clock.advance(Duration::from_secs(90));
/// assert_eq!(clock.now() - start, Duration::from_secs(90));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset_millis: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward.
    #[allow(clippy::cast_possible_truncation)]
    pub fn advance(&self, by: Duration) {
        self.offset_millis
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + Duration::from_millis(self.offset_millis.load(Ordering::SeqCst))
    }
}

/// Upload ceilings applied by the limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateCeilings {
    /// Maximum admissions in a trailing hour.
    pub per_hour: usize,
    /// Maximum admissions in a trailing 24 hours.
    pub per_day: usize,
}

impl From<&UploadPolicy> for RateCeilings {
    fn from(policy: &UploadPolicy) -> Self {
        Self {
            per_hour: policy.max_uploads_per_hour,
            per_day: policy.max_uploads_per_day,
        }
    }
}

impl Default for RateCeilings {
    fn default() -> Self {
        Self {
            per_hour: 50,
            per_day: 200,
        }
    }
}

/// Admission counts of one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowUsage {
    /// Admissions in the trailing hour.
    pub last_hour: usize,
    /// Admissions in the trailing 24 hours.
    pub last_day: usize,
}

/// Thread-safe per-identity sliding-window limiter.
///
/// The ceilings given at construction are a fallback used by [`admit`].
/// Callers with per-tier limits, such as the validator, pass their own to
/// [`admit_with`]; both share the same windows.
///
/// [`admit`]: Self::admit
/// [`admit_with`]: Self::admit_with
pub struct RateLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    ceilings: RateCeilings,
    clock: Box<dyn Clock>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("identities", &self.windows.len())
            .field("ceilings", &self.ceilings)
            .finish_non_exhaustive()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateCeilings::default())
    }
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    #[must_use]
    pub fn new(ceilings: RateCeilings) -> Self {
        Self::with_clock(ceilings, SystemClock)
    }

    /// Creates a limiter on a caller-supplied clock.
    #[must_use]
    pub fn with_clock(ceilings: RateCeilings, clock: impl Clock + 'static) -> Self {
        Self {
            windows: DashMap::new(),
            ceilings,
            clock: Box::new(clock),
        }
    }

    /// Fallback ceilings applied by [`admit`](Self::admit).
    #[must_use]
    pub const fn ceilings(&self) -> RateCeilings {
        self.ceilings
    }

    /// Admits an upload for `identity` under the limiter's default ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] if either window is full. A rejected attempt is
    /// not recorded.
    pub fn admit(&self, identity: &str) -> Result<(), RateLimited> {
        self.admit_with(identity, self.ceilings)
    }

    /// Admits an upload for `identity` under explicit ceilings.
    ///
    /// Admission is recorded atomically with the decision.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimited`] if either window is full.
    pub fn admit_with(&self, identity: &str, ceilings: RateCeilings) -> Result<(), RateLimited> {
        let mut window = self.windows.entry(identity.to_string()).or_default();
        let now = self.clock.now();
        prune(&mut window, now);

        let hour_start = window.partition_point(|t| now.duration_since(*t) >= HOUR);
        let last_hour = window.len() - hour_start;
        if last_hour >= ceilings.per_hour {
            let retry_after = window
                .get(hour_start)
                .map_or(HOUR, |oldest| HOUR.saturating_sub(now.duration_since(*oldest)));
            warn!(
                identity,
                count = last_hour,
                ceiling = ceilings.per_hour,
                "hourly upload ceiling reached"
            );
            return Err(RateLimited::Hourly {
                count: last_hour,
                ceiling: ceilings.per_hour,
                retry_after,
            });
        }

        let last_day = window.len();
        if last_day >= ceilings.per_day {
            let retry_after = window
                .front()
                .map_or(DAY, |oldest| DAY.saturating_sub(now.duration_since(*oldest)));
            warn!(
                identity,
                count = last_day,
                ceiling = ceilings.per_day,
                "daily upload ceiling reached"
            );
            return Err(RateLimited::Daily {
                count: last_day,
                ceiling: ceilings.per_day,
                retry_after,
            });
        }

        window.push_back(now);
        debug!(
            identity,
            last_hour = last_hour + 1,
            last_day = last_day + 1,
            "upload admitted"
        );
        Ok(())
    }

    /// Returns current window counts for `identity` without recording anything.
    #[must_use]
    pub fn usage(&self, identity: &str) -> WindowUsage {
        let now = self.clock.now();
        self.windows
            .get(identity)
            .map(|window| WindowUsage {
                last_hour: window
                    .iter()
                    .filter(|t| now.duration_since(**t) < HOUR)
                    .count(),
                last_day: window
                    .iter()
                    .filter(|t| now.duration_since(**t) < DAY)
                    .count(),
            })
            .unwrap_or_default()
    }

    /// Drops all state for `identity`.
    pub fn forget(&self, identity: &str) {
        self.windows.remove(identity);
    }

    /// Number of identities with retained state.
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Prunes every window and drops identities whose windows became empty.
    ///
    /// There is no background sweep; callers decide when to reclaim memory.
    pub fn retain_active(&self) {
        let now = self.clock.now();
        self.windows.retain(|_, window| {
            prune(window, now);
            !window.is_empty()
        });
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while window
        .front()
        .is_some_and(|oldest| now.duration_since(*oldest) >= DAY)
    {
        window.pop_front();
    }
}
