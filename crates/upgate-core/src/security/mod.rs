//! Name safety rules and upload throttling.

mod name;
mod ratelimit;

pub use name::DANGEROUS_EXTENSIONS;
pub use name::DISALLOWED_CHARS;
pub use name::SUSPICIOUS_TOKENS;
pub use name::check_name;
pub use ratelimit::Clock;
pub use ratelimit::DAY;
pub use ratelimit::HOUR;
pub use ratelimit::ManualClock;
pub use ratelimit::RateCeilings;
pub use ratelimit::RateLimiter;
pub use ratelimit::SystemClock;
pub use ratelimit::WindowUsage;
