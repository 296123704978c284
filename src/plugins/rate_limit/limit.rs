//! Rate limit windows.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::time::Instant;

use crate::plugins::PluginError;

/// Length of a rate limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Second,
    Minute,
    Hour,
}

impl Period {
    pub fn window(self) -> Duration {
        match self {
            Period::Second => Duration::from_secs(1),
            Period::Minute => Duration::from_secs(60),
            Period::Hour => Duration::from_secs(60 * 60),
        }
    }

    /// Quota used when the configured one is not positive.
    pub fn default_quota(self) -> i64 {
        match self {
            Period::Second => 2,
            Period::Minute => 15,
            Period::Hour => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Period::Second => "s",
            Period::Minute => "m",
            Period::Hour => "h",
        }
    }
}

impl FromStr for Period {
    type Err = PluginError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "s" => Ok(Period::Second),
            "m" => Ok(Period::Minute),
            "h" => Ok(Period::Hour),
            other => Err(PluginError::UnsupportedPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota state of one subject within its current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit {
    pub deadline: Instant,
    pub left: i64,
}

impl Limit {
    /// Fresh window starting at `now`.
    pub fn starting_at(now: Instant, period: Period, quota: i64) -> Self {
        Self {
            deadline: now + period.window(),
            left: quota,
        }
    }

    /// A window is over once `now` is strictly past its deadline.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now > self.deadline
    }

    pub fn is_exhausted(&self) -> bool {
        self.left <= 0
    }
}
