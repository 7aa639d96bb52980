//! Entry Timeouts

use std::time::{Duration, Instant};

/// Per-call expiry request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Timeout {
    /// Use the handle's configured default timeout
    #[default]
    Default,
    /// Never expire
    Never,
    /// Expire after this long; zero means already expired
    After(Duration),
}

impl Timeout {
    /// Timeout from signed seconds; zero or negative is already expired
    pub fn from_secs(secs: i64) -> Self {
        Timeout::After(Duration::from_secs(secs.max(0) as u64))
    }

    /// Absolute expiry for an entry written at `now`, `None` meaning never.
    /// A timeout too far out to represent never expires.
    pub fn expires_at(self, default: Option<Duration>, now: Instant) -> Option<Instant> {
        let ttl = match self {
            Timeout::Default => default,
            Timeout::Never => None,
            Timeout::After(d) => Some(d),
        };
        ttl.and_then(|d| now.checked_add(d))
    }
}

impl From<Duration> for Timeout {
    fn from(d: Duration) -> Self {
        Timeout::After(d)
    }
}

impl From<Option<Duration>> for Timeout {
    fn from(d: Option<Duration>) -> Self {
        d.map(Timeout::After).unwrap_or(Timeout::Never)
    }
}
