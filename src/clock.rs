//! Wall-clock source for time-bucket placeholders
//!
//! The dispatcher rounds "now" down to bucket boundaries. Injecting the clock
//! keeps that rounding deterministic in tests.

use chrono::{DateTime, Utc};

/// Source of the current UTC time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a single instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(DateTime<Utc>);

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    /// Parse an RFC 3339 timestamp, e.g. `2024-01-01T10:47:00Z`.
    pub fn parse(rfc3339: &str) -> crate::Result<Self> {
        let at = DateTime::parse_from_rfc3339(rfc3339)
            .map_err(|e| crate::Error::Config(format!("invalid timestamp '{rfc3339}': {e}")))?;
        Ok(Self(at.with_timezone(&Utc)))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
