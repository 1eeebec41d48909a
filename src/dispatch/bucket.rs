//! Time-bucket placeholders in query templates
//!
//! A template may reference `ROUNDED_HOUR`, `ROUNDED_30MIN`, `ROUNDED_15MIN`,
//! `ROUNDED_10MIN` or `ROUNDED_5MIN`. Each token is replaced by a date
//! literal for the current UTC time rounded down to that bucket, e.g.
//! `d'2024/01/01 10:45'`.

use chrono::{DateTime, Duration, Timelike, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeBucket {
    Hour,
    ThirtyMinutes,
    FifteenMinutes,
    TenMinutes,
    FiveMinutes,
}

impl TimeBucket {
    /// Every bucket, in substitution order
    pub const ALL: [TimeBucket; 5] = [
        TimeBucket::Hour,
        TimeBucket::ThirtyMinutes,
        TimeBucket::FifteenMinutes,
        TimeBucket::TenMinutes,
        TimeBucket::FiveMinutes,
    ];

    pub fn placeholder(&self) -> &'static str {
        match self {
            TimeBucket::Hour => "ROUNDED_HOUR",
            TimeBucket::ThirtyMinutes => "ROUNDED_30MIN",
            TimeBucket::FifteenMinutes => "ROUNDED_15MIN",
            TimeBucket::TenMinutes => "ROUNDED_10MIN",
            TimeBucket::FiveMinutes => "ROUNDED_5MIN",
        }
    }

    pub fn seconds(&self) -> i64 {
        match self {
            TimeBucket::Hour => 60 * 60,
            TimeBucket::ThirtyMinutes => 30 * 60,
            TimeBucket::FifteenMinutes => 15 * 60,
            TimeBucket::TenMinutes => 10 * 60,
            TimeBucket::FiveMinutes => 5 * 60,
        }
    }

    /// Start of the bucket containing `now`
    pub fn floor(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let excess = now.timestamp().rem_euclid(self.seconds());
        let floored = now - Duration::seconds(excess);
        floored.with_nanosecond(0).unwrap_or(floored)
    }

    /// Query-language date literal of the bucket containing `now`
    pub fn literal(&self, now: DateTime<Utc>) -> String {
        format!("d'{}'", self.floor(now).format("%Y/%m/%d %H:%M"))
    }
}

/// Replace every bucket placeholder in `template` using the same `now`.
pub fn resolve_placeholders(template: &str, now: DateTime<Utc>) -> String {
    let mut query = template.to_string();
    for bucket in TimeBucket::ALL {
        if query.contains(bucket.placeholder()) {
            query = query.replace(bucket.placeholder(), &bucket.literal(now));
        }
    }
    query
}
