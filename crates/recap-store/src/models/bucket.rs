use std::fmt;

use chrono::{DateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

const SECONDS_PER_HOUR: i64 = 3600;

/// Hour-wide bucket a message falls into.
///
/// The key is the absolute hour since the Unix epoch, so the same hour of
/// day on two different dates lands in two different buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BucketKey(i64);

impl BucketKey {
    pub fn from_timestamp(timestamp: DateTime<Utc>) -> Self {
        Self(timestamp.timestamp().div_euclid(SECONDS_PER_HOUR))
    }

    pub fn from_hours_since_epoch(hours: i64) -> Self {
        Self(hours)
    }

    pub fn hours_since_epoch(&self) -> i64 {
        self.0
    }

    /// Inclusive start of the bucket
    pub fn start(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.0 * SECONDS_PER_HOUR, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Exclusive end of the bucket
    pub fn end(&self) -> DateTime<Utc> {
        Self(self.0 + 1).start()
    }

    pub fn hour_of_day(&self) -> u32 {
        self.start().hour()
    }
}

impl fmt::Display for BucketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start().format("%Y-%m-%d %H:00 UTC"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_hour_same_bucket() {
        let a = Utc.with_ymd_and_hms(2024, 5, 1, 10, 5, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 5, 1, 10, 59, 59).unwrap();
        let c = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        assert_eq!(BucketKey::from_timestamp(a), BucketKey::from_timestamp(b));
        assert_ne!(BucketKey::from_timestamp(b), BucketKey::from_timestamp(c));
    }

    #[test]
    fn test_same_hour_on_different_days_are_distinct() {
        let monday = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2024, 5, 7, 10, 0, 0).unwrap();

        let a = BucketKey::from_timestamp(monday);
        let b = BucketKey::from_timestamp(tuesday);
        assert_ne!(a, b);
        assert_eq!(a.hour_of_day(), b.hour_of_day());
    }

    #[test]
    fn test_bounds_and_label() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 10, 40, 0).unwrap();
        let key = BucketKey::from_timestamp(ts);

        assert_eq!(key.start(), Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap());
        assert_eq!(key.end(), Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap());
        assert_eq!(key.to_string(), "2024-05-01 10:00 UTC");
    }
}
