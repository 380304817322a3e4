use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Per-worker daily application counter. Resets at the UTC day boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaState {
    sent_today: u32,
    day: NaiveDate,
    last_reset: DateTime<Utc>,
}

impl QuotaState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            sent_today: 0,
            day: now.date_naive(),
            last_reset: now,
        }
    }

    /// Resets the counter if `now` falls on a later day than the last reset.
    /// Returns whether a reset happened.
    pub fn roll_over(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today <= self.day {
            return false;
        }
        self.sent_today = 0;
        self.day = today;
        self.last_reset = now;
        true
    }

    pub fn record_success(&mut self) {
        self.sent_today += 1;
    }

    pub fn sent_today(&self) -> u32 {
        self.sent_today
    }

    pub fn last_reset(&self) -> DateTime<Utc> {
        self.last_reset
    }

    pub fn remaining(&self, cap: u32) -> u32 {
        cap.saturating_sub(self.sent_today)
    }

    pub fn is_exhausted(&self, cap: u32) -> bool {
        self.remaining(cap) == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_counts_until_cap() {
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 8, 0, 0).unwrap();
        let mut quota = QuotaState::new(now);
        assert_eq!(quota.remaining(2), 2);
        quota.record_success();
        quota.record_success();
        assert!(quota.is_exhausted(2));
        assert_eq!(quota.remaining(1), 0);
    }

    #[test]
    fn test_same_day_does_not_reset() {
        let morning = Utc.with_ymd_and_hms(2026, 5, 4, 0, 0, 1).unwrap();
        let mut quota = QuotaState::new(morning);
        quota.record_success();
        let night = Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 59).unwrap();
        assert!(!quota.roll_over(night));
        assert_eq!(quota.sent_today(), 1);
    }

    #[test]
    fn test_crossing_midnight_resets() {
        let night = Utc.with_ymd_and_hms(2026, 5, 4, 23, 59, 0).unwrap();
        let mut quota = QuotaState::new(night);
        quota.record_success();
        let after = Utc.with_ymd_and_hms(2026, 5, 5, 0, 1, 0).unwrap();
        assert!(quota.roll_over(after));
        assert_eq!(quota.sent_today(), 0);
        assert_eq!(quota.last_reset(), after);
    }

    #[test]
    fn test_clock_going_backwards_keeps_count() {
        let now = Utc.with_ymd_and_hms(2026, 5, 5, 9, 0, 0).unwrap();
        let mut quota = QuotaState::new(now);
        quota.record_success();
        let earlier = Utc.with_ymd_and_hms(2026, 5, 4, 9, 0, 0).unwrap();
        assert!(!quota.roll_over(earlier));
        assert_eq!(quota.sent_today(), 1);
    }
}
