//! Newborn record update window.
//!
//! Newborn records must be completed within a fixed number of days after
//! birth. The window is advisory: an expired window is shown as a banner
//! and never blocks submission.

use chrono::NaiveDate;

use crate::config::{AgeMonthRule, ValidationConfig};
use crate::models::UpdateWindow;

use super::age::{age_in_days, age_in_months};

/// Computes [`UpdateWindow`] state from a birth date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateWindowTracker {
    pub window_days: i64,
    pub newborn_until_months: u32,
    pub rule: AgeMonthRule,
}

impl Default for UpdateWindowTracker {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

impl UpdateWindowTracker {
    pub fn from_config(config: &ValidationConfig) -> Self {
        Self {
            window_days: config.update_window_days,
            newborn_until_months: config.newborn_until_months,
            rule: config.age_month_rule,
        }
    }

    pub fn compute(&self, birth_date: NaiveDate, now: NaiveDate) -> UpdateWindow {
        let is_newborn =
            age_in_months(birth_date, now, self.rule) < i64::from(self.newborn_until_months);
        let days_remaining = self.window_days - age_in_days(birth_date, now);

        UpdateWindow {
            is_newborn,
            days_remaining,
            is_expired: days_remaining <= 0,
        }
    }
}

/// Compute the update window with default settings (15 days, 12 months).
pub fn compute_update_window(birth_date: NaiveDate, now: NaiveDate) -> UpdateWindow {
    UpdateWindowTracker::default().compute(birth_date, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn now() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_sixteen_days_is_expired() {
        let window = compute_update_window(now() - Duration::days(16), now());
        assert!(window.is_newborn);
        assert!(window.is_expired);
        assert_eq!(window.days_remaining, -1);
    }

    #[test]
    fn test_born_today() {
        let window = compute_update_window(now(), now());
        assert_eq!(window.days_remaining, 15);
        assert!(!window.is_expired);
    }

    #[test]
    fn test_last_day_counts_as_expired() {
        let window = compute_update_window(now() - Duration::days(15), now());
        assert_eq!(window.days_remaining, 0);
        assert!(window.is_expired);
    }

    #[test]
    fn test_not_newborn_after_twelve_months() {
        let window = compute_update_window(now() - Duration::days(400), now());
        assert!(!window.is_newborn);
        assert!(window.is_expired);
    }

    #[test]
    fn test_newborn_boundary_legacy() {
        // 365 / 30.44 = 11.99, 366 / 30.44 = 12.02
        assert!(compute_update_window(now() - Duration::days(365), now()).is_newborn);
        assert!(!compute_update_window(now() - Duration::days(366), now()).is_newborn);
    }

    #[test]
    fn test_newborn_boundary_calendar() {
        let tracker = UpdateWindowTracker {
            rule: AgeMonthRule::Calendar,
            ..UpdateWindowTracker::default()
        };
        let birth = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        assert!(tracker.compute(birth, now()).is_newborn);
        let birth = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert!(!tracker.compute(birth, now()).is_newborn);
    }
}
