//! Age arithmetic on calendar dates.
//!
//! Two month-counting rules coexist (see [`AgeMonthRule`]); they can
//! disagree by one near month boundaries, so every threshold check goes
//! through [`age_in_months`] with an explicit rule.

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::AgeMonthRule;

/// Average Gregorian month length used by the legacy rule.
pub const LEGACY_DAYS_PER_MONTH: f64 = 30.44;

/// Whole days elapsed from `birth_date` to `now`. Negative for future dates.
pub fn age_in_days(birth_date: NaiveDate, now: NaiveDate) -> i64 {
    (now - birth_date).num_days()
}

/// Elapsed months under `rule`, clamped at zero for future birth dates.
pub fn age_in_months(birth_date: NaiveDate, now: NaiveDate, rule: AgeMonthRule) -> i64 {
    let months = match rule {
        AgeMonthRule::Legacy => legacy_months(birth_date, now),
        AgeMonthRule::Calendar => calendar_months(birth_date, now),
    };
    months.max(0)
}

/// floor(elapsed days / 30.44)
pub fn legacy_months(birth_date: NaiveDate, now: NaiveDate) -> i64 {
    (age_in_days(birth_date, now) as f64 / LEGACY_DAYS_PER_MONTH).floor() as i64
}

/// Calendar months; a month counts once its day-of-month has been reached.
pub fn calendar_months(birth_date: NaiveDate, now: NaiveDate) -> i64 {
    let mut months = i64::from(now.year() - birth_date.year()) * 12 + i64::from(now.month())
        - i64::from(birth_date.month());
    if now.day() < birth_date.day() {
        months -= 1;
    }
    months
}

/// Age split into calendar years, months and days, for display.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgeBreakdown {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl AgeBreakdown {
    /// Break down the age at `now`. Future birth dates yield zero.
    pub fn between(birth_date: NaiveDate, now: NaiveDate) -> Self {
        let total_months = calendar_months(birth_date, now);
        if total_months < 0 || now < birth_date {
            return Self {
                years: 0,
                months: 0,
                days: 0,
            };
        }

        let total_months = total_months as u32;
        // Adding months clamps to month end (Jan 31 + 1 month = Feb 28)
        let anchor = birth_date
            .checked_add_months(Months::new(total_months))
            .unwrap_or(birth_date);
        let days = age_in_days(anchor, now).max(0) as u32;

        Self {
            years: total_months / 12,
            months: total_months % 12,
            days,
        }
    }

    /// Portuguese description, e.g. "2 anos e 3 meses", "4 meses e 1 dia".
    pub fn describe(&self) -> String {
        let years = plural(self.years, "ano", "anos");
        let months = plural(self.months, "mês", "meses");
        let days = plural(self.days, "dia", "dias");

        match (self.years, self.months, self.days) {
            (0, 0, _) => days,
            (0, _, 0) => months,
            (0, _, _) => format!("{} e {}", months, days),
            (_, 0, _) => years,
            _ => format!("{} e {}", years, months),
        }
    }
}

fn plural(n: u32, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}
