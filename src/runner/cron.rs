//! 5-field cron expressions (minute, hour, day-of-month, month, day-of-week).
//!
//! Supports `*`, single values, ranges, lists, and `*/n` / `a-b/n` steps.
//! Day-of-month and day-of-week follow the vixie-cron rule: when both are
//! restricted, a time matches if either field matches.

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};
use std::str::FromStr;

use crate::error::{OrdergateError, Result};

/// Upper bound on the next-fire scan, in minutes (about four years; enough
/// to reach any satisfiable spec including Feb 29)
const MAX_SCAN_MINUTES: i64 = 4 * 366 * 24 * 60;

/// One cron field as a set of allowed values
#[derive(Debug, Clone, PartialEq, Eq)]
struct CronField {
    /// Bitmask over the field's value range
    mask: u64,
    /// Whether the field was written as a bare `*`
    is_wildcard: bool,
}

impl CronField {
    fn parse(raw: &str, min: u8, max: u8) -> Result<Self> {
        let mut mask = 0u64;
        let mut is_wildcard = false;

        for part in raw.split(',') {
            let (range, step) = match part.split_once('/') {
                Some((range, step)) => {
                    let step: u8 = step.parse().map_err(|_| invalid(raw))?;
                    if step == 0 {
                        return Err(invalid(raw));
                    }
                    (range, step)
                }
                None => (part, 1),
            };

            let (lo, hi) = if range == "*" {
                if part == "*" {
                    is_wildcard = true;
                }
                (min, max)
            } else if let Some((lo, hi)) = range.split_once('-') {
                let lo: u8 = lo.parse().map_err(|_| invalid(raw))?;
                let hi: u8 = hi.parse().map_err(|_| invalid(raw))?;
                (lo, hi)
            } else {
                let value: u8 = range.parse().map_err(|_| invalid(raw))?;
                (value, value)
            };

            if lo < min || hi > max || lo > hi {
                return Err(invalid(raw));
            }

            let mut value = lo;
            while value <= hi {
                mask |= 1 << value;
                value += step;
            }
        }

        if mask == 0 {
            return Err(invalid(raw));
        }

        Ok(Self { mask, is_wildcard })
    }

    fn contains(&self, value: u8) -> bool {
        self.mask & (1 << value) != 0
    }
}

fn invalid(raw: &str) -> OrdergateError {
    OrdergateError::InvalidCron(format!("bad field '{raw}'"))
}

/// A parsed 5-field cron specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSpec {
    minute: CronField,
    hour: CronField,
    day_of_month: CronField,
    month: CronField,
    day_of_week: CronField,
}

impl CronSpec {
    /// Parse a cron expression; exactly five whitespace-separated fields
    pub fn parse(expression: &str) -> Result<Self> {
        let fields: Vec<&str> = expression.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(OrdergateError::InvalidCron(format!(
                "expected 5 fields, got {}",
                fields.len()
            )));
        }

        Ok(Self {
            minute: CronField::parse(fields[0], 0, 59)?,
            hour: CronField::parse(fields[1], 0, 23)?,
            day_of_month: CronField::parse(fields[2], 1, 31)?,
            month: CronField::parse(fields[3], 1, 12)?,
            // 7 is not accepted; 0 = Sunday as in the classic 5-field form
            day_of_week: CronField::parse(fields[4], 0, 6)?,
        })
    }

    /// Whether `at` (truncated to the minute) satisfies this spec
    pub fn matches(&self, at: DateTime<Utc>) -> bool {
        if !self.minute.contains(at.minute() as u8)
            || !self.hour.contains(at.hour() as u8)
            || !self.month.contains(at.month() as u8)
        {
            return false;
        }

        let dom_ok = self.day_of_month.contains(at.day() as u8);
        let dow_ok = self
            .day_of_week
            .contains(at.weekday().num_days_from_sunday() as u8);

        match (self.day_of_month.is_wildcard, self.day_of_week.is_wildcard) {
            // Both restricted: either may match
            (false, false) => dom_ok || dow_ok,
            (false, true) => dom_ok,
            (true, false) => dow_ok,
            (true, true) => true,
        }
    }

    /// The first matching minute strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut candidate = Utc
            .with_ymd_and_hms(
                after.year(),
                after.month(),
                after.day(),
                after.hour(),
                after.minute(),
                0,
            )
            .single()?
            + Duration::minutes(1);

        for _ in 0..MAX_SCAN_MINUTES {
            if self.matches(candidate) {
                return Some(candidate);
            }
            candidate += Duration::minutes(1);
        }
        None
    }
}

impl FromStr for CronSpec {
    type Err = OrdergateError;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn parses_exactly_five_fields() {
        assert!(CronSpec::parse("0 9 * * 1-5").is_ok());
        assert!(CronSpec::parse("0 9 * *").is_err());
        assert!(CronSpec::parse("0 9 * * * *").is_err());
        assert!(CronSpec::parse("").is_err());
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(CronSpec::parse("60 * * * *").is_err());
        assert!(CronSpec::parse("* 24 * * *").is_err());
        assert!(CronSpec::parse("* * 0 * *").is_err());
        assert!(CronSpec::parse("* * * 13 *").is_err());
        assert!(CronSpec::parse("* * * * 7").is_err());
        assert!(CronSpec::parse("*/0 * * * *").is_err());
    }

    #[test]
    fn every_minute_fires_on_the_next_minute() {
        let spec = CronSpec::parse("* * * * *").unwrap();
        let next = spec.next_after(at(2025, 6, 2, 12, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 2, 12, 1));
    }

    #[test]
    fn weekday_morning_spec() {
        let spec = CronSpec::parse("30 9 * * 1-5").unwrap();
        // Friday 2025-06-06 10:00 -> Monday 2025-06-09 09:30
        let next = spec.next_after(at(2025, 6, 6, 10, 0)).unwrap();
        assert_eq!(next, at(2025, 6, 9, 9, 30));
    }

    #[test]
    fn step_values_expand() {
        let spec = CronSpec::parse("*/15 * * * *").unwrap();
        assert_eq!(
            spec.next_after(at(2025, 1, 1, 8, 0)).unwrap(),
            at(2025, 1, 1, 8, 15)
        );
        assert_eq!(
            spec.next_after(at(2025, 1, 1, 8, 50)).unwrap(),
            at(2025, 1, 1, 9, 0)
        );
    }

    #[test]
    fn lists_and_ranges_combine() {
        let spec = CronSpec::parse("0 8,12,16-18 * * *").unwrap();
        assert!(spec.matches(at(2025, 3, 1, 12, 0)));
        assert!(spec.matches(at(2025, 3, 1, 17, 0)));
        assert!(!spec.matches(at(2025, 3, 1, 13, 0)));
    }

    #[test]
    fn dom_and_dow_match_as_union_when_both_restricted() {
        // 13th of the month OR a Friday
        let spec = CronSpec::parse("0 0 13 * 5").unwrap();
        // 2025-06-13 is a Friday, but 2025-06-06 (Friday, not the 13th) must
        // also match, as must 2025-07-13 (a Sunday).
        assert!(spec.matches(at(2025, 6, 6, 0, 0)));
        assert!(spec.matches(at(2025, 7, 13, 0, 0)));
        assert!(!spec.matches(at(2025, 6, 12, 0, 0)));
    }

    #[test]
    fn leap_day_spec_reaches_the_next_leap_year() {
        let spec = CronSpec::parse("0 0 29 2 *").unwrap();
        let next = spec.next_after(at(2025, 3, 1, 0, 0)).unwrap();
        assert_eq!(next, at(2028, 2, 29, 0, 0));
    }
}
