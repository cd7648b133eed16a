//! Five-field cron expressions and next-occurrence search.
//!
//! Fields are minute (0-59), hour (0-23), day of month (1-31), month (1-12)
//! and day of week (0-7, both 0 and 7 meaning Sunday). Each field is a comma
//! list of `*`, `N` or `A-B` items, any of which may carry a `/STEP`. Month
//! and weekday fields also take three-letter English names.
//!
//! Day matching follows traditional cron: when both the day-of-month and
//! day-of-week fields are restricted (do not start with `*`), a day matches
//! if *either* field matches.

use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, SchedulerError};

/// How far ahead `next_after` looks before concluding a schedule never fires.
/// Long enough to cover every leap day.
const SEARCH_YEARS: i64 = 8;

const MONTH_NAMES: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

struct Field {
    name: &'static str,
    min: u32,
    max: u32,
    names: &'static [&'static str],
    /// Numeric value of `names[0]`.
    name_base: u32,
}

const MINUTE: Field = Field {
    name: "minute",
    min: 0,
    max: 59,
    names: &[],
    name_base: 0,
};
const HOUR: Field = Field {
    name: "hour",
    min: 0,
    max: 23,
    names: &[],
    name_base: 0,
};
const DAY_OF_MONTH: Field = Field {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    name_base: 0,
};
const MONTH: Field = Field {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    name_base: 1,
};
const DAY_OF_WEEK: Field = Field {
    name: "day-of-week",
    min: 0,
    max: 7,
    names: &DAY_NAMES,
    name_base: 0,
};

impl Field {
    /// Parse a whole field into a bit set of allowed values.
    fn parse(&self, text: &str) -> Result<u64> {
        let mut mask = 0u64;
        for item in text.split(',') {
            mask |= self.parse_item(item)?;
        }
        Ok(mask)
    }

    fn parse_item(&self, item: &str) -> Result<u64> {
        let (range, step) = match item.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| self.error(item, "step is not a number"))?;
                if step == 0 {
                    return Err(self.error(item, "step must be at least 1"));
                }
                (range, Some(step))
            }
            None => (item, None),
        };

        let (lo, hi) = if range == "*" {
            (self.min, self.max)
        } else if let Some((a, b)) = range.split_once('-') {
            (self.value(a, item)?, self.value(b, item)?)
        } else {
            let v = self.value(range, item)?;
            // `N/STEP` runs from N to the end of the field.
            if step.is_some() {
                (v, self.max)
            } else {
                (v, v)
            }
        };

        if lo > hi {
            return Err(self.error(item, "range start is after range end"));
        }

        let step = step.unwrap_or(1);
        let mut mask = 0u64;
        let mut v = lo;
        while v <= hi {
            mask |= 1u64 << v;
            v += step;
        }
        Ok(mask)
    }

    fn value(&self, token: &str, item: &str) -> Result<u32> {
        let v = match token.parse::<u32>() {
            Ok(v) => v,
            Err(_) => self
                .names
                .iter()
                .position(|n| n.eq_ignore_ascii_case(token))
                .map(|i| i as u32 + self.name_base)
                .ok_or_else(|| self.error(item, "not a number or known name"))?,
        };
        if v < self.min || v > self.max {
            return Err(self.error(
                item,
                &format!("value {v} outside {}-{}", self.min, self.max),
            ));
        }
        Ok(v)
    }

    fn error(&self, item: &str, why: &str) -> SchedulerError {
        SchedulerError::InvalidSchedule(format!("{} field '{item}': {why}", self.name))
    }
}

fn bit(mask: u64, v: u32) -> bool {
    mask & (1u64 << v) != 0
}

/// A parsed cron expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronSchedule {
    expr: String,
    minutes: u64,
    hours: u64,
    days: u64,
    months: u64,
    /// Bits 0-6, Sunday = 0. A `7` in the source is folded onto bit 0.
    weekdays: u64,
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronSchedule {
    pub fn parse(expr: &str) -> Result<Self> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(SchedulerError::InvalidSchedule(format!(
                "expected 5 fields (minute hour day-of-month month day-of-week), got {}: '{expr}'",
                fields.len()
            )));
        }

        let mut weekdays = DAY_OF_WEEK.parse(fields[4])?;
        if bit(weekdays, 7) {
            weekdays = (weekdays & !(1u64 << 7)) | 1;
        }

        Ok(Self {
            expr: fields.join(" "),
            minutes: MINUTE.parse(fields[0])?,
            hours: HOUR.parse(fields[1])?,
            days: DAY_OF_MONTH.parse(fields[2])?,
            months: MONTH.parse(fields[3])?,
            weekdays,
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    /// The expression as written, with whitespace normalised.
    pub fn expression(&self) -> &str {
        &self.expr
    }

    /// Whether the wall-clock minute `t` satisfies every field. Seconds are
    /// ignored.
    pub fn matches(&self, t: &NaiveDateTime) -> bool {
        bit(self.minutes, t.minute())
            && bit(self.hours, t.hour())
            && bit(self.months, t.month())
            && self.day_matches(t.date())
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = bit(self.days, date.day());
        let dow = bit(self.weekdays, date.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// The earliest whole minute strictly after `from` that matches, in
    /// `from`'s time zone.
    ///
    /// Wall-clock times skipped by a DST jump are never returned; a repeated
    /// wall-clock time resolves to its earliest instant still after `from`.
    /// Returns `None` when nothing matches within eight years.
    pub fn next_after<Tz: TimeZone>(&self, from: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let tz = from.timezone();
        let mut t = from.naive_local().with_second(0)?.with_nanosecond(0)? + Duration::minutes(1);
        let limit = t + Duration::days(366 * SEARCH_YEARS);

        while t <= limit {
            if !bit(self.months, t.month()) {
                t = first_of_next_month(t.date())?;
                continue;
            }
            if !self.day_matches(t.date()) {
                t = t.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !bit(self.hours, t.hour()) {
                t = t.with_minute(0)? + Duration::hours(1);
                continue;
            }
            if bit(self.minutes, t.minute()) {
                match tz.from_local_datetime(&t) {
                    LocalResult::Single(dt) if dt > *from => return Some(dt),
                    LocalResult::Ambiguous(early, late) => {
                        if early > *from {
                            return Some(early);
                        }
                        if late > *from {
                            return Some(late);
                        }
                    }
                    _ => {}
                }
            }
            t += Duration::minutes(1);
        }
        None
    }
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDateTime> {
    let (y, m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)
}

impl FromStr for CronSchedule {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for CronSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn next(expr: &str, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        CronSchedule::parse(expr).unwrap().next_after(&from)
    }

    #[test]
    fn rejects_malformed_expressions() {
        for expr in [
            "",
            "* * * *",
            "* * * * * *",
            "60 * * * *",
            "* 24 * * *",
            "* * 0 * *",
            "* * 32 * *",
            "* * * 13 *",
            "* * * * 8",
            "*/0 * * * *",
            "5-1 * * * *",
            "1,,2 * * * *",
            "a * * * *",
            "* * * foo *",
            "-5 * * * *",
        ] {
            let err = CronSchedule::parse(expr).unwrap_err();
            assert_eq!(err.code(), "INVALID_SCHEDULE", "{expr:?} should be rejected");
        }
    }

    #[test]
    fn daily_at_fixed_time() {
        assert_eq!(
            next("0 2 * * *", at(2024, 3, 10, 1, 59, 30)),
            Some(at(2024, 3, 10, 2, 0, 0))
        );
        // Exactly on the due minute moves to the next day.
        assert_eq!(
            next("0 2 * * *", at(2024, 3, 10, 2, 0, 0)),
            Some(at(2024, 3, 11, 2, 0, 0))
        );
    }

    #[test]
    fn every_minute_is_strictly_after() {
        assert_eq!(
            next("* * * * *", at(2024, 1, 1, 10, 0, 0)),
            Some(at(2024, 1, 1, 10, 1, 0))
        );
        assert_eq!(
            next("* * * * *", at(2024, 12, 31, 23, 59, 59)),
            Some(at(2025, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn steps_lists_and_names() {
        assert_eq!(
            next("*/15 * * jan,jul *", at(2024, 2, 1, 0, 0, 0)),
            Some(at(2024, 7, 1, 0, 0, 0))
        );
        assert_eq!(
            next("10/20 * * * *", at(2024, 1, 1, 0, 31, 0)),
            Some(at(2024, 1, 1, 0, 50, 0))
        );
        assert_eq!(
            next("0 9-17/4 * * *", at(2024, 1, 1, 13, 0, 0)),
            Some(at(2024, 1, 1, 17, 0, 0))
        );
    }

    #[test]
    fn weekday_only_restriction() {
        // 2024-06-15 is a Saturday.
        assert_eq!(
            next("30 9 * * mon-fri", at(2024, 6, 15, 12, 0, 0)),
            Some(at(2024, 6, 17, 9, 30, 0))
        );
    }

    #[test]
    fn sunday_is_zero_and_seven() {
        let sat = at(2024, 6, 15, 12, 0, 0);
        assert_eq!(next("0 12 * * 7", sat), Some(at(2024, 6, 16, 12, 0, 0)));
        assert_eq!(next("0 12 * * 0", sat), Some(at(2024, 6, 16, 12, 0, 0)));
        assert_eq!(next("0 12 * * SUN", sat), Some(at(2024, 6, 16, 12, 0, 0)));
    }

    #[test]
    fn day_of_month_or_day_of_week_when_both_restricted() {
        // Monday 2024-06-10: the 15th (a Saturday) comes before the next Monday.
        assert_eq!(
            next("0 0 15 * 1", at(2024, 6, 10, 0, 0, 0)),
            Some(at(2024, 6, 15, 0, 0, 0))
        );
        // From the 15th itself the next Monday is closer than the next 15th.
        assert_eq!(
            next("0 0 15 * 1", at(2024, 6, 15, 0, 0, 0)),
            Some(at(2024, 6, 17, 0, 0, 0))
        );
    }

    #[test]
    fn starred_day_of_month_with_step_still_ands() {
        // `*/2` counts as unrestricted, so the weekday must match too.
        // 2024-06-03 is a Monday (odd day); next odd-day Monday is 2024-06-17.
        assert_eq!(
            next("0 0 */2 * 1", at(2024, 6, 3, 0, 0, 0)),
            Some(at(2024, 6, 17, 0, 0, 0))
        );
    }

    #[test]
    fn leap_day_and_impossible_dates() {
        assert_eq!(
            next("0 0 29 2 *", at(2024, 3, 1, 0, 0, 0)),
            Some(at(2028, 2, 29, 0, 0, 0))
        );
        assert_eq!(next("0 0 31 2 *", at(2024, 1, 1, 0, 0, 0)), None);
        assert_eq!(next("0 0 31 4,6,9,11 *", at(2024, 1, 1, 0, 0, 0)), None);
    }

    #[test]
    fn result_is_after_reference_and_matches() {
        let refs = [
            at(2024, 1, 1, 0, 0, 0),
            at(2024, 2, 28, 23, 59, 59),
            at(2024, 6, 15, 12, 34, 56),
            at(2025, 12, 31, 23, 59, 0),
        ];
        for expr in [
            "* * * * *",
            "0 2 * * *",
            "*/7 */5 * * *",
            "15 3 1,15 * *",
            "0 0 * * 6,0",
            "0 12 13 * 5",
            "45 23 * dec *",
            "0 6 1-7 * mon",
        ] {
            let schedule = CronSchedule::parse(expr).unwrap();
            for from in refs {
                let due = schedule.next_after(&from).expect("fires within window");
                assert!(due > from, "{expr} from {from}: {due} not after");
                assert_eq!(due.second(), 0);
                assert!(schedule.matches(&due.naive_local()), "{expr}: {due} does not match");
            }
        }
    }

    #[test]
    fn expression_is_normalised() {
        let schedule: CronSchedule = "  0   2 *  * * ".parse().unwrap();
        assert_eq!(schedule.to_string(), "0 2 * * *");
        assert_eq!(schedule.expression(), "0 2 * * *");
    }

    #[test]
    fn spring_forward_gap_is_skipped() {
        use chrono_tz::America::New_York;

        // 02:00-02:59 does not exist on 2024-03-10.
        let from = New_York.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        let t = CronSchedule::parse("30 2 * * *").unwrap().next_after(&from).unwrap();
        assert_eq!(t, New_York.with_ymd_and_hms(2024, 3, 11, 2, 30, 0).unwrap());
        assert_eq!(t.to_rfc3339(), "2024-03-11T02:30:00-04:00");

        let from = New_York.with_ymd_and_hms(2024, 3, 10, 1, 59, 0).unwrap();
        let t = CronSchedule::parse("* * * * *").unwrap().next_after(&from).unwrap();
        assert_eq!(t.with_timezone(&Utc), at(2024, 3, 10, 7, 0, 0));
        assert_eq!(t.to_rfc3339(), "2024-03-10T03:00:00-04:00");
    }

    #[test]
    fn fall_back_repeat_fires_once_at_earliest_instant() {
        use chrono_tz::America::New_York;

        let schedule = CronSchedule::parse("30 1 * * *").unwrap();
        let from = New_York.with_ymd_and_hms(2024, 11, 3, 0, 0, 0).unwrap();

        let first = schedule.next_after(&from).unwrap();
        assert_eq!(first.to_rfc3339(), "2024-11-03T01:30:00-04:00");
        assert_eq!(first.with_timezone(&Utc), at(2024, 11, 3, 5, 30, 0));

        let second = schedule.next_after(&first).unwrap();
        assert_eq!(second.to_rfc3339(), "2024-11-04T01:30:00-05:00");
        assert_eq!(second, New_York.with_ymd_and_hms(2024, 11, 4, 1, 30, 0).unwrap());
    }
}
