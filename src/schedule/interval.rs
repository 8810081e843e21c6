//! # Interval strategies.
//!
//! An [`Interval`] is a pure value answering "when is the next firing after `last`?".
//! It holds no state: whoever drives it (the [`WithRepeat`](crate::WithRepeat) loop or the
//! [`Scheduler`](crate::Scheduler)) owns the "last ran at" fact, so one strategy value can be
//! shared across jobs.
//!
//! | Strategy    | `next_after(last)`                                               |
//! |-------------|------------------------------------------------------------------|
//! | [`Every`]   | `last + D`                                                       |
//! | [`Daily`]   | first local `hh:mm` strictly after `last`                        |
//! | [`Monthly`] | first local `day hh:mm` strictly after `last`, day clamped       |
//!
//! `until_next(last, now) = next_after(last) - now`, which is `<= 0` when overdue.
//!
//! ## Calendar rules
//! - Local times that do not exist (DST gap) are skipped: the next day (or month) that has
//!   them is used instead.
//! - Ambiguous local times (DST overlap) resolve to the earliest instant.
//! - `Monthly` days beyond a month's length round down to its last day (31 → Feb 28/29).

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::IntervalError;

/// Upper bound on calendar search steps (covers any run of DST-gap days/months).
const MAX_SEARCH_STEPS: usize = 32;

/// Computes the next firing time from the previous one.
pub trait Interval: Send + Sync + fmt::Debug + 'static {
    /// The first firing instant strictly after `last` (or `last + D` for fixed intervals).
    fn next_after(&self, last: DateTime<Utc>) -> DateTime<Utc>;

    /// Signed delay from `now` until the next firing; `<= 0` means overdue.
    fn until_next(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> TimeDelta {
        self.next_after(last).signed_duration_since(now)
    }
}

impl<T: Interval + ?Sized> Interval for Arc<T> {
    fn next_after(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        (**self).next_after(last)
    }
}

/// Fixed interval.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use chrono::{TimeZone, Utc};
/// use runlet::{Every, Interval};
///
/// let every = Every(Duration::from_secs(60));
/// let last = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 2, 0).unwrap();
/// assert_eq!(every.until_next(last, now).num_seconds(), -60);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Every(pub Duration);

impl Interval for Every {
    fn next_after(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        TimeDelta::from_std(self.0)
            .ok()
            .and_then(|d| last.checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl From<Duration> for Every {
    fn from(d: Duration) -> Self {
        Every(d)
    }
}

/// Daily at `hour:minute` in `tz`.
///
/// # Example
/// ```
/// use chrono::{Datelike, TimeZone, Timelike, Utc};
/// use chrono_tz::Europe::Berlin;
/// use runlet::{Daily, Interval};
///
/// let daily = Daily::new(3, 30, Berlin).unwrap();
/// let last = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
/// let next = daily.next_after(last).with_timezone(&Berlin);
/// assert_eq!((next.day(), next.hour(), next.minute()), (2, 3, 30));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Daily {
    hour: u32,
    minute: u32,
    tz: Tz,
}

impl Daily {
    /// Validates `hour < 24` and `minute < 60`.
    pub fn new(hour: u32, minute: u32, tz: Tz) -> Result<Self, IntervalError> {
        check_time(hour, minute)?;
        Ok(Self { hour, minute, tz })
    }

    /// Daily at `hour:minute` UTC.
    pub fn utc(hour: u32, minute: u32) -> Result<Self, IntervalError> {
        Self::new(hour, minute, Tz::UTC)
    }
}

impl Interval for Daily {
    fn next_after(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        let mut date = last.with_timezone(&self.tz).date_naive();
        for _ in 0..MAX_SEARCH_STEPS {
            if let Some(at) = resolve(&self.tz, date, self.hour, self.minute) {
                if at > last {
                    return at;
                }
            }
            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
        DateTime::<Utc>::MAX_UTC
    }
}

/// Monthly on `day` at `hour:minute` in `tz`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Monthly {
    day: u32,
    hour: u32,
    minute: u32,
    tz: Tz,
}

impl Monthly {
    /// Validates `1 <= day <= 31`, `hour < 24` and `minute < 60`.
    pub fn new(day: u32, hour: u32, minute: u32, tz: Tz) -> Result<Self, IntervalError> {
        if !(1..=31).contains(&day) {
            return Err(IntervalError::OutOfRange {
                field: "day",
                value: day,
            });
        }
        check_time(hour, minute)?;
        Ok(Self {
            day,
            hour,
            minute,
            tz,
        })
    }

    /// Monthly on `day` at `hour:minute` UTC.
    pub fn utc(day: u32, hour: u32, minute: u32) -> Result<Self, IntervalError> {
        Self::new(day, hour, minute, Tz::UTC)
    }
}

impl Interval for Monthly {
    fn next_after(&self, last: DateTime<Utc>) -> DateTime<Utc> {
        let local = last.with_timezone(&self.tz);
        let (mut year, mut month) = (local.year(), local.month());
        for _ in 0..MAX_SEARCH_STEPS {
            let day = self.day.min(days_in_month(year, month));
            let at = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| resolve(&self.tz, date, self.hour, self.minute));
            if let Some(at) = at {
                if at > last {
                    return at;
                }
            }
            (year, month) = if month == 12 {
                (year + 1, 1)
            } else {
                (year, month + 1)
            };
        }
        DateTime::<Utc>::MAX_UTC
    }
}

fn check_time(hour: u32, minute: u32) -> Result<(), IntervalError> {
    if hour >= 24 {
        return Err(IntervalError::OutOfRange {
            field: "hour",
            value: hour,
        });
    }
    if minute >= 60 {
        return Err(IntervalError::OutOfRange {
            field: "minute",
            value: minute,
        });
    }
    Ok(())
}

/// Local `date hour:minute` in `tz` as UTC; `None` inside a DST gap.
fn resolve(tz: &Tz, date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|first| first.pred_opt())
        .map_or(28, |last| last.day())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::America::New_York;
    use chrono_tz::Europe::Berlin;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_every_adds_duration() {
        let every = Every(Duration::from_secs(3600));
        let last = utc(2024, 1, 1, 10, 0);
        assert_eq!(every.next_after(last), utc(2024, 1, 1, 11, 0));
        assert_eq!(every.until_next(last, utc(2024, 1, 1, 10, 30)).num_minutes(), 30);
        assert!(every.until_next(last, utc(2024, 1, 1, 12, 0)) < TimeDelta::zero());
    }

    #[test]
    fn test_daily_same_day_and_next_day() {
        let daily = Daily::utc(9, 15).unwrap();
        assert_eq!(daily.next_after(utc(2024, 1, 1, 8, 0)), utc(2024, 1, 1, 9, 15));
        assert_eq!(daily.next_after(utc(2024, 1, 1, 9, 15)), utc(2024, 1, 2, 9, 15));
        assert_eq!(daily.next_after(utc(2024, 12, 31, 23, 0)), utc(2025, 1, 1, 9, 15));
    }

    #[test]
    fn test_daily_respects_location() {
        let daily = Daily::new(8, 0, Berlin).unwrap();
        // 06:00 UTC in winter is 07:00 Berlin, so 08:00 Berlin = 07:00 UTC today.
        assert_eq!(daily.next_after(utc(2024, 1, 10, 6, 0)), utc(2024, 1, 10, 7, 0));
        // In summer Berlin is UTC+2.
        assert_eq!(daily.next_after(utc(2024, 7, 10, 6, 30)), utc(2024, 7, 11, 6, 0));
    }

    #[test]
    fn test_daily_skips_dst_gap() {
        // 2024-03-10 02:30 does not exist in New York.
        let daily = Daily::new(2, 30, New_York).unwrap();
        let next = daily.next_after(utc(2024, 3, 9, 12, 0)).with_timezone(&New_York);
        assert_eq!((next.day(), next.hour(), next.minute()), (11, 2, 30));
    }

    #[test]
    fn test_daily_overdue_is_negative() {
        let daily = Daily::utc(0, 0).unwrap();
        let last = utc(2024, 1, 1, 12, 0);
        assert!(daily.until_next(last, utc(2024, 1, 5, 0, 0)) < TimeDelta::zero());
    }

    #[test]
    fn test_monthly_rounds_down_short_months() {
        let monthly = Monthly::utc(31, 6, 0).unwrap();
        assert_eq!(monthly.next_after(utc(2024, 1, 31, 6, 0)), utc(2024, 2, 29, 6, 0));
        assert_eq!(monthly.next_after(utc(2023, 1, 31, 7, 0)), utc(2023, 2, 28, 6, 0));
        assert_eq!(monthly.next_after(utc(2024, 4, 1, 0, 0)), utc(2024, 4, 30, 6, 0));
        assert_eq!(monthly.next_after(utc(2024, 12, 31, 6, 0)), utc(2025, 1, 31, 6, 0));
    }

    #[test]
    fn test_round_trip_hits_configured_wall_clock() {
        let monthly = Monthly::new(15, 4, 45, Berlin).unwrap();
        let daily = Daily::new(23, 5, New_York).unwrap();
        let mut last = utc(2023, 11, 20, 0, 0);
        for _ in 0..24 {
            let m = monthly.next_after(last);
            let d = daily.next_after(last);
            assert!(m > last && d > last);

            let ml = m.with_timezone(&Berlin);
            assert_eq!((ml.day(), ml.hour(), ml.minute()), (15, 4, 45));
            let dl = d.with_timezone(&New_York);
            assert_eq!((dl.hour(), dl.minute()), (23, 5));

            last = d + TimeDelta::days(13);
        }
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Daily::utc(24, 0),
            Err(IntervalError::OutOfRange {
                field: "hour",
                value: 24
            })
        );
        assert!(Daily::utc(0, 60).is_err());
        assert!(Monthly::utc(0, 0, 0).is_err());
        assert!(Monthly::utc(32, 0, 0).is_err());
        assert!(Monthly::utc(31, 23, 59).is_ok());
    }

    #[test]
    fn test_zero_time_start() {
        let monthly = Monthly::utc(1, 0, 0).unwrap();
        assert_eq!(monthly.next_after(DateTime::<Utc>::UNIX_EPOCH), utc(1970, 2, 1, 0, 0));
    }
}
