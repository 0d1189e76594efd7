//! Schedule values and next-occurrence computation.
//!
//! A [`Schedule`] is the immutable result of parsing a crontab specification.
//! Its only capability is [`Schedule::next`], which computes the first
//! occurrence strictly after a reference time. The ticker calls it once per
//! delivered tick, always passing the previously *scheduled* time, so
//! delivery delay never shifts the sequence.

use std::time::Duration;

use chrono::{DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

/// Bit recording that a field was `*` or `?`. Kept out of the value range
/// (values never exceed 59) so it can ride along in the same mask.
pub(crate) const STAR_BIT: u64 = 1 << 63;

/// How far past the reference time to search before giving up. Some field
/// combinations (e.g. February 30th) never occur.
const YEAR_HORIZON: i32 = 5;

/// A parsed recurrence rule.
///
/// `Schedule` is `Copy` and never mutated; a ticker reset replaces it
/// wholesale. Both variants come out of [`Parser::parse`](crate::parser::Parser::parse):
/// field-based specifications and most `@`-descriptors produce [`Schedule::Cron`],
/// while `@every <duration>` produces [`Schedule::Every`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// A crontab rule over second/minute/hour/day/month/weekday fields,
    /// optionally pinned to an IANA timezone via a `TZ=` prefix.
    Cron(CronSchedule),
    /// A fixed delay between occurrences (`@every`).
    Every(EverySchedule),
}

impl Schedule {
    /// Returns the first occurrence strictly after `after`, or `None` if no
    /// occurrence exists within the search horizon.
    ///
    /// This is a pure function: the same schedule and reference time always
    /// produce the same result.
    pub fn next(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        match self {
            Schedule::Cron(cron) => cron.next(after),
            Schedule::Every(every) => every.next(after),
        }
    }
}

/// A crontab rule stored as one bitmask per field: bit N set means the field
/// matches value N. Months and days-of-month are 1-based, weekdays are
/// 0-based with Sunday = 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronSchedule {
    pub(crate) second: u64,
    pub(crate) minute: u64,
    pub(crate) hour: u64,
    pub(crate) dom: u64,
    pub(crate) month: u64,
    pub(crate) dow: u64,
    /// Timezone the rule is evaluated in. `None` means the system local zone.
    pub(crate) tz: Option<Tz>,
}

impl CronSchedule {
    fn next(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        match self.tz {
            Some(tz) => self
                .next_in(&tz, after.with_timezone(&tz).naive_local())
                .map(|t| t.with_timezone(&Local)),
            None => self.next_in(&Local, after.naive_local()),
        }
    }

    /// Computes the next occurrence in `tz`'s wall clock and resolves it to
    /// an instant. Wall-clock times swallowed by a DST gap are skipped;
    /// times repeated by a fall-back transition resolve to the earlier
    /// instant.
    fn next_in<Z: TimeZone>(&self, tz: &Z, after: NaiveDateTime) -> Option<DateTime<Z>> {
        let mut cursor = after;
        for _ in 0..8 {
            let candidate = self.next_naive(cursor)?;
            match tz.from_local_datetime(&candidate) {
                LocalResult::Single(t) => return Some(t),
                LocalResult::Ambiguous(earliest, _) => return Some(earliest),
                LocalResult::None => cursor = candidate,
            }
        }
        None
    }

    /// Field-stepping search over wall-clock time.
    ///
    /// Starting from the next whole second, each field is advanced until it
    /// matches its mask, most significant first. The first advance of a
    /// field truncates everything below it; whenever a field wraps, the scan
    /// restarts so the higher fields are re-validated.
    fn next_naive(&self, after: NaiveDateTime) -> Option<NaiveDateTime> {
        let mut t = after.with_nanosecond(0).unwrap_or(after) + chrono::Duration::seconds(1);
        let year_limit = t.year() + YEAR_HORIZON;
        let mut added = false;

        'wrap: loop {
            if t.year() > year_limit {
                return None;
            }

            while self.month & (1 << t.month()) == 0 {
                if !added {
                    added = true;
                    t = start_of_month(t)?;
                }
                t = next_month(t)?;
                if t.month() == 1 {
                    continue 'wrap;
                }
            }

            while !self.day_matches(&t) {
                if !added {
                    added = true;
                    t = t.date().and_time(NaiveTime::MIN);
                }
                t += chrono::Duration::days(1);
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while self.hour & (1 << t.hour()) == 0 {
                if !added {
                    added = true;
                    t = t.with_minute(0)?.with_second(0)?;
                }
                t += chrono::Duration::hours(1);
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while self.minute & (1 << t.minute()) == 0 {
                if !added {
                    added = true;
                    t = t.with_second(0)?;
                }
                t += chrono::Duration::minutes(1);
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            while self.second & (1 << t.second()) == 0 {
                added = true;
                t += chrono::Duration::seconds(1);
                if t.second() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t);
        }
    }

    /// Day matching honors both day fields: when either was written as
    /// `*`/`?`, both must agree; when both are restricted, matching either
    /// one suffices (the traditional crontab rule).
    fn day_matches(&self, t: &NaiveDateTime) -> bool {
        let dom_match = self.dom & (1 << t.day()) > 0;
        let dow_match = self.dow & (1 << t.weekday().num_days_from_sunday()) > 0;
        if self.dom & STAR_BIT > 0 || self.dow & STAR_BIT > 0 {
            dom_match && dow_match
        } else {
            dom_match || dow_match
        }
    }
}

/// A constant delay between occurrences, at whole-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EverySchedule {
    delay: Duration,
}

impl EverySchedule {
    /// Rounds `delay` down to whole seconds, with a one-second floor.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: Duration::from_secs(delay.as_secs().max(1)),
        }
    }

    /// The effective whole-second delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn next(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let truncated = after.with_nanosecond(0).unwrap_or(after);
        truncated.checked_add_signed(chrono::Duration::from_std(self.delay).ok()?)
    }
}

fn start_of_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    Some(NaiveDate::from_ymd_opt(t.year(), t.month(), 1)?.and_time(NaiveTime::MIN))
}

fn next_month(t: NaiveDateTime) -> Option<NaiveDateTime> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    Some(NaiveDate::from_ymd_opt(year, month, 1)?.and_time(NaiveTime::MIN))
}
