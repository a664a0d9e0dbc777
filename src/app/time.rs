//! Week numbering, DST compensation and small date helpers.
//!
//! Weeks follow ISO-8601: they start on Monday and week 1 is the week holding
//! the year's first Thursday, so a year has 52 or 53 weeks. Week pointers are
//! derived from the UTC calendar date.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct WeekPointer {
    year: i32,
    week: u32,
}

impl WeekPointer {
    #[cfg(test)]
    pub(crate) fn new(year: i32, week: u32) -> Option<Self> {
        (1..=weeks_in_year(year))
            .contains(&week)
            .then_some(Self { year, week })
    }

    pub(crate) fn year(self) -> i32 {
        self.year
    }

    pub(crate) fn week(self) -> u32 {
        self.week
    }

    /// UTC midnight opening this week's Monday.
    pub(crate) fn starts_at(self) -> Option<DateTime<Utc>> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
            .map(|monday| monday.and_time(NaiveTime::MIN).and_utc())
    }

    pub(crate) fn next(self) -> Self {
        self.shifted(1)
    }

    /// Moves by `weeks` (negative goes back), wrapping at each year's real week count.
    pub(crate) fn shifted(self, weeks: i64) -> Self {
        let mut year = self.year;
        let mut week = i64::from(self.week) + weeks;
        while week < 1 {
            year -= 1;
            week += i64::from(weeks_in_year(year));
        }
        loop {
            let in_year = i64::from(weeks_in_year(year));
            if week <= in_year {
                break;
            }
            week -= in_year;
            year += 1;
        }
        Self {
            year,
            week: week as u32,
        }
    }
}

impl fmt::Display for WeekPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Year {}, Week {}", self.year, self.week)
    }
}

pub(crate) fn weeks_in_year(year: i32) -> u32 {
    // 28 December always falls in the last ISO week of its year.
    NaiveDate::from_ymd_opt(year, 12, 28).map_or(52, |date| date.iso_week().week())
}

pub(crate) fn current_year_and_week(now: DateTime<Utc>) -> WeekPointer {
    let iso = now.date_naive().iso_week();
    WeekPointer {
        year: iso.year(),
        week: iso.week(),
    }
}

/// Signed number of weeks from `from` to `to`.
pub(crate) fn weeks_difference(from: WeekPointer, to: WeekPointer) -> i64 {
    if from > to {
        return -weeks_difference(to, from);
    }
    let mut total = 0_i64;
    let mut year = from.year;
    while year < to.year {
        total += i64::from(weeks_in_year(year));
        year += 1;
    }
    total + i64::from(to.week) - i64::from(from.week)
}

/// The only way reconcilers touch DST rules.
pub(crate) trait DisplayTime {
    /// Corrects `shifted`, computed from `origin` by fixed-length arithmetic,
    /// so it shows the same civil wall-clock time as `origin`.
    fn normalize_display_time(
        &self,
        origin: DateTime<Utc>,
        shifted: DateTime<Utc>,
    ) -> DateTime<Utc>;

    fn start_of_display_day(&self, at: DateTime<Utc>) -> DateTime<Utc>;

    /// Shifts `at` by whole weekly release intervals, keeping its wall-clock time.
    /// `inclusive` snaps the result to the start of its civil day.
    fn past(&self, at: DateTime<Utc>, weeks: i64, inclusive: bool) -> DateTime<Utc> {
        let shifted = self.normalize_display_time(at, at + Duration::weeks(weeks));
        if inclusive {
            self.start_of_display_day(shifted)
        } else {
            shifted
        }
    }

    fn days_ago(&self, now: DateTime<Utc>, days: i64, inclusive: bool) -> DateTime<Utc> {
        let days = days.clamp(0, 36_500);
        let shifted = self.normalize_display_time(now, now - Duration::days(days));
        if inclusive {
            self.start_of_display_day(shifted)
        } else {
            shifted
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DstWindow {
    pub(crate) start: DateTime<Utc>,
    pub(crate) end: DateTime<Utc>,
}

impl DstWindow {
    pub(crate) fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

/// A zone following the US daylight saving rule: DST runs from the second
/// Sunday of March, 02:00 standard time, to the first Sunday of November,
/// 02:00 daylight time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReferenceZone {
    standard_offset_hours: i64,
    daylight_offset_hours: i64,
}

impl ReferenceZone {
    pub(crate) const US_EASTERN: Self = Self {
        standard_offset_hours: -5,
        daylight_offset_hours: -4,
    };

    fn standard_offset(&self) -> Duration {
        Duration::hours(self.standard_offset_hours)
    }

    fn daylight_offset(&self) -> Duration {
        Duration::hours(self.daylight_offset_hours)
    }

    pub(crate) fn dst_start_end_dates(&self, year: i32) -> Option<DstWindow> {
        let start_day = NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2)?;
        let end_day = NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1)?;
        let start = start_day.and_hms_opt(2, 0, 0)?.and_utc() - self.standard_offset();
        let end = end_day.and_hms_opt(2, 0, 0)?.and_utc() - self.daylight_offset();
        Some(DstWindow { start, end })
    }

    pub(crate) fn offset_at(&self, at: DateTime<Utc>) -> Duration {
        match self.dst_start_end_dates(at.year()) {
            Some(window) if window.contains(at) => self.daylight_offset(),
            _ => self.standard_offset(),
        }
    }

    pub(crate) fn to_local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        (at + self.offset_at(at)).naive_utc()
    }

    pub(crate) fn is_dst_transition_month(&self, at: DateTime<Utc>) -> bool {
        let local = self.to_local(at);
        self.dst_start_end_dates(local.year()).is_some_and(|window| {
            [window.start, window.end]
                .into_iter()
                .any(|edge| self.to_local(edge).month() == local.month())
        })
    }

    pub(crate) fn fix_time(&self, origin: DateTime<Utc>, shifted: DateTime<Utc>) -> DateTime<Utc> {
        shifted + (self.offset_at(origin) - self.offset_at(shifted))
    }
}

impl DisplayTime for ReferenceZone {
    fn normalize_display_time(
        &self,
        origin: DateTime<Utc>,
        shifted: DateTime<Utc>,
    ) -> DateTime<Utc> {
        self.fix_time(origin, shifted)
    }

    fn start_of_display_day(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let midnight = self.to_local(at).date().and_time(NaiveTime::MIN).and_utc();
        let guess = midnight - self.offset_at(at);
        midnight - self.offset_at(guess)
    }
}

pub(crate) fn format_duration(elapsed: std::time::Duration) -> String {
    let millis = elapsed.as_millis();
    if millis < 1_000 {
        return format!("{millis}ms");
    }
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3_600, (secs % 3_600) / 60, secs % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}.{}s", (millis % 1_000) / 100)
    }
}
