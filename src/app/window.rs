use chrono::{DateTime, Utc};

use super::time::{WeekPointer, current_year_and_week, weeks_difference};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WindowPolicy {
    pub(crate) lookback_weeks: u32,
    pub(crate) lookahead_weeks: u32,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            lookback_weeks: 1,
            lookahead_weeks: 1,
        }
    }
}

/// Inclusive range of weeks to fetch, in ascending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WeekWindow {
    pub(crate) start: WeekPointer,
    pub(crate) end: WeekPointer,
}

impl WeekWindow {
    pub(crate) fn len(&self) -> usize {
        usize::try_from(weeks_difference(self.start, self.end) + 1).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, week: WeekPointer) -> bool {
        self.start <= week && week <= self.end
    }

    pub(crate) fn weeks(&self) -> impl Iterator<Item = WeekPointer> + use<> {
        let end = self.end;
        std::iter::successors(Some(self.start), |week| Some(week.next()))
            .take_while(move |week| *week <= end)
    }
}

pub(crate) fn calculate_weeks_to_fetch(now: DateTime<Utc>, policy: WindowPolicy) -> WeekWindow {
    let current = current_year_and_week(now);
    WeekWindow {
        start: current.shifted(-i64::from(policy.lookback_weeks)),
        end: current.shifted(i64::from(policy.lookahead_weeks)),
    }
}

pub(crate) fn previous_week(now: DateTime<Utc>) -> WeekPointer {
    current_year_and_week(now).shifted(-1)
}
