use std::collections::HashSet;
use std::sync::{Condvar, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::model::{AnimeDetail, Candidate, RawRecord};
use super::time::WeekPointer;
use super::window::WeekWindow;
use crate::error::SyncError;
use crate::http::{RetryPolicy, get_authorized_text};

pub(crate) trait TimetableSource {
    /// Dub timetable for one week; `None` when the source has no data for it.
    fn fetch_week(&self, week: WeekPointer) -> Result<Option<Vec<RawRecord>>, SyncError>;

    fn fetch_route(&self, route: &str) -> Result<Option<AnimeDetail>, SyncError>;
}

pub(crate) struct AnimeScheduleClient {
    base_url: String,
    token: String,
    retry: RetryPolicy,
}

impl AnimeScheduleClient {
    pub(crate) fn new(base_url: &str, token: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    #[cfg(test)]
    fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn get(
        &self,
        target: &str,
        path: &str,
        query: &[(String, String)],
    ) -> Result<Option<String>, SyncError> {
        let url = format!("{}/{path}", self.base_url);
        get_authorized_text(&url, &self.token, query, self.retry).map_err(|reason| {
            SyncError::RemoteUnavailable {
                target: target.to_string(),
                reason,
            }
        })
    }
}

impl TimetableSource for AnimeScheduleClient {
    fn fetch_week(&self, week: WeekPointer) -> Result<Option<Vec<RawRecord>>, SyncError> {
        let target = format!("dub timetables for {week}");
        let query = vec![
            ("year".to_string(), week.year().to_string()),
            ("week".to_string(), week.week().to_string()),
        ];
        let Some(body) = self.get(&target, "timetables/dub", &query)? else {
            return Ok(None);
        };
        // The API answers an empty week with `null`.
        let records: Option<Vec<RawRecord>> = serde_json::from_str(&body)
            .map_err(|source| SyncError::MalformedResponse { target, source })?;
        Ok(records)
    }

    fn fetch_route(&self, route: &str) -> Result<Option<AnimeDetail>, SyncError> {
        let target = format!("anime route for {route}");
        let Some(body) = self.get(&target, &format!("anime/{route}"), &[])? else {
            return Ok(None);
        };
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|source| SyncError::MalformedResponse { target, source })
    }
}

/// Suspension between remote calls, swappable in tests.
pub(crate) trait Pause {
    fn pause(&self, duration: Duration);
}

pub(crate) struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, Clone)]
enum CacheSlot {
    Empty,
    Pending(WeekPointer),
    Ready(WeekPointer, Option<Vec<RawRecord>>),
}

/// Single-slot cache for the previous week's timetable. A caller asking for
/// the week that is already being fetched waits for that fetch instead of
/// issuing its own.
pub(crate) struct PreviousWeekCache {
    slot: Mutex<CacheSlot>,
    ready: Condvar,
}

impl Default for PreviousWeekCache {
    fn default() -> Self {
        Self {
            slot: Mutex::new(CacheSlot::Empty),
            ready: Condvar::new(),
        }
    }
}

impl PreviousWeekCache {
    pub(crate) fn get_or_fetch<F>(
        &self,
        week: WeekPointer,
        fetch: F,
    ) -> Result<Option<Vec<RawRecord>>, SyncError>
    where
        F: FnOnce() -> Result<Option<Vec<RawRecord>>, SyncError>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match &*slot {
                CacheSlot::Ready(cached, value) if *cached == week => {
                    debug!("reusing cached timetable for {week}");
                    return Ok(value.clone());
                }
                CacheSlot::Pending(_) => {
                    slot = self
                        .ready
                        .wait(slot)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                _ => break,
            }
        }
        *slot = CacheSlot::Pending(week);
        drop(slot);

        let result = fetch();

        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        *slot = match &result {
            Ok(value) => CacheSlot::Ready(week, value.clone()),
            Err(_) => CacheSlot::Empty,
        };
        self.ready.notify_all();
        result
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FetchOutcome {
    /// Deduplicated by route, first occurrence wins.
    pub(crate) candidates: Vec<Candidate>,
    pub(crate) weeks_planned: usize,
    pub(crate) weeks_fetched: usize,
    pub(crate) weeks_without_data: usize,
}

impl FetchOutcome {
    /// Removals may only be inferred once every planned week was fetched.
    pub(crate) fn complete(&self) -> bool {
        self.weeks_fetched == self.weeks_planned
    }

    pub(crate) fn push_records(&mut self, records: Vec<RawRecord>) {
        let mut seen = self
            .candidates
            .iter()
            .map(|candidate| candidate.entry.route.clone())
            .collect::<HashSet<_>>();
        for record in records {
            let label = record
                .route
                .clone()
                .or_else(|| record.title.clone())
                .unwrap_or_else(|| "<unnamed>".to_string());
            let Some(candidate) = record.into_candidate() else {
                warn!("Skipping timetable record {label}: missing title or episode date");
                continue;
            };
            if seen.insert(candidate.entry.route.clone()) {
                self.candidates.push(candidate);
            }
        }
    }
}

/// Fetches every week of `window` in ascending order, pausing after each call.
pub(crate) fn fetch_window(
    source: &impl TimetableSource,
    window: WeekWindow,
    previous: WeekPointer,
    cache: &PreviousWeekCache,
    pause: &impl Pause,
    delay: Duration,
) -> Result<FetchOutcome, SyncError> {
    let mut outcome = FetchOutcome {
        weeks_planned: window.len(),
        ..FetchOutcome::default()
    };

    for week in window.weeks() {
        info!("Fetching dub timetables for {week}...");
        let fetched = if week == previous {
            cache.get_or_fetch(week, || source.fetch_week(week))?
        } else {
            source.fetch_week(week)?
        };
        match fetched {
            Some(records) => outcome.push_records(records),
            None => {
                debug!("no dub timetable published for {week}");
                outcome.weeks_without_data += 1;
            }
        }
        outcome.weeks_fetched += 1;
        pause.pause(delay);
    }

    Ok(outcome)
}

/// Fills missing episode totals and alternate names for routes not seen before.
pub(crate) fn enrich_new_routes(
    source: &impl TimetableSource,
    candidates: &mut [Candidate],
    known_routes: &HashSet<String>,
    pause: &impl Pause,
    delay: Duration,
) -> Result<usize, SyncError> {
    let mut enriched = 0;
    for candidate in candidates.iter_mut() {
        let entry = &mut candidate.entry;
        if !candidate.route_known
            || entry.episodes.is_some()
            || known_routes.contains(&entry.route)
        {
            continue;
        }
        info!("Fetching anime details for new route {}...", entry.route);
        let detail = source.fetch_route(&entry.route)?;
        pause.pause(delay);
        let Some(detail) = detail else {
            continue;
        };
        entry.episodes = detail.episodes.filter(|total| *total > 0);
        entry.english = entry.english.take().or(detail.names.english);
        entry.romaji = entry.romaji.take().or(detail.names.romaji);
        entry.native = entry.native.take().or(detail.names.native);
        if entry.title.is_empty()
            && let Some(title) = detail.title
        {
            entry.title = title;
        }
        enriched += 1;
    }
    Ok(enriched)
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use super::*;

    #[derive(Default)]
    pub(crate) struct FakeSource {
        pub(crate) weeks: HashMap<WeekPointer, Vec<RawRecord>>,
        pub(crate) routes: HashMap<String, AnimeDetail>,
        pub(crate) fail_on: Option<WeekPointer>,
        pub(crate) week_calls: RefCell<Vec<WeekPointer>>,
        pub(crate) route_calls: RefCell<Vec<String>>,
    }

    impl TimetableSource for FakeSource {
        fn fetch_week(&self, week: WeekPointer) -> Result<Option<Vec<RawRecord>>, SyncError> {
            self.week_calls.borrow_mut().push(week);
            if self.fail_on == Some(week) {
                return Err(SyncError::RemoteUnavailable {
                    target: week.to_string(),
                    reason: "HTTP status 500".to_string(),
                });
            }
            Ok(self.weeks.get(&week).cloned())
        }

        fn fetch_route(&self, route: &str) -> Result<Option<AnimeDetail>, SyncError> {
            self.route_calls.borrow_mut().push(route.to_string());
            Ok(self.routes.get(route).cloned())
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingPause {
        pub(crate) pauses: RefCell<Vec<Duration>>,
    }

    impl Pause for RecordingPause {
        fn pause(&self, duration: Duration) {
            self.pauses.borrow_mut().push(duration);
        }
    }
}
