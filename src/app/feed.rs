use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};

use super::model::{AiringStatus, Change, ChangeKind, FeedEvent, FeedRecord, ScheduleEntry};
use super::reconcile::format_date;

#[derive(Debug, Clone, Default)]
pub(crate) struct FeedDiff {
    pub(crate) feed: Vec<FeedRecord>,
    pub(crate) appended: Vec<FeedRecord>,
    pub(crate) changes: Vec<Change>,
    pub(crate) summary: String,
}

/// Which feed records may be retracted: only episodes of routes the snapshot
/// pass just dropped, dated inside the fetched window.
#[derive(Debug, Clone, Default)]
pub(crate) struct RetractionScope {
    pub(crate) routes: HashSet<String>,
    pub(crate) since: DateTime<Utc>,
}

impl RetractionScope {
    pub(crate) fn covers(&self, record: &FeedRecord) -> bool {
        self.routes.contains(&record.route) && record.episode_date >= self.since
    }
}

/// Appends feed events for aired snapshot entries and retractions for
/// episodes inside `scope` whose show vanished from the snapshot. Existing
/// records are never rewritten; a key's current state is its latest record.
pub(crate) fn reconcile_feed(
    snapshot: &[ScheduleEntry],
    prior_feed: &[FeedRecord],
    scope: &RetractionScope,
    now: DateTime<Utc>,
) -> FeedDiff {
    let latest = latest_by_key(prior_feed);

    let mut added = Vec::new();
    let mut modified = Vec::new();
    for entry in snapshot
        .iter()
        .filter(|entry| entry.airing_status == AiringStatus::Aired)
    {
        match latest.get(&(entry.route.as_str(), entry.episode_number)) {
            None => added.push(record_for(entry, FeedEvent::Added, now)),
            Some(previous)
                if previous.event == FeedEvent::Removed
                    || previous.episode_date != entry.episode_date =>
            {
                modified.push(record_for(entry, FeedEvent::Modified, now));
            }
            Some(_) => {}
        }
    }

    let tracked = snapshot
        .iter()
        .map(|entry| entry.route.as_str())
        .collect::<HashSet<_>>();
    let removed = latest
        .values()
        .filter(|previous| {
            previous.event != FeedEvent::Removed
                && !tracked.contains(previous.route.as_str())
                && scope.covers(previous)
        })
        .map(|previous| FeedRecord {
            event: FeedEvent::Removed,
            recorded_at: now,
            ..(*previous).clone()
        })
        .collect::<Vec<_>>();

    let summary = summarize(added.len(), modified.len(), removed.len());
    let mut appended = added;
    appended.extend(modified);
    appended.extend(removed);

    let changes = appended.iter().map(change_for).collect();
    let mut feed = prior_feed.to_vec();
    feed.extend(appended.iter().cloned());

    FeedDiff {
        feed,
        appended,
        changes,
        summary,
    }
}

/// Number of episodes currently listed, i.e. keys whose latest record is not a removal.
pub(crate) fn live_episode_count(feed: &[FeedRecord]) -> usize {
    latest_by_key(feed)
        .values()
        .filter(|record| record.event != FeedEvent::Removed)
        .count()
}

fn latest_by_key(feed: &[FeedRecord]) -> BTreeMap<(&str, u32), &FeedRecord> {
    let mut latest = BTreeMap::new();
    for record in feed {
        latest.insert(record.key(), record);
    }
    latest
}

fn record_for(entry: &ScheduleEntry, event: FeedEvent, now: DateTime<Utc>) -> FeedRecord {
    FeedRecord {
        route: entry.route.clone(),
        title: entry.title.clone(),
        episode_number: entry.episode_number,
        episode_date: entry.episode_date,
        event,
        recorded_at: now,
    }
}

fn change_for(record: &FeedRecord) -> Change {
    let (kind, verb) = match record.event {
        FeedEvent::Added => (ChangeKind::Added, "aired"),
        FeedEvent::Modified => (ChangeKind::Modified, "corrected to"),
        FeedEvent::Removed => (ChangeKind::Removed, "retracted, was"),
    };
    Change {
        kind,
        route: record.route.clone(),
        title: record.title.clone(),
        detail: format!(
            "feed episode {} {verb} {}",
            record.episode_number,
            format_date(record.episode_date)
        ),
    }
}

fn summarize(added: usize, modified: usize, removed: usize) -> String {
    if added + modified + removed == 0 {
        return "No changes detected for the Dubbed Episodes Feed.".to_string();
    }
    let parts = [("Added", added), ("Modified", modified), ("Removed", removed)]
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(verb, count)| format!("{verb} {count}"))
        .collect::<Vec<_>>();
    let direction = if modified + removed > 0 { "from" } else { "to" };
    format!(
        "{} episode(s) {direction} the Dubbed Episodes Feed.",
        parts.join(" and ")
    )
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap()
    }

    fn aired(route: &str, episode: u32, date: DateTime<Utc>) -> ScheduleEntry {
        ScheduleEntry {
            route: route.to_string(),
            title: format!("Show {route}"),
            english: None,
            romaji: None,
            native: None,
            episode_number: episode,
            episodes: Some(12),
            episode_date: date,
            airing_status: AiringStatus::Aired,
            is_custom_override: false,
        }
    }

    fn scope(routes: &[&str]) -> RetractionScope {
        RetractionScope {
            routes: routes.iter().map(|route| route.to_string()).collect(),
            since: now() - Duration::days(9),
        }
    }

    fn events(records: &[FeedRecord]) -> Vec<(FeedEvent, &str, u32)> {
        records
            .iter()
            .map(|record| (record.event, record.route.as_str(), record.episode_number))
            .collect()
    }

    #[test]
    fn aired_entry_is_added_once() {
        let t = now() - Duration::days(1);
        let snapshot = vec![aired("r1", 1, t)];

        let first = reconcile_feed(&snapshot, &[], &scope(&[]), now());
        assert_eq!(events(&first.appended), vec![(FeedEvent::Added, "r1", 1)]);
        assert_eq!(first.feed.len(), 1);
        assert_eq!(first.summary, "Added 1 episode(s) to the Dubbed Episodes Feed.");

        let second = reconcile_feed(&snapshot, &first.feed, &scope(&[]), now());
        assert!(second.appended.is_empty());
        assert_eq!(second.feed, first.feed);
        assert_eq!(second.summary, "No changes detected for the Dubbed Episodes Feed.");
    }

    #[test]
    fn upcoming_entries_stay_out_of_the_feed() {
        let mut entry = aired("r1", 1, now() + Duration::days(2));
        entry.airing_status = AiringStatus::Upcoming;
        let diff = reconcile_feed(&[entry], &[], &scope(&[]), now());
        assert!(diff.appended.is_empty());
    }

    #[test]
    fn next_episode_is_added_and_previous_record_untouched() {
        let t = now() - Duration::days(8);
        let first = reconcile_feed(&[aired("r1", 1, t)], &[], &scope(&[]), now());

        let later = now() + Duration::hours(1);
        let second = reconcile_feed(
            &[aired("r1", 2, t + Duration::weeks(1))],
            &first.feed,
            &scope(&[]),
            later,
        );

        assert_eq!(events(&second.appended), vec![(FeedEvent::Added, "r1", 2)]);
        assert_eq!(second.feed[0], first.feed[0]);
        assert_eq!(live_episode_count(&second.feed), 2);
    }

    #[test]
    fn date_correction_appends_modified_not_second_added() {
        let t = now() - Duration::days(1);
        let first = reconcile_feed(&[aired("r1", 1, t)], &[], &scope(&[]), now());

        let corrected = t + Duration::hours(2);
        let second = reconcile_feed(&[aired("r1", 1, corrected)], &first.feed, &scope(&[]), now());

        assert_eq!(events(&second.appended), vec![(FeedEvent::Modified, "r1", 1)]);
        assert_eq!(second.appended[0].episode_date, corrected);
        assert_eq!(second.feed.len(), 2);
        assert_eq!(
            second.summary,
            "Modified 1 episode(s) from the Dubbed Episodes Feed."
        );
        let added = second
            .feed
            .iter()
            .filter(|record| record.event == FeedEvent::Added)
            .count();
        assert_eq!(added, 1);
    }

    #[test]
    fn vanished_recent_episode_is_retracted_once() {
        let t = now() - Duration::days(2);
        let first = reconcile_feed(&[aired("r1", 1, t), aired("r2", 4, t)], &[], &scope(&[]), now());

        let second = reconcile_feed(&[aired("r2", 4, t)], &first.feed, &scope(&["r1"]), now());
        assert_eq!(events(&second.appended), vec![(FeedEvent::Removed, "r1", 1)]);
        assert_eq!(live_episode_count(&second.feed), 1);

        let third = reconcile_feed(&[aired("r2", 4, t)], &second.feed, &scope(&["r1"]), now());
        assert!(third.appended.is_empty());
    }

    #[test]
    fn aged_out_episode_is_kept_as_history() {
        let old = now() - Duration::days(60);
        let first = reconcile_feed(&[aired("r1", 12, old)], &[], &scope(&[]), now());
        let second = reconcile_feed(&[], &first.feed, &scope(&["r1"]), now());
        assert!(second.appended.is_empty());
        assert_eq!(second.feed, first.feed);
    }

    #[test]
    fn episode_older_than_the_window_is_kept_when_show_ends() {
        let final_episode = now() - Duration::days(12);
        let first = reconcile_feed(&[aired("r1", 12, final_episode)], &[], &scope(&[]), now());
        let second = reconcile_feed(&[], &first.feed, &scope(&["r1"]), now());
        assert!(second.appended.is_empty());
        assert_eq!(live_episode_count(&second.feed), 1);
    }

    #[test]
    fn show_missing_without_removal_is_left_alone() {
        let t = now() - Duration::days(2);
        let first = reconcile_feed(&[aired("r1", 1, t)], &[], &scope(&[]), now());
        let second = reconcile_feed(&[], &first.feed, &scope(&[]), now());
        assert!(second.appended.is_empty());
    }

    #[test]
    fn reappearing_episode_after_retraction_is_modified() {
        let t = now() - Duration::days(2);
        let first = reconcile_feed(&[aired("r1", 1, t)], &[], &scope(&[]), now());
        let second = reconcile_feed(&[], &first.feed, &scope(&["r1"]), now());
        let third = reconcile_feed(&[aired("r1", 1, t)], &second.feed, &scope(&["r1"]), now());

        assert_eq!(events(&third.appended), vec![(FeedEvent::Modified, "r1", 1)]);
        assert_eq!(
            third
                .feed
                .iter()
                .filter(|record| record.event == FeedEvent::Added)
                .count(),
            1
        );
    }

    #[test]
    fn appended_order_is_added_modified_removed() {
        let t = now() - Duration::days(1);
        let prior = reconcile_feed(&[aired("b", 1, t), aired("gone", 2, t)], &[], &scope(&[]), now()).feed;

        let diff = reconcile_feed(
            &[aired("b", 1, t + Duration::hours(1)), aired("a", 1, t)],
            &prior,
            &scope(&["gone"]),
            now(),
        );

        assert_eq!(
            events(&diff.appended),
            vec![
                (FeedEvent::Added, "a", 1),
                (FeedEvent::Modified, "b", 1),
                (FeedEvent::Removed, "gone", 2),
            ]
        );
        assert_eq!(
            diff.summary,
            "Added 1 and Modified 1 and Removed 1 episode(s) from the Dubbed Episodes Feed."
        );
        assert_eq!(diff.changes.len(), 3);
        assert_eq!(diff.changes[2].kind, ChangeKind::Removed);
    }
}
