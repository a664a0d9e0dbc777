mod display;
mod feed;
mod fetch;
mod matching;
mod model;
mod overrides;
mod reconcile;
mod time;
pub(crate) mod window;


use std::collections::HashSet;
use std::time::Instant;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cli::{Cli, Command};
use crate::config::SyncConfig;
use crate::paths::DataPaths;
use crate::store::{load_json, render_json, save_json_if_changed, write_if_changed};

use self::display::{format_air_time_display, format_episode_progress, truncate};
use self::feed::{RetractionScope, live_episode_count, reconcile_feed};
use self::fetch::{
    AnimeScheduleClient, Pause, PreviousWeekCache, ThreadPause, TimetableSource,
    enrich_new_routes, fetch_window,
};
use self::matching::default_matchers;
use self::model::{FeedRecord, ScheduleEntry};
use self::overrides::advance_overrides;
use self::reconcile::reconcile_snapshot;
use self::time::{DisplayTime, ReferenceZone, format_duration};
use self::window::{WeekWindow, calculate_weeks_to_fetch, previous_week};

pub fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command.as_ref() else {
        debug!("no subcommand given, nothing to do");
        return Ok(());
    };
    let config = SyncConfig::from_cli(&cli)?;

    match command {
        Command::UpdateDubs => run_update_dubs(&config)?,
        Command::UpdateFeed => run_update_feed(&config)?,
        Command::PreviousWeek => run_previous_week(&config)?,
    }

    Ok(())
}

fn run_update_dubs(config: &SyncConfig) -> Result<()> {
    let token = config.require_token()?;
    let client = AnimeScheduleClient::new(&config.base_url, token);
    let cache = PreviousWeekCache::default();
    let started = Instant::now();

    let report = update_dubs(&client, &ThreadPause, &cache, config, Utc::now())?;

    println!("{}", report.schedule_summary());
    println!("{}", report.feed_summary);
    println!(
        "Logged a total of {} Dubbed Episodes to date.",
        report.feed_total
    );
    if report.change_lines.is_empty() {
        println!("No changes recorded.");
    } else {
        println!(
            "Wrote {} change(s) to {}",
            report.change_lines.len(),
            config.paths().changes.display()
        );
    }
    debug!(
        schedule = report.schedule_written,
        overrides = report.overrides_written,
        feed = report.feed_written,
        "persisted files"
    );
    info!("Dub schedule update finished in {}", format_duration(started.elapsed()));
    Ok(())
}

fn run_update_feed(config: &SyncConfig) -> Result<()> {
    let paths = config.paths();
    let now = Utc::now();
    let schedule: Vec<ScheduleEntry> = load_json(&paths.schedule)?;
    let prior_feed: Vec<FeedRecord> = load_json(&paths.feed)?;

    // Without a fresh fetch nothing is known to have vanished, so nothing is retracted.
    let diff = reconcile_feed(&schedule, &prior_feed, &RetractionScope::default(), now);
    if !diff.appended.is_empty() {
        save_json_if_changed(&paths.feed, &diff.feed)?;
        let lines = diff.changes.iter().map(ToString::to_string).collect::<Vec<_>>();
        write_change_log(&paths, &lines)?;
    }

    println!("{}", diff.summary);
    println!(
        "Logged a total of {} Dubbed Episodes to date.",
        live_episode_count(&diff.feed)
    );
    Ok(())
}

fn run_previous_week(config: &SyncConfig) -> Result<()> {
    let token = config.require_token()?;
    let client = AnimeScheduleClient::new(&config.base_url, token);
    let cache = PreviousWeekCache::default();
    let week = previous_week(Utc::now());

    info!("Fetching dub timetables for the previous week: {week}...");
    let records = cache.get_or_fetch(week, || client.fetch_week(week))?;
    let mut entries = records
        .unwrap_or_default()
        .into_iter()
        .filter_map(|record| record.into_candidate())
        .map(|candidate| candidate.entry)
        .collect::<Vec<_>>();
    if entries.is_empty() {
        println!("No dub timetable published for {week}.");
        return Ok(());
    }
    entries.sort_by(|left, right| left.sort_key().cmp(&right.sort_key()));

    println!(
        "{:<28} {:<40} {:<8} {:<12} {:<28}",
        "ROUTE", "TITLE", "EP", "STATUS", "AIRS"
    );
    for entry in entries {
        println!(
            "{:<28} {:<40} {:<8} {:<12} {:<28}",
            truncate(&entry.route, 28),
            truncate(&entry.title, 40),
            format_episode_progress(entry.episode_number, entry.episodes),
            entry.airing_status.as_str(),
            format_air_time_display(entry.episode_date)
        );
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RunReport {
    pub(crate) weeks_fetched: usize,
    pub(crate) schedule_size: usize,
    pub(crate) schedule_changes: usize,
    pub(crate) schedule_written: bool,
    pub(crate) overrides_written: bool,
    pub(crate) feed_written: bool,
    pub(crate) feed_summary: String,
    pub(crate) feed_total: usize,
    pub(crate) change_lines: Vec<String>,
}

impl RunReport {
    fn schedule_summary(&self) -> String {
        if self.schedule_changes == 0 {
            format!(
                "No changes detected in the dub schedule ({} airing, {} week(s) fetched).",
                self.schedule_size, self.weeks_fetched
            )
        } else {
            format!(
                "Dub schedule updated: {} change(s), {} airing, {} week(s) fetched.",
                self.schedule_changes, self.schedule_size, self.weeks_fetched
            )
        }
    }
}

/// Fetch, reconcile and persist. Nothing is written unless every step before it succeeded.
pub(crate) fn update_dubs(
    source: &impl TimetableSource,
    pause: &impl Pause,
    cache: &PreviousWeekCache,
    config: &SyncConfig,
    now: DateTime<Utc>,
) -> Result<RunReport> {
    let paths = config.paths();
    let zone = ReferenceZone::US_EASTERN;

    let current_schedule: Vec<ScheduleEntry> = load_json(&paths.schedule)?;
    let custom_dubs: Vec<ScheduleEntry> = load_json(&paths.overrides)?;
    let prior_feed: Vec<FeedRecord> = load_json(&paths.feed)?;

    info!("Getting dub airing schedule");
    if zone.is_dst_transition_month(now) {
        debug!("daylight saving changes this month, air times are compensated");
    }
    let window = calculate_weeks_to_fetch(now, config.window);
    let mut fetched = fetch_window(
        source,
        window,
        previous_week(now),
        cache,
        pause,
        config.throttle,
    )?;

    let known_routes = current_schedule
        .iter()
        .map(|entry| entry.route.clone())
        .collect::<HashSet<_>>();
    let enriched = enrich_new_routes(
        source,
        &mut fetched.candidates,
        &known_routes,
        pause,
        config.throttle,
    )?;
    if fetched.weeks_without_data > 0 {
        info!(
            "{} of {} week(s) had no published dub timetable.",
            fetched.weeks_without_data, fetched.weeks_planned
        );
    }
    if enriched > 0 {
        debug!("enriched {enriched} new route(s) with anime details");
    }

    let pass = advance_overrides(custom_dubs, now, &zone);
    let diff = reconcile_snapshot(
        &current_schedule,
        &fetched,
        &pass.overrides,
        &default_matchers(config.alias_confidence),
    );
    let scope = RetractionScope {
        routes: diff.removed_routes.iter().cloned().collect(),
        since: retraction_cutoff(window, now, config.feed_window_days, &zone),
    };
    let feed_diff = reconcile_feed(&diff.snapshot, &prior_feed, &scope, now);

    let mut report = RunReport {
        weeks_fetched: fetched.weeks_fetched,
        schedule_size: diff.snapshot.len(),
        schedule_changes: diff.changes.len(),
        feed_total: live_episode_count(&feed_diff.feed),
        feed_summary: feed_diff.summary.clone(),
        ..RunReport::default()
    };
    if diff.retained > 0 {
        warn!(
            "Kept {} entries unverified because the fetch window was not fully covered.",
            diff.retained
        );
    }
    report.change_lines = pass
        .issues
        .iter()
        .map(ToString::to_string)
        .chain(diff.changes.iter().map(ToString::to_string))
        .chain(feed_diff.changes.iter().map(ToString::to_string))
        .collect();

    let feed_json = (!feed_diff.appended.is_empty())
        .then(|| render_json(&feed_diff.feed))
        .transpose()?;
    let overrides_json = pass
        .changed
        .then(|| render_json(&pass.overrides))
        .transpose()?;
    let schedule_json = (diff.snapshot != current_schedule)
        .then(|| render_json(&diff.snapshot))
        .transpose()?;

    // The snapshot goes last: if an earlier write fails, the next run diffs
    // against the old snapshot and derives the same feed events and lines again.
    if let Some(rendered) = feed_json {
        report.feed_written = write_if_changed(&paths.feed, &rendered)?;
    }
    write_change_log(&paths, &report.change_lines)?;
    if let Some(rendered) = overrides_json {
        report.overrides_written = write_if_changed(&paths.overrides, &rendered)?;
    }
    if let Some(rendered) = schedule_json {
        report.schedule_written = write_if_changed(&paths.schedule, &rendered)?;
    }
    info!("{}", feed_diff.summary);

    Ok(report)
}

/// Earliest episode date a retraction may touch: the Monday opening the
/// fetched window, further bounded by the feed window.
fn retraction_cutoff(
    window: WeekWindow,
    now: DateTime<Utc>,
    feed_window_days: i64,
    zone: &impl DisplayTime,
) -> DateTime<Utc> {
    match window.start.starts_at() {
        Some(start) => start.max(zone.days_ago(now, feed_window_days, true)),
        None => DateTime::<Utc>::MAX_UTC,
    }
}

fn write_change_log(paths: &DataPaths, lines: &[String]) -> Result<()> {
    if lines.is_empty() {
        return Ok(());
    }
    for line in lines {
        info!("{line}");
    }
    write_if_changed(&paths.changes, &lines.join("\n"))?;
    Ok(())
}
