//! Snapshot reconciliation: merges fetched timetable records and custom dub
//! overrides into the stored schedule and reports what changed.
//!
//! Overrides always beat fetched records sharing their route. Fetched records
//! are tied back to stored entries through the identity matchers, in order.
//! A stored entry that nothing claims is only dropped after a complete fetch
//! of the planned window, except for custom dubs, whose presence never
//! depends on the network.

use std::collections::HashSet;

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use super::fetch::FetchOutcome;
use super::matching::IdentityMatcher;
use super::model::{Candidate, Change, ChangeKind, ScheduleEntry};

#[derive(Debug, Clone, Default)]
pub(crate) struct SnapshotDiff {
    pub(crate) snapshot: Vec<ScheduleEntry>,
    pub(crate) changes: Vec<Change>,
    pub(crate) retained: usize,
    /// Fetched routes dropped in this pass; custom dubs are not listed.
    pub(crate) removed_routes: Vec<String>,
}

struct Resolution {
    prior_idx: usize,
    matcher: &'static str,
}

pub(crate) fn reconcile_snapshot(
    prior: &[ScheduleEntry],
    fetched: &FetchOutcome,
    overrides: &[ScheduleEntry],
    matchers: &[Box<dyn IdentityMatcher>],
) -> SnapshotDiff {
    let prior = unique_by_route(prior);
    let candidates = merge_candidates(fetched, overrides);

    let mut claimed = vec![false; prior.len()];
    let mut resolved: Vec<Option<Resolution>> = candidates.iter().map(|_| None).collect();
    for matcher in matchers {
        for (candidate_idx, candidate) in candidates.iter().enumerate() {
            if resolved[candidate_idx].is_some() {
                continue;
            }
            let open = (0..prior.len())
                .filter(|idx| !claimed[*idx])
                .collect::<Vec<_>>();
            let catalog = open.iter().map(|idx| prior[*idx]).collect::<Vec<_>>();
            if let Some(hit) = matcher.find_match(candidate, &catalog) {
                let prior_idx = open[hit];
                claimed[prior_idx] = true;
                resolved[candidate_idx] = Some(Resolution {
                    prior_idx,
                    matcher: matcher.name(),
                });
            }
        }
    }

    let mut diff = SnapshotDiff::default();
    for (candidate, resolution) in candidates.into_iter().zip(resolved) {
        let Candidate {
            mut entry,
            route_known,
        } = candidate;
        match resolution {
            None => {
                diff.changes.push(Change {
                    kind: ChangeKind::Added,
                    route: entry.route.clone(),
                    title: entry.title.clone(),
                    detail: format!(
                        "episode {} {} {}",
                        entry.episode_number,
                        entry.airing_status.as_str(),
                        format_date(entry.episode_date)
                    ),
                });
                diff.snapshot.push(entry);
            }
            Some(Resolution { prior_idx, matcher }) => {
                let old = prior[prior_idx];
                if !route_known {
                    entry.route = old.route.clone();
                }
                carry_over_metadata(&mut entry, old);
                let differences = describe_differences(old, &entry);
                if !differences.is_empty() {
                    let mut detail = differences.join(", ");
                    if matcher != "route" {
                        detail.push_str(&format!(" (matched by {matcher})"));
                    }
                    diff.changes.push(Change {
                        kind: ChangeKind::Modified,
                        route: entry.route.clone(),
                        title: entry.title.clone(),
                        detail,
                    });
                }
                diff.snapshot.push(entry);
            }
        }
    }

    let complete = fetched.complete();
    for (idx, old) in prior.iter().enumerate() {
        if claimed[idx] {
            continue;
        }
        if complete || old.is_custom_override {
            if !old.is_custom_override {
                diff.removed_routes.push(old.route.clone());
            }
            diff.changes.push(Change {
                kind: ChangeKind::Removed,
                route: old.route.clone(),
                title: old.title.clone(),
                detail: if old.is_custom_override {
                    "custom dub is no longer tracked".to_string()
                } else {
                    "no longer in the dub schedule".to_string()
                },
            });
        } else {
            debug!(
                "keeping {} since the fetch window was not fully covered",
                old.route
            );
            diff.retained += 1;
            diff.snapshot.push((*old).clone());
        }
    }

    diff.snapshot
        .sort_by(|left, right| left.sort_key().cmp(&right.sort_key()));
    info!(
        "Successfully resolved {} airing dubs ({} change(s)).",
        diff.snapshot.len(),
        diff.changes.len()
    );
    diff
}

fn unique_by_route(entries: &[ScheduleEntry]) -> Vec<&ScheduleEntry> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.route.as_str()))
        .collect()
}

fn merge_candidates(fetched: &FetchOutcome, overrides: &[ScheduleEntry]) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::with_capacity(overrides.len() + fetched.candidates.len());
    for entry in overrides {
        if seen.insert(entry.route.clone()) {
            let mut entry = entry.clone();
            entry.is_custom_override = true;
            candidates.push(Candidate {
                entry,
                route_known: true,
            });
        }
    }
    for candidate in &fetched.candidates {
        if seen.insert(candidate.entry.route.clone()) {
            candidates.push(candidate.clone());
        } else {
            debug!(
                "custom dub overrides fetched record for {}",
                candidate.entry.route
            );
        }
    }
    candidates
}

fn carry_over_metadata(entry: &mut ScheduleEntry, old: &ScheduleEntry) {
    if entry.episodes.is_none() {
        entry.episodes = old.episodes;
    }
    if entry.english.is_none() {
        entry.english.clone_from(&old.english);
    }
    if entry.romaji.is_none() {
        entry.romaji.clone_from(&old.romaji);
    }
    if entry.native.is_none() {
        entry.native.clone_from(&old.native);
    }
}

fn describe_differences(old: &ScheduleEntry, new: &ScheduleEntry) -> Vec<String> {
    let mut out = Vec::new();
    if old.route != new.route {
        out.push(format!("route {} -> {}", old.route, new.route));
    }
    if old.episode_number != new.episode_number {
        out.push(format!(
            "episode {} -> {}",
            old.episode_number, new.episode_number
        ));
    }
    if old.episode_date != new.episode_date {
        out.push(format!(
            "date {} -> {}",
            format_date(old.episode_date),
            format_date(new.episode_date)
        ));
    }
    if old.airing_status != new.airing_status {
        out.push(format!(
            "status {} -> {}",
            old.airing_status.as_str(),
            new.airing_status.as_str()
        ));
    }
    out
}

pub(crate) fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
