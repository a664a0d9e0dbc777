use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::model::{AiringStatus, ScheduleEntry};
use super::time::DisplayTime;
use crate::error::OverrideIssue;

#[derive(Debug, Clone)]
pub(crate) struct OverridePass {
    pub(crate) overrides: Vec<ScheduleEntry>,
    pub(crate) changed: bool,
    pub(crate) issues: Vec<OverrideIssue>,
}

/// Advances overdue custom dubs by one weekly release and drops finished or malformed ones.
pub(crate) fn advance_overrides(
    loaded: Vec<ScheduleEntry>,
    now: DateTime<Utc>,
    clock: &impl DisplayTime,
) -> OverridePass {
    let before = serde_json::to_string(&loaded).ok();
    let mut overrides = loaded;
    for dub in &mut overrides {
        dub.is_custom_override = true;
    }

    if !overrides.is_empty() {
        info!("Detected {} custom dubs, handling...", overrides.len());
    }

    for dub in &mut overrides {
        if dub.episode_date < now {
            let next_date = clock.past(dub.episode_date, 1, false);
            info!(
                "Custom dub {} has passed its episode date {}, moving to {} for episode {}.",
                dub.route,
                dub.episode_date.to_rfc3339(),
                next_date.to_rfc3339(),
                dub.episode_number + 1
            );
            dub.episode_date = next_date;
            dub.episode_number += 1;
            dub.airing_status = AiringStatus::Aired;
        }
    }

    let mut issues = Vec::new();
    overrides.retain(|dub| match override_issue(dub) {
        Some(issue) => {
            warn!("{issue}");
            issues.push(issue);
            false
        }
        None => true,
    });

    let after = serde_json::to_string(&overrides).ok();
    let changed = before.is_none() || before != after;
    if changed {
        info!("Changes detected in the custom dubs list.");
    }

    OverridePass {
        overrides,
        changed,
        issues,
    }
}

fn override_issue(dub: &ScheduleEntry) -> Option<OverrideIssue> {
    let malformed = |reason: &str| {
        Some(OverrideIssue::MalformedOverride {
            route: dub.route.clone(),
            reason: reason.to_string(),
        })
    };
    if dub.route.trim().is_empty() {
        return malformed("route is empty");
    }
    if dub.title.trim().is_empty() {
        return malformed("title is empty");
    }
    match dub.episodes {
        Some(0) => malformed("total episode count is 0"),
        Some(total) if dub.episode_number > total => Some(OverrideIssue::Finished {
            route: dub.route.clone(),
            episode: dub.episode_number,
            total,
        }),
        _ => None,
    }
}
