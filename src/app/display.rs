use chrono::{DateTime, Local, Utc};

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_air_time_display(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local)
        .format("%a %Y-%m-%d %H:%M %:z")
        .to_string()
}

pub(crate) fn format_episode_progress(episode: u32, total: Option<u32>) -> String {
    match total {
        Some(total) => format!("{episode}/{total}"),
        None => episode.to_string(),
    }
}
