use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum AiringStatus {
    Upcoming,
    Airing,
    Aired,
    Finished,
    #[serde(rename = "delayed-air", alias = "delayed")]
    Delayed,
    #[serde(other)]
    Unknown,
}

impl AiringStatus {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Airing => "airing",
            Self::Aired => "aired",
            Self::Finished => "finished",
            Self::Delayed => "delayed-air",
            Self::Unknown => "unknown",
        }
    }
}

/// One tracked dub release; also the shape of a custom dub override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScheduleEntry {
    pub(crate) route: String,
    pub(crate) title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) english: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) romaji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) native: Option<String>,
    pub(crate) episode_number: u32,
    #[serde(default)]
    pub(crate) episodes: Option<u32>,
    pub(crate) episode_date: DateTime<Utc>,
    pub(crate) airing_status: AiringStatus,
    #[serde(default)]
    pub(crate) is_custom_override: bool,
}

impl ScheduleEntry {
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.title.as_str()).chain(
            [&self.english, &self.romaji, &self.native]
                .into_iter()
                .filter_map(|name| name.as_deref()),
        )
    }

    pub(crate) fn sort_key(&self) -> (DateTime<Utc>, &str) {
        (self.episode_date, self.route.as_str())
    }
}

/// A timetable item as the remote API sends it; anything may be missing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRecord {
    #[serde(default)]
    pub(crate) route: Option<String>,
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) english: Option<String>,
    #[serde(default)]
    pub(crate) romaji: Option<String>,
    #[serde(default)]
    pub(crate) native: Option<String>,
    #[serde(default)]
    pub(crate) episode_number: Option<u32>,
    #[serde(default)]
    pub(crate) episodes: Option<u32>,
    #[serde(default)]
    pub(crate) episode_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) airing_status: Option<AiringStatus>,
}

/// A reconciliation input. `route_known` is false when the route was derived from the title.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Candidate {
    pub(crate) entry: ScheduleEntry,
    pub(crate) route_known: bool,
}

impl RawRecord {
    pub(crate) fn into_candidate(self) -> Option<Candidate> {
        let title = self.title.map(|title| title.trim().to_string())?;
        if title.is_empty() {
            return None;
        }
        let episode_date = self.episode_date?;
        let known_route = self
            .route
            .map(|route| route.trim().to_string())
            .filter(|route| !route.is_empty());
        let route_known = known_route.is_some();
        let route = known_route.unwrap_or_else(|| slugify(&title));

        Some(Candidate {
            entry: ScheduleEntry {
                route,
                title,
                english: non_empty(self.english),
                romaji: non_empty(self.romaji),
                native: non_empty(self.native),
                episode_number: self.episode_number.unwrap_or(0),
                episodes: self.episodes.filter(|total| *total > 0),
                episode_date,
                airing_status: self.airing_status.unwrap_or(AiringStatus::Upcoming),
                is_custom_override: false,
            },
            route_known,
        })
    }
}

/// `GET /anime/{route}` payload, reduced to what enrichment needs.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AnimeDetail {
    #[serde(default)]
    pub(crate) title: Option<String>,
    #[serde(default)]
    pub(crate) names: AnimeNames,
    #[serde(default)]
    pub(crate) episodes: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct AnimeNames {
    #[serde(default)]
    pub(crate) english: Option<String>,
    #[serde(default)]
    pub(crate) romaji: Option<String>,
    #[serde(default)]
    pub(crate) native: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum FeedEvent {
    Added,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FeedRecord {
    pub(crate) route: String,
    #[serde(default)]
    pub(crate) title: String,
    pub(crate) episode_number: u32,
    pub(crate) episode_date: DateTime<Utc>,
    pub(crate) event: FeedEvent,
    pub(crate) recorded_at: DateTime<Utc>,
}

impl FeedRecord {
    pub(crate) fn key(&self) -> (&str, u32) {
        (self.route.as_str(), self.episode_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// One line of the run's change log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Change {
    pub(crate) kind: ChangeKind,
    pub(crate) route: String,
    pub(crate) title: String,
    pub(crate) detail: String,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.kind {
            ChangeKind::Added => "Added",
            ChangeKind::Modified => "Modified",
            ChangeKind::Removed => "Removed",
        };
        write!(f, "{verb} {} ({})", self.title, self.route)?;
        if !self.detail.is_empty() {
            write!(f, ": {}", self.detail)?;
        }
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn slugify(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_record_parses_timetable_item() {
        let raw = r#"{
            "title": "Frieren",
            "route": "sousou-no-frieren",
            "english": "Frieren: Beyond Journey's End",
            "episodeNumber": 12,
            "episodes": 28,
            "episodeDate": "2025-06-14T03:30:00Z",
            "airingStatus": "aired",
            "airType": "dub",
            "lengthMin": 24
        }"#;
        let record: RawRecord = serde_json::from_str(raw).expect("record should parse");
        let candidate = record.into_candidate().expect("candidate");
        assert!(candidate.route_known);
        assert_eq!(candidate.entry.route, "sousou-no-frieren");
        assert_eq!(candidate.entry.episode_number, 12);
        assert_eq!(candidate.entry.episodes, Some(28));
        assert_eq!(candidate.entry.airing_status, AiringStatus::Aired);
        assert!(!candidate.entry.is_custom_override);
    }

    #[test]
    fn unknown_and_delayed_statuses_deserialize() {
        let status: AiringStatus = serde_json::from_str("\"delayed-air\"").expect("delayed");
        assert_eq!(status, AiringStatus::Delayed);
        let status: AiringStatus = serde_json::from_str("\"on-hiatus\"").expect("unknown");
        assert_eq!(status, AiringStatus::Unknown);
    }

    #[test]
    fn record_without_route_gets_slug_and_without_date_is_skipped() {
        let record = RawRecord {
            title: Some("  Re:Zero - Season 3 ".to_string()),
            episode_date: Some(DateTime::UNIX_EPOCH),
            ..RawRecord::default()
        };
        let candidate = record.into_candidate().expect("candidate");
        assert!(!candidate.route_known);
        assert_eq!(candidate.entry.route, "re-zero-season-3");

        let dateless = RawRecord {
            title: Some("Show".to_string()),
            route: Some("show".to_string()),
            ..RawRecord::default()
        };
        assert!(dateless.into_candidate().is_none());
    }

    #[test]
    fn schedule_entry_round_trips_with_camel_case_fields() {
        let raw = r#"{"route":"c1","title":"Custom","episodeNumber":3,"episodes":null,"episodeDate":"2025-06-14T03:30:00Z","airingStatus":"upcoming","isCustomOverride":true}"#;
        let entry: ScheduleEntry = serde_json::from_str(raw).expect("entry");
        assert!(entry.is_custom_override);
        assert_eq!(entry.episodes, None);
        let value = serde_json::to_value(&entry).expect("serialize");
        assert_eq!(value["episodeNumber"], 3);
        assert!(value.get("english").is_none());
    }

    #[test]
    fn change_renders_as_log_line() {
        let change = Change {
            kind: ChangeKind::Modified,
            route: "r1".to_string(),
            title: "Show".to_string(),
            detail: "episode 1 -> 2".to_string(),
        };
        assert_eq!(change.to_string(), "Modified Show (r1): episode 1 -> 2");
    }
}
