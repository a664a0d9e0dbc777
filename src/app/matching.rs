use super::model::{Candidate, ScheduleEntry};

/// A way of recognising a fetched candidate as an entry already in the snapshot.
pub(crate) trait IdentityMatcher {
    fn name(&self) -> &'static str;

    /// Index into `catalog` of the entry `candidate` refers to.
    fn find_match(&self, candidate: &Candidate, catalog: &[&ScheduleEntry]) -> Option<usize>;
}

pub(crate) struct ExactRouteMatch;

impl IdentityMatcher for ExactRouteMatch {
    fn name(&self) -> &'static str {
        "route"
    }

    fn find_match(&self, candidate: &Candidate, catalog: &[&ScheduleEntry]) -> Option<usize> {
        catalog
            .iter()
            .position(|entry| entry.route == candidate.entry.route)
    }
}

/// Title/alias equivalence for entries whose route changed or is missing.
pub(crate) struct AliasMatch {
    pub(crate) min_confidence: f64,
}

impl IdentityMatcher for AliasMatch {
    fn name(&self) -> &'static str {
        "alias"
    }

    fn find_match(&self, candidate: &Candidate, catalog: &[&ScheduleEntry]) -> Option<usize> {
        let wanted = normalized_names(&candidate.entry);
        if wanted.is_empty() {
            return None;
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, entry) in catalog.iter().enumerate() {
            if entry.is_custom_override != candidate.entry.is_custom_override {
                continue;
            }
            let known = normalized_names(entry);
            let score = wanted
                .iter()
                .flat_map(|left| known.iter().map(move |right| name_confidence(left, right)))
                .fold(0.0_f64, f64::max);
            if score >= self.min_confidence && best.is_none_or(|(_, top)| score > top) {
                best = Some((idx, score));
            }
        }
        best.map(|(idx, _)| idx)
    }
}

pub(crate) fn default_matchers(min_confidence: f64) -> Vec<Box<dyn IdentityMatcher>> {
    vec![
        Box::new(ExactRouteMatch),
        Box::new(AliasMatch { min_confidence }),
    ]
}

fn normalized_names(entry: &ScheduleEntry) -> Vec<String> {
    let mut names = entry
        .names()
        .map(normalize_title_for_match)
        .filter(|name| !name.is_empty())
        .collect::<Vec<_>>();
    names.dedup();
    names
}

/// Edit-distance similarity of two normalized names, 1.0 when identical.
pub(crate) fn name_confidence(left: &str, right: &str) -> f64 {
    strsim::normalized_levenshtein(left, right)
}

pub(crate) fn normalize_title_for_match(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_alphanumeric() || ch.is_whitespace() {
                ch
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::model::AiringStatus;
    use chrono::DateTime;

    fn entry(route: &str, title: &str, english: Option<&str>) -> ScheduleEntry {
        ScheduleEntry {
            route: route.to_string(),
            title: title.to_string(),
            english: english.map(str::to_string),
            romaji: None,
            native: None,
            episode_number: 1,
            episodes: None,
            episode_date: DateTime::UNIX_EPOCH,
            airing_status: AiringStatus::Upcoming,
            is_custom_override: false,
        }
    }

    fn candidate(entry: ScheduleEntry) -> Candidate {
        Candidate {
            entry,
            route_known: true,
        }
    }

    #[test]
    fn normalizes_punctuation_and_case() {
        assert_eq!(
            normalize_title_for_match("  Frieren: Beyond Journey's End "),
            "frieren beyond journey s end"
        );
    }

    #[test]
    fn exact_route_match_ignores_titles() {
        let a = entry("show-a", "Completely Different", None);
        let b = entry("show-b", "Show B", None);
        let catalog = vec![&a, &b];
        let probe = candidate(entry("show-b", "Renamed", None));
        assert_eq!(ExactRouteMatch.find_match(&probe, &catalog), Some(1));
        let missing = candidate(entry("show-c", "Show B", None));
        assert_eq!(ExactRouteMatch.find_match(&missing, &catalog), None);
    }

    #[test]
    fn alias_match_links_renamed_route_through_english_title() {
        let stored = entry(
            "sousou-no-frieren",
            "Sousou no Frieren",
            Some("Frieren: Beyond Journey's End"),
        );
        let other = entry("one-piece", "One Piece", None);
        let catalog = vec![&other, &stored];
        let probe = candidate(entry(
            "frieren-beyond-journeys-end",
            "Frieren - Beyond Journey's End",
            None,
        ));

        let matcher = AliasMatch {
            min_confidence: 0.9,
        };
        assert_eq!(matcher.find_match(&probe, &catalog), Some(1));
    }

    #[test]
    fn alias_match_rejects_sequels_below_threshold() {
        let stored = entry("show", "Mushoku Tensei", None);
        let catalog = vec![&stored];
        let probe = candidate(entry("show-2", "Mushoku Tensei Season 2", None));

        let strict = AliasMatch {
            min_confidence: 0.9,
        };
        assert_eq!(strict.find_match(&probe, &catalog), None);

        let loose = AliasMatch {
            min_confidence: 0.5,
        };
        assert_eq!(loose.find_match(&probe, &catalog), Some(0));
    }

    #[test]
    fn confidence_tolerates_small_spelling_drift() {
        let stored = normalize_title_for_match("Dr. Stone: New Worlds");
        let fetched = normalize_title_for_match("Dr Stone New World");
        assert!(name_confidence(&stored, &fetched) >= 0.9);
        assert_eq!(name_confidence(&stored, &stored), 1.0);
        assert!(name_confidence("show a", "show b") < 0.9);
    }

    #[test]
    fn alias_match_never_crosses_override_boundary() {
        let mut stored = entry("custom-show", "Show", None);
        stored.is_custom_override = true;
        let catalog = vec![&stored];
        let probe = candidate(entry("show", "Show", None));
        let matcher = AliasMatch {
            min_confidence: 0.9,
        };
        assert_eq!(matcher.find_match(&probe, &catalog), None);
    }
}
