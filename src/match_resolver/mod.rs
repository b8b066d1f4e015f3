//! Match/EPG-ID Resolver (§4.D).
//!
//! A pure query against a cached external directory dataset (e.g. a
//! channels database dump keyed by station id). Scoring follows the
//! teacher's `ChannelSimilarityAnalyzer` approach of blending multiple
//! string-similarity metrics rather than relying on exact equality, with a
//! configurable floor below which no match is produced.

pub mod directory;
pub mod scoring;

use directory::{DirectoryEntry, MatchDirectory};

/// Result of resolving a channel's normalized name against the directory.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub name: String,
    pub source: String,
    pub station_id: String,
    pub call_sign: Option<String>,
    pub logo: Option<String>,
    pub score: f64,
}

/// Resolves `display_name` (optionally with a country hint) against
/// `directory`, returning the highest-scoring entry at or above `floor`, or
/// `None` if nothing clears it. Manual UI overrides are applied by the
/// caller *before* invoking this — this function never sees them, matching
/// the "manual overrides take absolute precedence" rule in §4.D.
pub fn resolve(
    display_name: &str,
    country_hint: Option<&str>,
    directory: &MatchDirectory,
    floor: f64,
) -> Option<MatchResult> {
    let mut best: Option<(f64, &DirectoryEntry)> = None;

    for entry in directory.entries() {
        let score = scoring::score(display_name, country_hint, entry);
        if score < floor {
            continue;
        }
        match best {
            Some((best_score, _)) if score <= best_score => {}
            _ => best = Some((score, entry)),
        }
    }

    best.map(|(score, entry)| MatchResult {
        name: entry.name.clone(),
        source: entry.source.clone(),
        station_id: entry.station_id.clone(),
        call_sign: entry.call_sign.clone(),
        logo: entry.logo.clone(),
        score,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> MatchDirectory {
        MatchDirectory::new(vec![
            DirectoryEntry {
                name: "BBC One".to_string(),
                source: "freeview".to_string(),
                station_id: "bbc-one.uk".to_string(),
                call_sign: Some("BBC1".to_string()),
                logo: None,
                country: Some("UK".to_string()),
            },
            DirectoryEntry {
                name: "BBC Two".to_string(),
                source: "freeview".to_string(),
                station_id: "bbc-two.uk".to_string(),
                call_sign: Some("BBC2".to_string()),
                logo: None,
                country: Some("UK".to_string()),
            },
        ])
    }

    #[test]
    fn exact_name_matches_above_floor() {
        let result = resolve("BBC One", Some("UK"), &directory(), 0.65).unwrap();
        assert_eq!(result.station_id, "bbc-one.uk");
        assert!(result.score >= 0.65);
    }

    #[test]
    fn nothing_below_floor_is_reported() {
        let result = resolve("Completely Unrelated Channel Xyz", None, &directory(), 0.65);
        assert!(result.is_none());
    }

    #[test]
    fn picks_the_single_best_entry() {
        let result = resolve("BBC Two HD", Some("UK"), &directory(), 0.5).unwrap();
        assert_eq!(result.station_id, "bbc-two.uk");
    }
}
