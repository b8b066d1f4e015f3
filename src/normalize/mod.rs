//! Tag & Name Normalizer (§4.C).
//!
//! A pure, deterministic function of `(raw name, rule set)`. Grounded in the
//! teacher's regex-driven `ChannelSimilarityAnalyzer`: rules are compiled
//! once per portal refresh and applied in order, the way the similarity
//! analyzer compiles its clone/timeshift patterns up front rather than
//! re-parsing a pattern string per channel.

pub mod rules;

pub use rules::{NormalizationRule, RuleSet, TagGroup};

use std::collections::BTreeMap;

use regex::Regex;

/// Output of normalizing one raw channel name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedName {
    /// The cleaned name after whitespace collapsing and tag extraction.
    /// Never written back over the raw `name` (invariant: `auto_name` only).
    pub display_name: String,
    pub tags: NormalizedTags,
    pub is_header: bool,
    pub is_raw: bool,
    pub is_event: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedTags {
    pub resolution: Option<String>,
    pub video_codec: Option<String>,
    pub country: Option<String>,
    pub audio: Option<String>,
    pub event_tags: Vec<String>,
    pub misc_tags: Vec<String>,
}

impl NormalizedTags {
    fn push(&mut self, group: TagGroup, value: String) {
        match group {
            TagGroup::Resolution => self.resolution = Some(value),
            TagGroup::VideoCodec => self.video_codec = Some(value),
            TagGroup::Country => self.country = Some(value),
            TagGroup::Audio => self.audio = Some(value),
            TagGroup::Event => self.event_tags.push(value),
            TagGroup::Misc => self.misc_tags.push(value),
        }
    }
}

/// Symmetric decorative framing, e.g. `### Sports Hub ###` or `✦✦ BBC ✦✦`.
fn header_framing_regex() -> Regex {
    Regex::new(r"^([#*✦┃★~=_\-]{2,})\s*(.+?)\s*\1$").expect("static header framing regex")
}

const DECORATIVE_RUN_THRESHOLD: usize = 6;

fn is_decorative(c: char) -> bool {
    matches!(c, '#' | '*' | '✦' | '┃' | '★' | '~' | '=' | '_' | '-' | '░' | '▓' | '▬')
}

/// Runs the normalization algorithm described in §4.C against one raw name.
pub fn normalize(raw_name: &str, rules: &RuleSet) -> NormalizedName {
    let collapsed = collapse_whitespace(&fold_brackets(raw_name.trim()));

    let mut working = collapsed.clone();
    let mut tags = NormalizedTags::default();
    let mut raw_token_seen = false;
    let mut event_matched = false;

    for rule in rules.ordered() {
        let Some(captures) = rule.regex.captures(&working) else {
            continue;
        };
        let whole = captures.get(0).expect("capture group 0 always present");
        let extracted = captures
            .get(1)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| whole.as_str().to_string());

        if extracted.eq_ignore_ascii_case("RAW") {
            raw_token_seen = true;
        }
        if rule.group == TagGroup::Event {
            event_matched = true;
        }
        tags.push(rule.group, extracted);
        working = format!(
            "{}{}",
            &working[..whole.start()],
            &working[whole.end()..]
        );
        working = collapse_whitespace(&working);
    }

    let is_header = detect_header(&working);

    NormalizedName {
        display_name: working,
        tags,
        is_header,
        is_raw: raw_token_seen,
        is_event: event_matched,
    }
}

fn detect_header(name: &str) -> bool {
    if header_framing_regex().is_match(name) {
        return true;
    }
    let chars: Vec<char> = name.chars().collect();
    if chars.len() < DECORATIVE_RUN_THRESHOLD * 2 {
        return false;
    }
    let leading = chars.iter().take_while(|c| is_decorative(**c)).count();
    let trailing = chars.iter().rev().take_while(|c| is_decorative(**c)).count();
    leading >= DECORATIVE_RUN_THRESHOLD && trailing >= DECORATIVE_RUN_THRESHOLD
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Folds bracketed decorations like `[HD]` or `(Backup)` into plain
/// whitespace so rule patterns see a flat string; the bracket *contents*
/// still go through rule matching afterward, nothing is discarded.
fn fold_brackets(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '[' | ']' | '(' | ')' | '{' | '}' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Useful for tests/diagnostics that want a stable textual summary.
pub fn tag_summary(tags: &NormalizedTags) -> BTreeMap<&'static str, String> {
    let mut map = BTreeMap::new();
    if let Some(v) = &tags.resolution {
        map.insert("resolution", v.clone());
    }
    if let Some(v) = &tags.video_codec {
        map.insert("video_codec", v.clone());
    }
    if let Some(v) = &tags.country {
        map.insert("country", v.clone());
    }
    if let Some(v) = &tags.audio {
        map.insert("audio", v.clone());
    }
    if !tags.event_tags.is_empty() {
        map.insert("event_tags", tags.event_tags.join(","));
    }
    if !tags.misc_tags.is_empty() {
        map.insert("misc_tags", tags.misc_tags.join(","));
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rules() -> RuleSet {
        RuleSet::new(vec![
            NormalizationRule::new(TagGroup::Resolution, r"(?i)\b(4K|UHD|1080P?|720P?|SD)\b").unwrap(),
            NormalizationRule::new(TagGroup::VideoCodec, r"(?i)\b(HEVC|H\.?264|H\.?265)\b").unwrap(),
            NormalizationRule::new(TagGroup::Misc, r"(?i)\b(RAW)\b").unwrap(),
            NormalizationRule::new(TagGroup::Event, r"(?i)\b(PPV|LIVE EVENT)\b").unwrap(),
        ])
    }

    #[test]
    fn extracts_resolution_and_cleans_name() {
        let result = normalize("Sports Channel [4K] HEVC", &sample_rules());
        assert_eq!(result.display_name, "Sports Channel");
        assert_eq!(result.tags.resolution.as_deref(), Some("4K"));
        assert_eq!(result.tags.video_codec.as_deref(), Some("HEVC"));
        assert!(!result.is_header);
        assert!(!result.is_raw);
    }

    #[test]
    fn detects_raw_token() {
        let result = normalize("News Feed RAW", &sample_rules());
        assert!(result.is_raw);
    }

    #[test]
    fn detects_event_group() {
        let result = normalize("Boxing PPV Tonight", &sample_rules());
        assert!(result.is_event);
    }

    #[test]
    fn detects_symmetric_header_framing() {
        let result = normalize("### Sports Hub ###", &sample_rules());
        assert!(result.is_header);
        assert_eq!(result.display_name, "Sports Hub");
    }

    #[test]
    fn detects_long_decorative_runs_without_symmetry() {
        let result = normalize("######## Movies Central --------", &sample_rules());
        assert!(result.is_header);
    }

    #[test]
    fn never_overwrites_name_field() {
        // The caller is responsible for keeping `name` untouched; this test
        // documents that `normalize` only ever returns `display_name`.
        let result = normalize("Plain Channel", &sample_rules());
        assert_eq!(result.display_name, "Plain Channel");
    }
}
