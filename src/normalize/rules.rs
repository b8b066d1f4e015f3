//! The per-portal rule set consumed by [`super::normalize`].
//!
//! The engine ships no built-in patterns (§4.C); callers supply a
//! `RuleSet`, typically deserialized from the settings collaborator. Rules
//! run in the order given, same as the teacher's `clone_regex` list being
//! compiled and applied top-to-bottom.

use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagGroup {
    Resolution,
    VideoCodec,
    Country,
    Audio,
    Event,
    Misc,
}

/// One `(tag_group, pattern, extraction)` tuple. `regex` is compiled once at
/// construction so repeated calls to `normalize` never recompile a pattern.
#[derive(Debug, Clone)]
pub struct NormalizationRule {
    pub group: TagGroup,
    pub pattern: String,
    pub regex: Regex,
}

impl NormalizationRule {
    pub fn new(group: TagGroup, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            group,
            pattern: pattern.to_string(),
            regex: Regex::new(pattern)?,
        })
    }
}

/// Serializable form of a rule, as it would come out of the settings
/// collaborator's configuration surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRule {
    pub group: TagGroup,
    pub pattern: String,
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<NormalizationRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<NormalizationRule>) -> Self {
        Self { rules }
    }

    /// Compiles a rule set from externally supplied `(group, pattern)`
    /// pairs, skipping (and reporting) any pattern that fails to compile
    /// rather than aborting the whole set — one bad rule from the settings
    /// collaborator shouldn't disable normalization entirely.
    pub fn compile(raw_rules: &[RawRule]) -> (Self, Vec<(String, regex::Error)>) {
        let mut rules = Vec::with_capacity(raw_rules.len());
        let mut errors = Vec::new();
        for raw in raw_rules {
            match NormalizationRule::new(raw.group, &raw.pattern) {
                Ok(rule) => rules.push(rule),
                Err(err) => errors.push((raw.pattern.clone(), err)),
            }
        }
        (Self { rules }, errors)
    }

    pub fn ordered(&self) -> &[NormalizationRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Loads `(group, pattern)` pairs from a JSON file and compiles them,
    /// logging (but not failing on) any pattern that doesn't compile.
    /// Missing file is treated as "no rules configured".
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let raw: Vec<RawRule> = serde_json::from_str(&text)?;
        let (rules, errors) = Self::compile(&raw);
        for (pattern, err) in errors {
            tracing::warn!(pattern, %err, "skipping invalid normalization rule pattern");
        }
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_skips_invalid_patterns_but_keeps_valid_ones() {
        let raw = vec![
            RawRule {
                group: TagGroup::Resolution,
                pattern: r"(?i)\b4K\b".to_string(),
            },
            RawRule {
                group: TagGroup::Misc,
                pattern: r"(unterminated".to_string(),
            },
        ];
        let (set, errors) = RuleSet::compile(&raw);
        assert_eq!(set.ordered().len(), 1);
        assert_eq!(errors.len(), 1);
    }
}
