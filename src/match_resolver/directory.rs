//! The cached external directory dataset that [`super::resolve`] queries.
//!
//! In production this is loaded once (e.g. from a bundled channels
//! database snapshot) and held for the lifetime of a refresh cycle; the
//! resolver never refetches it per channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub source: String,
    pub station_id: String,
    pub call_sign: Option<String>,
    pub logo: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchDirectory {
    entries: Vec<DirectoryEntry>,
}

impl MatchDirectory {
    pub fn new(entries: Vec<DirectoryEntry>) -> Self {
        Self { entries }
    }

    /// Loads a directory snapshot from a JSON file of `DirectoryEntry`
    /// objects. Missing file is treated as an empty directory — the
    /// resolver simply never produces a match until one is supplied.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let entries: Vec<DirectoryEntry> = serde_json::from_str(&text)?;
        Ok(Self::new(entries))
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
