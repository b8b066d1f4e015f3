//! `config.json` loading/saving.
//!
//! The on-disk shape is mandated by the external-interfaces contract:
//! `{settings: {...}, portals: {<portal_id>: {...}}}`. Unknown keys must be
//! preserved across a read-modify-write, so every level carries a
//! `#[serde(flatten)] extra: serde_json::Map<String, Value>` bucket the way
//! the teacher's layered config keeps forward-compatibility with fields it
//! doesn't yet model.

pub mod defaults;
pub mod env;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub portals: HashMap<String, PortalEntry>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host used to build playlist URLs when the request has no usable Host
    /// header. Empty string means "fall back to the request's Host header".
    #[serde(default)]
    pub public_host: String,

    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    #[serde(default = "default_channel_refresh_interval_hours")]
    pub channel_refresh_interval_hours: u32,
    #[serde(default = "default_epg_refresh_interval_hours")]
    pub epg_refresh_interval_hours: u32,

    #[serde(default = "default_match_floor")]
    pub match_score_floor: f64,

    #[serde(default)]
    pub scheduler: SchedulerWeights,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_match_floor() -> f64 {
    DEFAULT_MATCH_SCORE_FLOOR
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            port: default_port(),
            public_host: String::new(),
            data_dir: default_data_dir(),
            log_dir: default_log_dir(),
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            channel_refresh_interval_hours: default_channel_refresh_interval_hours(),
            epg_refresh_interval_hours: default_epg_refresh_interval_hours(),
            match_score_floor: default_match_floor(),
            scheduler: SchedulerWeights::default(),
            extra: serde_json::Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerWeights {
    #[serde(default = "default_w_idle")]
    pub w_idle: f64,
    #[serde(default = "default_w_slots")]
    pub w_slots: f64,
    #[serde(default = "default_w_expiry")]
    pub w_expiry: f64,
}

fn default_w_idle() -> f64 {
    DEFAULT_SCHEDULER_WEIGHT_IDLE
}
fn default_w_slots() -> f64 {
    DEFAULT_SCHEDULER_WEIGHT_SLOTS
}
fn default_w_expiry() -> f64 {
    DEFAULT_SCHEDULER_WEIGHT_EXPIRY
}

impl Default for SchedulerWeights {
    fn default() -> Self {
        Self {
            w_idle: default_w_idle(),
            w_slots: default_w_slots(),
            w_expiry: default_w_expiry(),
        }
    }
}

/// One entry of `portals.<portal_id>` in `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalEntry {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub proxy: Option<String>,

    #[serde(rename = "streams per mac", default)]
    pub streams_per_mac: u32,
    #[serde(rename = "epg offset", default)]
    pub epg_offset: i32,
    #[serde(rename = "fetch epg", default = "default_true")]
    pub fetch_epg: bool,
    #[serde(rename = "auto normalize names", default = "default_true")]
    pub auto_normalize_names: bool,
    #[serde(rename = "auto match", default = "default_true")]
    pub auto_match: bool,

    #[serde(default)]
    pub macs: HashMap<String, MacEntry>,

    #[serde(default)]
    pub selected_genres: Vec<String>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MacEntry {
    pub expiry: Option<NaiveDate>,
    #[serde(default)]
    pub watchdog_timeout: i64,
    #[serde(default)]
    pub playback_limit: i64,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Config {
    /// Load `config.json` from disk, applying `EnvOverrides` on top (§6).
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config: Config = if path.exists() {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            serde_json::from_str(&text)
                .with_context(|| format!("parsing config file {}", path.display()))?
        } else {
            Config::default()
        };

        env::EnvOverrides::from_environment().apply(&mut config);
        Ok(config)
    }

    /// Persist `config.json`, preserving unknown fields captured in `extra`.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("writing config file {}", path.display()))?;
        Ok(())
    }

    pub fn channels_db_path(&self) -> PathBuf {
        Path::new(&self.settings.data_dir).join("channels.db")
    }

    pub fn epg_sources_dir(&self) -> PathBuf {
        Path::new(&self.settings.data_dir).join("epg_sources")
    }

    pub fn epg_source_db_path(&self, source_id: &str) -> PathBuf {
        self.epg_sources_dir().join(format!("{source_id}.db"))
    }

    pub fn app_log_path(&self) -> PathBuf {
        Path::new(&self.settings.log_dir).join("app.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_round_trip() {
        let raw = r#"{
            "settings": {"port": 9090, "weird_future_field": 42},
            "portals": {
                "p1": {
                    "name": "Portal 1",
                    "url": "http://portal.example",
                    "streams per mac": 2,
                    "epg offset": 60,
                    "fetch epg": true,
                    "auto normalize names": true,
                    "auto match": false,
                    "macs": {"00:1A:2B:3C:4D:5E": {"expiry": "2030-01-01", "watchdog_timeout": 900, "playback_limit": 2}},
                    "selected_genres": ["1", "2"],
                    "some_future_portal_field": "kept"
                }
            }
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.settings.port, 9090);
        let portal = &config.portals["p1"];
        assert_eq!(portal.streams_per_mac, 2);
        assert_eq!(portal.epg_offset, 60);
        assert!(!portal.auto_match);
        assert_eq!(
            portal.extra.get("some_future_portal_field").unwrap(),
            "kept"
        );

        let round_tripped = serde_json::to_string(&config).unwrap();
        let reparsed: serde_json::Value = serde_json::from_str(&round_tripped).unwrap();
        assert_eq!(
            reparsed["portals"]["p1"]["some_future_portal_field"],
            "kept"
        );
        assert_eq!(reparsed["settings"]["weird_future_field"], 42);
    }
}
