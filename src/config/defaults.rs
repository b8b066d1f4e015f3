//! Configuration default values, centralized so they're easy to change.

// Web server defaults
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Paths
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_LOG_DIR: &str = "./logs";

// External binaries
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_FFPROBE: &str = "ffprobe";

// Refresh intervals (hours). 0 disables the loop.
pub const DEFAULT_CHANNEL_REFRESH_INTERVAL_HOURS: u32 = 12;
pub const DEFAULT_EPG_REFRESH_INTERVAL_HOURS: u32 = 6;

// Portal client
pub const DEFAULT_PORTAL_CALL_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_PER_MAC_LISTING_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAYS_MS: [u64; 3] = [250, 1000, 4000];
pub const DEFAULT_RETRY_JITTER_PCT: f64 = 0.20;

// EPG
pub const DEFAULT_EPG_DOWNLOAD_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_EPG_PROGRAMME_BATCH_SIZE: usize = 5_000;
pub const DEFAULT_EPG_RETENTION_DAYS: i64 = 1;
pub const DEFAULT_EPG_GLOBAL_REFRESH_CONCURRENCY: usize = 4;

// Soft-delete TTL for channels that vanish from every MAC listing.
pub const DEFAULT_SOFT_DELETE_TTL_HOURS: i64 = 24 * 7;

// Stream dispatcher
pub const DEFAULT_STREAM_STARTUP_GRACE_SECS: u64 = 3;
pub const DEFAULT_STREAM_KILL_GRACE_SECS: u64 = 5;

// Matching
pub const DEFAULT_MATCH_SCORE_FLOOR: f64 = 0.65;

// MAC scheduler weights
pub const DEFAULT_SCHEDULER_WEIGHT_IDLE: f64 = 1.0;
pub const DEFAULT_SCHEDULER_WEIGHT_SLOTS: f64 = 0.6;
pub const DEFAULT_SCHEDULER_WEIGHT_EXPIRY: f64 = 0.4;

pub fn default_bind_host() -> String {
    DEFAULT_BIND_HOST.to_string()
}

pub fn default_port() -> u16 {
    DEFAULT_PORT
}

pub fn default_data_dir() -> String {
    DEFAULT_DATA_DIR.to_string()
}

pub fn default_log_dir() -> String {
    DEFAULT_LOG_DIR.to_string()
}

pub fn default_ffmpeg() -> String {
    DEFAULT_FFMPEG.to_string()
}

pub fn default_ffprobe() -> String {
    DEFAULT_FFPROBE.to_string()
}

pub fn default_channel_refresh_interval_hours() -> u32 {
    DEFAULT_CHANNEL_REFRESH_INTERVAL_HOURS
}

pub fn default_epg_refresh_interval_hours() -> u32 {
    DEFAULT_EPG_REFRESH_INTERVAL_HOURS
}
