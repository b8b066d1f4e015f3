//! Environment variable overrides, applied on top of `config.json`.
//!
//! Names and precedence are exact per the external-interfaces contract: these
//! always win over the file, the way the teacher's CLI flags win over the
//! config file in `main.rs`.

use super::Config;

#[derive(Debug, Default)]
pub struct EnvOverrides {
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub public_host: Option<String>,
    pub data_dir: Option<String>,
    pub log_dir: Option<String>,
    pub ffmpeg: Option<String>,
    pub ffprobe: Option<String>,
    pub epg_refresh_interval: Option<u32>,
    pub channel_refresh_interval: Option<u32>,
}

impl EnvOverrides {
    pub fn from_environment() -> Self {
        Self {
            bind_host: std::env::var("BIND_HOST").ok(),
            port: std::env::var("PORT").ok().and_then(|v| v.parse().ok()),
            public_host: std::env::var("PUBLIC_HOST").ok(),
            data_dir: std::env::var("DATA_DIR").ok(),
            log_dir: std::env::var("LOG_DIR").ok(),
            ffmpeg: std::env::var("FFMPEG").ok(),
            ffprobe: std::env::var("FFPROBE").ok(),
            epg_refresh_interval: std::env::var("EPG_REFRESH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok()),
            channel_refresh_interval: std::env::var("CHANNEL_REFRESH_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok()),
        }
    }

    pub fn apply(self, config: &mut Config) {
        if let Some(v) = self.bind_host {
            config.settings.bind_host = v;
        }
        if let Some(v) = self.port {
            config.settings.port = v;
        }
        if let Some(v) = self.public_host {
            config.settings.public_host = v;
        }
        if let Some(v) = self.data_dir {
            config.settings.data_dir = v;
        }
        if let Some(v) = self.log_dir {
            config.settings.log_dir = v;
        }
        if let Some(v) = self.ffmpeg {
            config.settings.ffmpeg = v;
        }
        if let Some(v) = self.ffprobe {
            config.settings.ffprobe = v;
        }
        if let Some(v) = self.epg_refresh_interval {
            config.settings.epg_refresh_interval_hours = v;
        }
        if let Some(v) = self.channel_refresh_interval {
            config.settings.channel_refresh_interval_hours = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_present_vars() {
        let mut config = Config::default();
        let original_port = config.settings.port;
        let overrides = EnvOverrides {
            bind_host: Some("127.0.0.1".to_string()),
            ..Default::default()
        };
        overrides.apply(&mut config);
        assert_eq!(config.settings.bind_host, "127.0.0.1");
        assert_eq!(config.settings.port, original_port);
    }
}
