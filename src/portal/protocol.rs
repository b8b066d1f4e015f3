//! Wire types and header construction for the Stalker/MAC portal protocol.
//!
//! Input structs are strict but tolerant of unknown fields — the design
//! notes call for this explicitly: nullable optional fields, unknown JSON
//! keys ignored, type errors at the boundary surfacing as
//! [`crate::errors::PortalError::AuthFailed`] with a diagnostic string.

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

/// A channel as the portal returns it, before tag extraction/matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChannel {
    pub channel_id: String,
    pub name: String,
    pub number: Option<String>,
    pub genre: Option<String>,
    pub genre_id: Option<String>,
    pub logo: Option<String>,
    /// The portal's stream command; `None`/empty is the "no link" sentinel.
    pub cmd: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawGenre {
    pub genre_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PortalProfile {
    pub watchdog_timeout_seconds: Option<i64>,
    pub playback_limit: Option<i64>,
}

/// `account_status` from `get_profile`, retained for completeness even
/// though the catalog refresh only consumes the numeric fields.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Handshake response shape. Unknown fields are ignored by `serde` default.
#[derive(Debug, Deserialize)]
pub(crate) struct HandshakeResponse {
    pub js: Option<HandshakeJs>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HandshakeJs {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileResponse {
    pub js: Option<ProfileJs>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProfileJs {
    #[serde(default)]
    pub watchdog_timeout: Option<i64>,
    #[serde(default)]
    pub max_online_time: Option<i64>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub tariff_expired_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenresResponse {
    pub js: Option<Vec<GenreJs>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenreJs {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelsResponse {
    pub js: Option<ChannelsJs>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelsJs {
    #[serde(default)]
    pub data: Vec<ChannelJs>,
    #[serde(default)]
    pub total_items: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChannelJs {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub tv_genre_id: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub cmd: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkResponse {
    pub js: Option<LinkJs>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct LinkJs {
    #[serde(default)]
    pub cmd: Option<String>,
}

/// Parses the loose `tariff_expired_date` string the portal reports, best
/// effort; a missing/unparsable value is `None` per `get_expiry`'s contract.
pub fn parse_expiry(raw: Option<&str>) -> Option<NaiveDate> {
    let raw = raw?;
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d"] {
        if let Ok(dt) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(dt);
        }
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Builds the standard Stalker STB headers: a known firmware User-Agent, the
/// MAC carried as a cookie, `X-User-Agent`, `Referer` pinned to the portal
/// base, and (once acquired) a bearer `Authorization` header.
pub fn build_headers(base_url: &str, mac_address: &str, token: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        HeaderValue::from_static(
            "Mozilla/5.0 (QtEmbedded; U; Linux; C) AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3",
        ),
    );
    headers.insert(
        HeaderName::from_static("x-user-agent"),
        HeaderValue::from_static("Model: MAG250; Link: WiFi"),
    );
    if let Ok(value) = HeaderValue::from_str(&format!("mac={mac_address}; stb_lang=en; timezone=UTC")) {
        headers.insert(reqwest::header::COOKIE, value);
    }
    if let Ok(value) = HeaderValue::from_str(base_url) {
        headers.insert(reqwest::header::REFERER, value);
    }
    if let Some(token) = token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_and_datetime_expiry() {
        assert_eq!(
            parse_expiry(Some("2030-01-02")),
            NaiveDate::from_ymd_opt(2030, 1, 2)
        );
        assert_eq!(
            parse_expiry(Some("2030-01-02 00:00:00")),
            NaiveDate::from_ymd_opt(2030, 1, 2)
        );
        assert_eq!(parse_expiry(Some("garbage")), None);
        assert_eq!(parse_expiry(None), None);
    }

    #[test]
    fn headers_carry_mac_and_token() {
        let headers = build_headers("http://portal.example", "00:1A:2B:3C:4D:5E", Some("tok123"));
        assert!(headers
            .get(reqwest::header::COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .contains("00:1A:2B:3C:4D:5E"));
        assert_eq!(
            headers.get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer tok123"
        );
    }
}
