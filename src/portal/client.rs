//! Per-session portal client (§4.A).
//!
//! Constructed for exactly one `(portal_url, mac_address)` pair and thrown
//! away after use, the way the teacher's `XtreamSourceHandler` is built
//! fresh per call rather than kept as a long-lived session object. Holds a
//! token acquired via [`PortalClient::get_token`] and threads it through the
//! rest of the handshake.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::{Client, StatusCode};

use super::protocol::{
    build_headers, parse_expiry, ChannelsResponse, GenresResponse, HandshakeResponse, LinkResponse,
    PortalProfile, ProfileResponse, RawChannel, RawGenre,
};
use super::retry::with_retry;
use crate::config::defaults::{DEFAULT_PORTAL_CALL_TIMEOUT_SECS, DEFAULT_PER_MAC_LISTING_TIMEOUT_SECS};
use crate::errors::PortalError;
use chrono::NaiveDate;

/// Talks to one portal on behalf of one MAC address.
pub struct PortalClient {
    http: Client,
    base_url: String,
    mac_address: String,
    token: Option<String>,
}

impl PortalClient {
    /// Builds a dedicated HTTP client carrying the configured timeout and
    /// optional upstream proxy, mirroring the teacher's per-source-handler
    /// construction pattern rather than sharing one client across portals.
    pub fn new(base_url: impl Into<String>, mac_address: impl Into<String>, proxy: Option<&str>) -> Result<Self, PortalError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(DEFAULT_PORTAL_CALL_TIMEOUT_SECS));
        if let Some(proxy_url) = proxy {
            let proxy = reqwest::Proxy::all(proxy_url)
                .map_err(|e| PortalError::Unreachable(format!("invalid proxy {proxy_url}: {e}")))?;
            builder = builder.proxy(proxy);
        }
        let http = builder
            .build()
            .map_err(|e| PortalError::Unreachable(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            mac_address: mac_address.into(),
            token: None,
        })
    }

    fn portal_url(&self) -> String {
        format!("{}/portal.php", self.base_url.trim_end_matches('/'))
    }

    fn headers(&self) -> reqwest::header::HeaderMap {
        build_headers(&self.base_url, &self.mac_address, self.token.as_deref())
    }

    /// `action=handshake`. Acquires the session token and retains it for the
    /// rest of this client's lifetime.
    pub async fn get_token(&mut self) -> Result<String, PortalError> {
        let token = with_retry(|| self.handshake_once()).await?;
        self.token = Some(token.clone());
        Ok(token)
    }

    async fn handshake_once(&self) -> Result<String, PortalError> {
        let response = self
            .http
            .get(self.portal_url())
            .headers(self.headers())
            .query(&[("type", "stb"), ("action", "handshake")])
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
            return Err(PortalError::Throttled(format!("handshake returned {status}")));
        }
        if !status.is_success() {
            return Err(PortalError::AuthFailed(format!("handshake returned {status}")));
        }

        let body: HandshakeResponse = response
            .json()
            .await
            .map_err(|e| PortalError::AuthFailed(format!("invalid handshake body: {e}")))?;
        body.js
            .and_then(|js| js.token)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| PortalError::AuthFailed("handshake response missing token".into()))
    }

    /// `action=get_profile`. Returns the portal's reported watchdog timeout
    /// and per-MAC playback limit.
    pub async fn get_profile(&self) -> Result<PortalProfile, PortalError> {
        with_retry(|| self.get_profile_once()).await
    }

    async fn get_profile_once(&self) -> Result<PortalProfile, PortalError> {
        let response = self
            .http
            .get(self.portal_url())
            .headers(self.headers())
            .query(&[("type", "stb"), ("action", "get_profile")])
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        ensure_success(response.status())?;
        let body: ProfileResponse = response
            .json()
            .await
            .map_err(|e| PortalError::AuthFailed(format!("invalid profile body: {e}")))?;
        let js = body.js.unwrap_or(super::protocol::ProfileJs {
            watchdog_timeout: None,
            max_online_time: None,
            phone: None,
            tariff_expired_date: None,
        });
        Ok(PortalProfile {
            watchdog_timeout_seconds: js.watchdog_timeout,
            playback_limit: js.max_online_time,
        })
    }

    /// Derives the MAC's tariff expiry date from `get_profile`, per §4.A.
    pub async fn get_expiry(&self) -> Result<Option<NaiveDate>, PortalError> {
        let response = with_retry(|| async {
            let response = self
                .http
                .get(self.portal_url())
                .headers(self.headers())
                .query(&[("type", "stb"), ("action", "get_profile")])
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;
            ensure_success(response.status())?;
            response
                .json::<ProfileResponse>()
                .await
                .map_err(|e| PortalError::AuthFailed(format!("invalid profile body: {e}")))
        })
        .await?;
        Ok(response
            .js
            .and_then(|js| parse_expiry(js.tariff_expired_date.as_deref())))
    }

    /// `action=get_all_channels`, paginated and deduplicated by `channel_id`.
    pub async fn get_all_channels(&self) -> Result<Vec<RawChannel>, PortalError> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut page = 1u32;
        loop {
            let page_items = with_retry(|| self.get_channels_page(page)).await?;
            if page_items.is_empty() {
                break;
            }
            let page_len = page_items.len();
            for channel in page_items {
                if seen.insert(channel.channel_id.clone()) {
                    out.push(channel);
                }
            }
            if page_len < 1 {
                break;
            }
            page += 1;
            if page > 10_000 {
                // portal protocol bug guard: never loop forever on a broken `total_items`
                break;
            }
        }
        Ok(out)
    }

    async fn get_channels_page(&self, page: u32) -> Result<Vec<RawChannel>, PortalError> {
        let response = self
            .http
            .get(self.portal_url())
            .headers(self.headers())
            .timeout(Duration::from_secs(DEFAULT_PER_MAC_LISTING_TIMEOUT_SECS))
            .query(&[
                ("type", "itv"),
                ("action", "get_ordered_list"),
                ("genre", "*"),
                ("p", &page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        ensure_success(response.status())?;
        let body: ChannelsResponse = response
            .json()
            .await
            .map_err(|e| PortalError::AuthFailed(format!("invalid channel list body: {e}")))?;
        let items = body.js.map(|js| js.data).unwrap_or_default();
        Ok(items
            .into_iter()
            .map(|c| RawChannel {
                channel_id: c.id,
                name: c.name.unwrap_or_default(),
                number: c.number,
                genre: None,
                genre_id: c.tv_genre_id,
                logo: c.logo,
                cmd: c.cmd,
            })
            .collect())
    }

    /// `action=get_genres`.
    pub async fn get_genres(&self) -> Result<Vec<RawGenre>, PortalError> {
        with_retry(|| self.get_genres_once()).await
    }

    async fn get_genres_once(&self) -> Result<Vec<RawGenre>, PortalError> {
        let response = self
            .http
            .get(self.portal_url())
            .headers(self.headers())
            .query(&[("type", "itv"), ("action", "get_genres")])
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;
        ensure_success(response.status())?;
        let body: GenresResponse = response
            .json()
            .await
            .map_err(|e| PortalError::AuthFailed(format!("invalid genres body: {e}")))?;
        Ok(body
            .js
            .unwrap_or_default()
            .into_iter()
            .map(|g| RawGenre {
                genre_id: g.id,
                name: g.title,
            })
            .collect())
    }

    /// `action=create_link` for a single channel. A sentinel empty/missing
    /// `cmd` becomes [`PortalError::NoLink`], which the dispatcher treats as
    /// "try the next MAC", not as a retryable transport failure.
    pub async fn get_link(&self, channel_id: &str) -> Result<String, PortalError> {
        let cmd = format!("ffrt1 http://localhost/ch/{channel_id}_");
        let response = with_retry(|| async {
            let response = self
                .http
                .get(self.portal_url())
                .headers(self.headers())
                .query(&[
                    ("type", "itv"),
                    ("action", "create_link"),
                    ("cmd", cmd.as_str()),
                    ("series", ""),
                ])
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;
            ensure_success(response.status())?;
            response
                .json::<LinkResponse>()
                .await
                .map_err(|e| PortalError::AuthFailed(format!("invalid link body: {e}")))
        })
        .await?;

        response
            .js
            .and_then(|js| js.cmd)
            .filter(|cmd| !cmd.trim().is_empty())
            .ok_or_else(|| PortalError::NoLink {
                channel_id: channel_id.to_string(),
            })
    }

    /// `action=get_epg_info` for the given channel ids. The raw XMLTV-ish
    /// payload is handed to the EPG source manager rather than parsed here;
    /// not every portal implements this action, so a throttled/unreachable
    /// portal simply yields no short-form EPG for this cycle.
    pub async fn get_epg(&self, channel_ids: &[String]) -> Result<serde_json::Value, PortalError> {
        let ids = channel_ids.join(",");
        with_retry(|| async {
            let response = self
                .http
                .get(self.portal_url())
                .headers(self.headers())
                .query(&[("type", "itv"), ("action", "get_epg_info"), ("ids", ids.as_str())])
                .send()
                .await
                .map_err(|e| classify_transport_error(&e))?;
            ensure_success(response.status())?;
            response
                .json::<serde_json::Value>()
                .await
                .map_err(|e| PortalError::AuthFailed(format!("invalid epg body: {e}")))
        })
        .await
    }
}

fn ensure_success(status: StatusCode) -> Result<(), PortalError> {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return Err(PortalError::Throttled(format!("portal returned {status}")));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(PortalError::AuthFailed(format!("portal returned {status}")));
    }
    if !status.is_success() {
        return Err(PortalError::Unreachable(format!("portal returned {status}")));
    }
    Ok(())
}

fn classify_transport_error(err: &reqwest::Error) -> PortalError {
    if err.is_timeout() || err.is_connect() {
        PortalError::Unreachable(err.to_string())
    } else {
        PortalError::Unreachable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portal_url_strips_trailing_slash() {
        let client = PortalClient::new("http://portal.example/", "00:1A:2B:3C:4D:5E", None).unwrap();
        assert_eq!(client.portal_url(), "http://portal.example/portal.php");
    }

    #[test]
    fn rejects_unparseable_proxy() {
        let result = PortalClient::new("http://portal.example", "00:1A:2B:3C:4D:5E", Some("::not a url::"));
        assert!(result.is_err());
    }
}
