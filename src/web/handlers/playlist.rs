//! `GET /playlist.m3u` (§4.G / §6).

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};

use crate::emitters::{self, m3u};
use crate::errors::WebError;
use crate::web::AppState;

pub async fn playlist_m3u(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, WebError> {
    let public_host = state.config.read().await.settings.public_host.clone();
    let host_header = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok());
    let base_url = crate::utils::resolve_base_url(&public_host, host_header);

    let channels = state.catalog.channels().list_enabled().await?;
    let mut groups = Vec::new();
    for portal in state.catalog.portals().list_enabled_portals().await? {
        groups.extend(state.catalog.portals().list_groups(&portal.portal_id).await?);
    }

    let eligible = emitters::eligible_channels(channels, &groups);
    let body = m3u::render(&eligible, &groups, &base_url);

    Ok((
        [(header::CONTENT_TYPE, "audio/x-mpegurl")],
        body,
    )
        .into_response())
}
