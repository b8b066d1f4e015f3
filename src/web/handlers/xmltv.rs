//! `GET /xmltv` (§4.F / §6). Gzip negotiation is handled transparently by
//! the router's `CompressionLayer`, not here — this handler only has to
//! stream uncompressed chunks.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures::StreamExt;

use crate::emitters::{self, xmltv::render_stream};
use crate::errors::WebError;
use crate::web::AppState;

pub async fn xmltv(State(state): State<AppState>) -> Result<Response, WebError> {
    let channels = state.catalog.channels().list_enabled().await?;
    let mut groups = Vec::new();
    let mut portal_epg_offsets: HashMap<String, i32> = HashMap::new();
    for portal in state.catalog.portals().list_enabled_portals().await? {
        groups.extend(state.catalog.portals().list_groups(&portal.portal_id).await?);
        portal_epg_offsets.insert(portal.portal_id.clone(), portal.epg_offset);
    }

    let eligible = emitters::eligible_channels(channels, &groups);
    let stream = render_stream(
        eligible,
        portal_epg_offsets,
        state.epg_repo.clone(),
        state.epg_manager.clone(),
    )
    .map(|chunk| chunk.map_err(std::io::Error::other));

    let body = Body::from_stream(stream);
    Ok((
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        body,
    )
        .into_response())
}
