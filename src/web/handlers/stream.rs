//! `GET /play/{portal_id}/{channel_id}` and `GET /streaming` (§4.I / §6).

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use tracing::warn;

use crate::dispatcher::{self, session_table::SessionTable};
use crate::errors::WebError;
use crate::scheduler::{self, MacCandidate};
use crate::web::AppState;

pub async fn play(
    State(state): State<AppState>,
    Path((portal_id, channel_id)): Path<(String, String)>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
) -> Result<Response, WebError> {
    let entry = {
        let cfg = state.config.read().await;
        cfg.portals
            .get(&portal_id)
            .cloned()
            .filter(|p| p.enabled)
            .ok_or_else(|| WebError::NotFound {
                resource: format!("portal {portal_id}"),
            })?
    };

    let channel = state
        .catalog
        .channels()
        .get(&portal_id, &channel_id)
        .await?
        .filter(|c| c.enabled)
        .ok_or_else(|| WebError::NotFound {
            resource: format!("channel {portal_id}/{channel_id}"),
        })?;

    let today = Utc::now().date_naive();
    let macs = state.catalog.portals().list_non_expired_macs(&portal_id, today).await?;
    let candidates: Vec<MacCandidate> = macs
        .iter()
        .map(|m| {
            MacCandidate::from_model_capped(
                m,
                state.sessions.live_count(&m.mac_address),
                entry.streams_per_mac as i64,
            )
        })
        .collect();

    let scheduler_weights = state.config.read().await.settings.scheduler.clone();
    let ordered = scheduler::select(candidates, &scheduler_weights, today);

    let ffmpeg_path = state.config.read().await.settings.ffmpeg.clone();
    let dispatched = dispatcher::dispatch(
        &entry.url,
        entry.proxy.as_deref(),
        ordered,
        &channel_id,
        &ffmpeg_path,
        &state.sessions,
    )
    .await?;

    state.active_sessions.register(
        dispatched.session_id,
        &portal_id,
        &entry.name,
        channel.effective_display_name(),
        &dispatched.mac,
        &peer.ip().to_string(),
    );

    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(64);
    let sessions = state.sessions.clone();
    let active_sessions = state.active_sessions.clone();
    let mac = dispatched.mac.clone();
    let session_id = dispatched.session_id;
    tokio::spawn(async move {
        dispatcher::pipe_stdout_to(dispatched.child, dispatched.probed_byte, tx).await;
        sessions.release_session(&mac, session_id);
        active_sessions.deregister(session_id);
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (Ok::<_, std::io::Error>(chunk), rx))
    });

    Ok((
        [(header::CONTENT_TYPE, "video/mp2t")],
        Body::from_stream(stream),
    )
        .into_response())
}

pub async fn streaming(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshot = state.active_sessions.snapshot();
    Json(serde_json::to_value(snapshot).unwrap_or_else(|err| {
        warn!(%err, "failed to serialize active sessions snapshot");
        serde_json::json!({})
    }))
}

#[allow(dead_code)]
fn _assert_session_table_clone(t: &SessionTable) -> &SessionTable {
    t
}
