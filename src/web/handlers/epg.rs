//! `POST /api/epg/refresh` and `GET /api/epg/status` (§4.E / §6).

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::errors::WebError;
use crate::web::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RefreshRequest {
    #[serde(default)]
    epg_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    queued: Vec<String>,
}

pub async fn refresh(
    State(state): State<AppState>,
    body: Option<Json<RefreshRequest>>,
) -> Result<Json<RefreshResponse>, WebError> {
    let scope = body.map(|Json(b)| b).unwrap_or_default();
    let ids = match scope.epg_ids {
        Some(ids) => ids,
        None => state
            .epg_repo
            .list_enabled()
            .await?
            .into_iter()
            .map(|s| s.source_id)
            .collect(),
    };

    for source_id in ids.clone() {
        let manager = state.epg_manager.clone();
        tokio::spawn(async move {
            if let Err(err) = manager.refresh(&source_id, true).await {
                tracing::warn!(source_id, %err, "epg refresh failed");
            }
        });
    }

    Ok(Json(RefreshResponse { queued: ids }))
}

#[derive(Debug, Serialize)]
pub struct SourceStatus {
    source_id: String,
    name: String,
    enabled: bool,
    last_fetch: Option<chrono::DateTime<chrono::Utc>>,
    last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    is_refreshing: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    is_refreshing: bool,
    last_refresh: Option<chrono::DateTime<chrono::Utc>>,
    sources: Vec<SourceStatus>,
}

pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, WebError> {
    let rows = state.epg_repo.list_all().await?;

    let mut sources = Vec::with_capacity(rows.len());
    let mut last_refresh = None;
    for row in rows {
        let is_refreshing = state.epg_manager.is_refreshing(&row.source_id).await;
        if row.last_refresh > last_refresh {
            last_refresh = row.last_refresh;
        }
        sources.push(SourceStatus {
            source_id: row.source_id,
            name: row.name,
            enabled: row.enabled,
            last_fetch: row.last_fetch,
            last_refresh: row.last_refresh,
            is_refreshing,
        });
    }

    Ok(Json(StatusResponse {
        is_refreshing: state.epg_manager.any_refreshing().await,
        last_refresh,
        sources,
    }))
}
