//! `/api/portal/*` handlers (§4.B / §4.H / §6).

use axum::extract::State;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::catalog::{RefreshPhase, RefreshStats};
use crate::errors::{AppError, WebError};
use crate::web::AppState;

#[derive(Debug, Deserialize)]
pub struct PortalIdRequest {
    portal_id: String,
}

fn phase_str(phase: RefreshPhase) -> &'static str {
    match phase {
        RefreshPhase::Queued => "queued",
        RefreshPhase::Running => "running",
        RefreshPhase::Completed => "completed",
        RefreshPhase::Failed => "failed",
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    stats: Option<RefreshStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn portal_entry(state: &AppState, portal_id: &str) -> Result<crate::config::PortalEntry, WebError> {
    state
        .config
        .read()
        .await
        .portals
        .get(portal_id)
        .cloned()
        .ok_or_else(|| WebError::NotFound {
            resource: format!("portal {portal_id}"),
        })
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<PortalIdRequest>,
) -> Result<Json<RefreshResponse>, WebError> {
    let entry = portal_entry(&state, &req.portal_id).await?;

    let catalog = state.catalog.clone();
    let rules = state.rules.clone();
    let directory = state.directory.clone();
    let match_floor = state.config.read().await.settings.match_score_floor;
    let portal_id = req.portal_id.clone();
    tokio::spawn(async move {
        if let Err(err) = catalog
            .refresh_portal(&portal_id, &entry, &rules, &directory, match_floor)
            .await
        {
            tracing::warn!(portal_id, %err, "portal refresh failed");
        }
    });

    let record = state.catalog.refresh_status(&req.portal_id).await;
    Ok(Json(match record {
        Some(record) => RefreshResponse {
            status: phase_str(record.phase),
            stats: record.stats,
            error: record.error,
        },
        None => RefreshResponse {
            status: "queued",
            stats: None,
            error: None,
        },
    }))
}

pub async fn refresh_status(
    State(state): State<AppState>,
    Json(req): Json<PortalIdRequest>,
) -> Result<Json<RefreshResponse>, WebError> {
    let record = state.catalog.refresh_status(&req.portal_id).await;
    Ok(Json(match record {
        Some(record) => RefreshResponse {
            status: phase_str(record.phase),
            stats: record.stats,
            error: record.error,
        },
        None => RefreshResponse {
            status: "queued",
            stats: None,
            error: Some("no refresh has been started for this portal".to_string()),
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct MacDeleteRequest {
    portal_id: String,
    mac: String,
}

pub async fn mac_delete(
    State(state): State<AppState>,
    Json(req): Json<MacDeleteRequest>,
) -> Result<Json<serde_json::Value>, WebError> {
    state
        .catalog
        .portals()
        .delete_mac(&req.portal_id, &req.mac)
        .await
        .map_err(WebError::from)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Serialize)]
pub struct MacsRefreshResponse {
    updated: usize,
}

pub async fn macs_refresh(
    State(state): State<AppState>,
    Json(req): Json<PortalIdRequest>,
) -> Result<Json<MacsRefreshResponse>, WebError> {
    let entry = portal_entry(&state, &req.portal_id).await?;
    let updated = state
        .catalog
        .refresh_mac_profiles(&req.portal_id, &entry)
        .await
        .map_err(WebError::from)?;
    Ok(Json(MacsRefreshResponse { updated }))
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    genre_id: String,
    name: String,
    channel_count: i32,
    active: bool,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    total: usize,
    active: usize,
    groups: Vec<GroupInfo>,
}

pub async fn groups(
    State(state): State<AppState>,
    Json(req): Json<PortalIdRequest>,
) -> Result<Json<GroupsResponse>, WebError> {
    let rows = state
        .catalog
        .portals()
        .list_groups(&req.portal_id)
        .await
        .map_err(WebError::from)?;

    let active = rows.iter().filter(|g| g.active).count();
    let groups = rows
        .into_iter()
        .map(|g| GroupInfo {
            genre_id: g.genre_id,
            name: g.name,
            channel_count: g.channel_count,
            active: g.active,
        })
        .collect::<Vec<_>>();

    Ok(Json(GroupsResponse {
        total: groups.len(),
        active,
        groups,
    }))
}

#[derive(Debug, Serialize)]
pub struct GenreInfo {
    genre_id: String,
    name: String,
}

pub async fn genres_list(
    State(state): State<AppState>,
    Json(req): Json<PortalIdRequest>,
) -> Result<Json<Vec<GenreInfo>>, WebError> {
    let entry = portal_entry(&state, &req.portal_id).await?;
    let today = chrono::Utc::now().date_naive();
    let macs = state
        .catalog
        .portals()
        .list_non_expired_macs(&req.portal_id, today)
        .await
        .map_err(WebError::from)?;
    let mac = macs.first().ok_or_else(|| WebError::NotFound {
        resource: format!("non-expired mac for portal {}", req.portal_id),
    })?;

    let client = crate::portal::client::PortalClient::new(&entry.url, &mac.mac_address, entry.proxy.as_deref())
        .map_err(|e| WebError::from(AppError::Portal(e)))?;
    let genres = client
        .get_genres()
        .await
        .map_err(|e| WebError::from(AppError::Portal(e)))?;

    Ok(Json(
        genres
            .into_iter()
            .map(|g| GenreInfo {
                genre_id: g.genre_id,
                name: g.name,
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct SetGenresRequest {
    portal_id: String,
    genre_ids: Vec<String>,
}

pub async fn set_genres(
    State(state): State<AppState>,
    Json(req): Json<SetGenresRequest>,
) -> Result<Json<serde_json::Value>, WebError> {
    {
        let mut config = state.config.write().await;
        let Some(entry) = config.portals.get_mut(&req.portal_id) else {
            return Err(WebError::NotFound {
                resource: format!("portal {}", req.portal_id),
            });
        };
        entry.selected_genres = req.genre_ids.clone();
        let path = state.config_path.as_ref().clone();
        config
            .save_to_file(&path)
            .map_err(|e| WebError::Upstream(e.to_string()))?;
    }

    let all_groups = state
        .catalog
        .portals()
        .list_groups(&req.portal_id)
        .await
        .map_err(WebError::from)?;
    let all_ids: Vec<String> = all_groups.iter().map(|g| g.genre_id.clone()).collect();
    let selected: std::collections::HashSet<&String> = req.genre_ids.iter().collect();
    let (active_ids, inactive_ids): (Vec<String>, Vec<String>) =
        all_ids.into_iter().partition(|id| selected.contains(id));

    state
        .catalog
        .portals()
        .set_groups_active(&req.portal_id, &active_ids, true)
        .await
        .map_err(WebError::from)?;
    state
        .catalog
        .portals()
        .set_groups_active(&req.portal_id, &inactive_ids, false)
        .await
        .map_err(WebError::from)?;

    Ok(Json(serde_json::json!({ "updated": true })))
}
