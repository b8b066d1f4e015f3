//! `GET /health` — ambient liveness probe, not part of §6's portal-facing
//! contract but carried the way the teacher exposes one for its own
//! HTTP surface.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::utils::database_ready;
use crate::web::AppState;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let db_ok = database_ready(state.catalog.channels().connection()).await;
    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(serde_json::json!({ "database": db_ok })))
}
