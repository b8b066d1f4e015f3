//! HTTP Surface (§4.K), with the exact endpoint contracts from §6.
//!
//! Thin handlers delegating to the catalog/epg/dispatcher layers, the same
//! shape the teacher's `WebServer`/`AppState` keep: one `Router` built over
//! a cloneable `AppState`, with `tower_http`'s `CorsLayer` (and, here,
//! `CompressionLayer` for `/xmltv`'s gzip negotiation) as the only
//! cross-cutting middleware this surface needs.

pub mod error;
pub mod handlers;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::sync::RwLock;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::catalog::CatalogStore;
use crate::config::Config;
use crate::database::repositories::EpgSourceRepository;
use crate::dispatcher::active_sessions::ActiveSessions;
use crate::dispatcher::session_table::SessionTable;
use crate::epg::EpgSourceManager;
use crate::match_resolver::directory::MatchDirectory;
use crate::normalize::RuleSet;

/// Shared state handed to every handler, cloned per request (all fields
/// are `Arc`/cheaply-cloneable handles, not owned data).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub config_path: Arc<PathBuf>,
    pub catalog: Arc<CatalogStore>,
    pub epg_manager: Arc<EpgSourceManager>,
    pub epg_repo: EpgSourceRepository,
    pub sessions: Arc<SessionTable>,
    pub active_sessions: Arc<ActiveSessions>,
    pub rules: Arc<RuleSet>,
    pub directory: Arc<MatchDirectory>,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub async fn new(state: AppState) -> anyhow::Result<Self> {
        let (bind_host, port) = {
            let cfg = state.config.read().await;
            (cfg.settings.bind_host.clone(), cfg.settings.port)
        };
        let addr: SocketAddr = format!("{bind_host}:{port}").parse()?;
        let app = Self::create_router(state);
        Ok(Self { app, addr })
    }

    fn create_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(handlers::health::health))
            .route("/playlist.m3u", get(handlers::playlist::playlist_m3u))
            .route("/xmltv", get(handlers::xmltv::xmltv))
            .route("/play/:portal_id/:channel_id", get(handlers::stream::play))
            .route("/streaming", get(handlers::stream::streaming))
            .route("/api/portal/refresh", post(handlers::portal::refresh))
            .route(
                "/api/portal/refresh/status",
                post(handlers::portal::refresh_status),
            )
            .route("/api/portal/mac/delete", post(handlers::portal::mac_delete))
            .route(
                "/api/portal/macs/refresh",
                post(handlers::portal::macs_refresh),
            )
            .route("/api/portal/groups", post(handlers::portal::groups))
            .route(
                "/api/portal/genres/list",
                post(handlers::portal::genres_list),
            )
            .route("/api/portal/genres", post(handlers::portal::set_genres))
            .route("/api/epg/refresh", post(handlers::epg::refresh))
            .route("/api/epg/status", get(handlers::epg::status))
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        info!(addr = %self.addr, "starting HTTP surface");
        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(
            listener,
            self.app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}
