use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::RwLock;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use stalker_proxy::catalog::CatalogStore;
use stalker_proxy::config::Config;
use stalker_proxy::database::repositories::{ChannelRepository, EpgSourceRepository, PortalRepository};
use stalker_proxy::database::Database;
use stalker_proxy::dispatcher::active_sessions::ActiveSessions;
use stalker_proxy::dispatcher::session_table::SessionTable;
use stalker_proxy::epg::EpgSourceManager;
use stalker_proxy::jobs::{spawn_catalog_refresh_loop, spawn_epg_refresh_loop};
use stalker_proxy::logging::AppLogFormat;
use stalker_proxy::match_resolver::directory::MatchDirectory;
use stalker_proxy::normalize::RuleSet;
use stalker_proxy::web::{AppState, WebServer};

#[derive(Parser)]
#[command(name = "stalker-proxy")]
#[command(version)]
#[command(about = "Republishes a Stalker/MAC IPTV portal as M3U + XMLTV and proxies its streams")]
struct Cli {
    /// Path to config.json (falls back to $CONFIG, then "config.json")
    #[arg(short, long)]
    config: Option<String>,

    /// Listening IP address (overrides config.json and $BIND_HOST)
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port (overrides config.json and $PORT)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .or_else(|| std::env::var("CONFIG").ok())
        .unwrap_or_else(|| "config.json".to_string());
    let config_path = PathBuf::from(config_path);

    let mut config = match Config::load_from_file(&config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load config from {}: {err:#}", config_path.display());
            std::process::exit(1);
        }
    };

    if let Some(host) = cli.host {
        config.settings.bind_host = host;
    }
    if let Some(port) = cli.port {
        config.settings.port = port;
    }

    let _log_guard = init_logging(&config.settings.log_dir, &cli.log_level);

    info!("stalker-proxy {} starting up", env!("CARGO_PKG_VERSION"));

    let db_path = std::env::var("DB_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config.channels_db_path());

    let database = match Database::open(&db_path).await {
        Ok(database) => database,
        Err(err) => {
            error!(%err, path = %db_path.display(), "failed to open catalog database");
            std::process::exit(1);
        }
    };
    if let Err(err) = database.migrate().await {
        error!(%err, "failed to apply catalog database migrations");
        std::process::exit(1);
    }
    info!("catalog database ready at {}", db_path.display());

    let pool = database.pool();
    let portal_repo = PortalRepository::new(pool.clone());
    let channel_repo = ChannelRepository::new(pool.clone());

    std::fs::create_dir_all(&config.settings.data_dir)
        .with_context(|| format!("creating data dir {}", config.settings.data_dir))?;
    let epg_sources_dir = config.epg_sources_dir();
    std::fs::create_dir_all(&epg_sources_dir)
        .with_context(|| format!("creating epg sources dir {}", epg_sources_dir.display()))?;

    let epg_db_path = epg_sources_dir.join("epg_sources.db");
    let epg_database = match Database::open(&epg_db_path).await {
        Ok(database) => database,
        Err(err) => {
            error!(%err, path = %epg_db_path.display(), "failed to open epg sources database");
            std::process::exit(1);
        }
    };
    if let Err(err) = epg_database.migrate().await {
        error!(%err, "failed to apply epg sources database migrations");
        std::process::exit(1);
    }
    let epg_repo = EpgSourceRepository::new(epg_database.pool());

    for (portal_id, entry) in &config.portals {
        if let Err(err) = portal_repo.upsert_portal(portal_id, entry).await {
            error!(portal_id, %err, "failed to sync portal from config.json");
        }
    }

    let rules_path = PathBuf::from(&config.settings.data_dir).join("normalization_rules.json");
    let rules = Arc::new(
        RuleSet::load_from_file(&rules_path)
            .with_context(|| format!("loading normalization rules from {}", rules_path.display()))?,
    );
    let directory_path = PathBuf::from(&config.settings.data_dir).join("match_directory.json");
    let directory = Arc::new(
        MatchDirectory::load_from_file(&directory_path)
            .with_context(|| format!("loading match directory from {}", directory_path.display()))?,
    );

    let catalog = Arc::new(CatalogStore::new(portal_repo, channel_repo));
    let epg_manager = Arc::new(EpgSourceManager::new(epg_repo.clone(), epg_sources_dir));
    let sessions = Arc::new(SessionTable::new());
    let active_sessions = Arc::new(ActiveSessions::new());
    let config = Arc::new(RwLock::new(config));

    spawn_catalog_refresh_loop(catalog.clone(), config.clone(), rules.clone(), directory.clone());
    spawn_epg_refresh_loop(epg_manager.clone(), config.clone());

    let state = AppState {
        config: config.clone(),
        config_path: Arc::new(config_path),
        catalog,
        epg_manager,
        epg_repo,
        sessions,
        active_sessions,
        rules,
        directory,
    };

    let server = match WebServer::new(state).await {
        Ok(server) => server,
        Err(err) => {
            error!(%err, "failed to bind HTTP listener");
            std::process::exit(1);
        }
    };
    info!(addr = %server.addr(), "listening");
    server.serve().await?;

    Ok(())
}

/// Layers an ANSI console writer (human-facing) over a daily-rolling file
/// writer in the exact `"YYYY-MM-DD HH:MM:SS,mmm [LEVEL] msg"` shape (§6),
/// mirroring the split console/file layering `prefetcharr`'s
/// `enable_logging` uses. Returns the non-blocking writer's guard, which
/// must be held for the life of the process.
fn init_logging(log_dir: &str, log_level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    std::fs::create_dir_all(log_dir).expect("creating log directory");
    let file_appender = tracing_appender::rolling::daily(log_dir, "app.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_filter(env_filter());

    let file_layer = tracing_subscriber::fmt::layer()
        .event_format(AppLogFormat)
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
