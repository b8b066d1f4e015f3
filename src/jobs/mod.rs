//! Scheduler Core (§4.J): two long-running background loops, spawned once at
//! startup and left to run for the life of the process. Each tick re-reads
//! its interval from the live config rather than capturing it at spawn time,
//! so toggling `CHANNEL_REFRESH_INTERVAL`/`EPG_REFRESH_INTERVAL` (or an
//! `interval_hours` on one EPG source) takes effect on the next wake-up
//! without a restart — the same "re-check the schedule every wake" shape
//! the event-driven scheduler uses, simplified here to plain interval sleeps
//! since nothing in this system needs cron-style expressions.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::catalog::CatalogStore;
use crate::config::{Config, PortalEntry};
use crate::epg::EpgSourceManager;
use crate::match_resolver::directory::MatchDirectory;
use crate::normalize::RuleSet;

const FALLBACK_RECHECK_SECS: u64 = 3600;

/// Runs every enabled portal's refresh, then sleeps for
/// `settings.channel_refresh_interval_hours` (re-read each wake). `0` skips
/// the refresh entirely but keeps the loop alive, polling once an hour, so a
/// later config change re-enables it without a restart.
pub fn spawn_catalog_refresh_loop(
    catalog: Arc<CatalogStore>,
    config: Arc<RwLock<Config>>,
    rules: Arc<RuleSet>,
    directory: Arc<MatchDirectory>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (hours, match_floor, portals) = {
                let cfg = config.read().await;
                let portals: Vec<(String, PortalEntry)> = cfg
                    .portals
                    .iter()
                    .filter(|(_, entry)| entry.enabled)
                    .map(|(id, entry)| (id.clone(), entry.clone()))
                    .collect();
                (cfg.settings.channel_refresh_interval_hours, cfg.settings.match_score_floor, portals)
            };

            if hours == 0 {
                tokio::time::sleep(StdDuration::from_secs(FALLBACK_RECHECK_SECS)).await;
                continue;
            }

            for (portal_id, entry) in portals {
                let catalog = catalog.clone();
                let rules = rules.clone();
                let directory = directory.clone();
                tokio::spawn(async move {
                    match catalog
                        .refresh_portal(&portal_id, &entry, &rules, &directory, match_floor)
                        .await
                    {
                        Ok(stats) => info!(
                            portal_id,
                            channels_seen = stats.channels_seen,
                            channels_new = stats.channels_new,
                            channels_changed = stats.channels_changed,
                            "scheduled catalog refresh completed"
                        ),
                        Err(err) => warn!(portal_id, %err, "scheduled catalog refresh failed"),
                    }
                });
            }

            tokio::time::sleep(StdDuration::from_secs(hours as u64 * 3600)).await;
        }
    })
}

/// Checks every enabled EPG source each wake and refreshes the ones whose
/// own `interval_hours` has elapsed since `last_fetch` — the loop's own
/// cadence (`settings.epg_refresh_interval_hours`) only governs how often
/// that check happens, not which sources are due.
pub fn spawn_epg_refresh_loop(manager: Arc<EpgSourceManager>, config: Arc<RwLock<Config>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let hours = config.read().await.settings.epg_refresh_interval_hours;

            if hours != 0 {
                match manager.repository().list_enabled().await {
                    Ok(sources) => {
                        let now = Utc::now();
                        for source in sources {
                            let due = match source.last_fetch {
                                Some(last_fetch) if source.interval_hours > 0 => {
                                    now - last_fetch >= ChronoDuration::hours(source.interval_hours as i64)
                                }
                                _ => true,
                            };
                            if !due {
                                continue;
                            }
                            let manager = manager.clone();
                            let source_id = source.source_id.clone();
                            tokio::spawn(async move {
                                if let Err(err) = manager.refresh(&source_id, false).await {
                                    warn!(source_id, %err, "scheduled epg refresh failed");
                                }
                            });
                        }
                    }
                    Err(err) => warn!(%err, "failed to list epg sources for scheduled refresh"),
                }
            }

            let sleep_secs = if hours == 0 { FALLBACK_RECHECK_SECS } else { hours as u64 * 3600 };
            tokio::time::sleep(StdDuration::from_secs(sleep_secs)).await;
        }
    })
}
