//! Catalog Store orchestration (§4.B).
//!
//! [`CatalogStore`] wraps the channel/portal repositories and drives the
//! incremental refresh protocol end to end: reference-MAC selection, raw
//! channel upsert with content-addressed hashing, per-MAC availability
//! fan-out, conditional re-normalization/re-matching, soft-delete with TTL,
//! and group-stat recomputation. Refreshes are serialized per portal by a
//! `tokio::sync::Mutex` keyed by `portal_id`, the same per-key-mutex shape
//! [`crate::epg::EpgSourceManager`] uses for EPG sources.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::defaults::DEFAULT_SOFT_DELETE_TTL_HOURS;
use crate::config::{PortalEntry, SchedulerWeights};
use crate::database::repositories::{ChannelRepository, PortalRepository};
use crate::database::repositories::channel::HashOutcome;
use crate::errors::{AppResult, CatalogError};
use crate::match_resolver::directory::MatchDirectory;
use crate::normalize::{self, RuleSet};
use crate::portal::client::PortalClient;
use crate::scheduler::{self, MacCandidate};

/// Outcome of one `refresh_portal` call, surfaced to `/api/portal/refresh*`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshStats {
    pub channels_seen: usize,
    pub channels_new: usize,
    pub channels_changed: usize,
    pub channels_unchanged: usize,
    pub channels_disabled: usize,
    pub channels_hard_deleted: u64,
    pub macs_failed: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshPhase {
    Queued,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub phase: RefreshPhase,
    pub stats: Option<RefreshStats>,
    pub error: Option<String>,
}

pub struct CatalogStore {
    portal_repo: PortalRepository,
    channel_repo: ChannelRepository,
    refresh_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    refresh_state: Mutex<HashMap<String, RefreshRecord>>,
}

impl CatalogStore {
    pub fn new(portal_repo: PortalRepository, channel_repo: ChannelRepository) -> Self {
        Self {
            portal_repo,
            channel_repo,
            refresh_locks: Mutex::new(HashMap::new()),
            refresh_state: Mutex::new(HashMap::new()),
        }
    }

    pub fn portals(&self) -> &PortalRepository {
        &self.portal_repo
    }

    pub fn channels(&self) -> &ChannelRepository {
        &self.channel_repo
    }

    async fn lock_for(&self, portal_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks
            .entry(portal_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn set_state(&self, portal_id: &str, record: RefreshRecord) {
        self.refresh_state
            .lock()
            .await
            .insert(portal_id.to_string(), record);
    }

    /// `{status: queued|running|completed, stats?, error?}` for
    /// `/api/portal/refresh/status`.
    pub async fn refresh_status(&self, portal_id: &str) -> Option<RefreshRecord> {
        self.refresh_state.lock().await.get(portal_id).cloned()
    }

    /// Drives the full incremental refresh protocol (§4.B steps 1-7) for one
    /// portal. Concurrent callers serialize on the portal's mutex; a caller
    /// that finds it already held records `Queued` before waiting its turn,
    /// rather than failing outright.
    pub async fn refresh_portal(
        &self,
        portal_id: &str,
        entry: &PortalEntry,
        rules: &RuleSet,
        directory: &MatchDirectory,
        match_floor: f64,
    ) -> AppResult<RefreshStats> {
        let lock = self.lock_for(portal_id).await;
        let guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                self.set_state(
                    portal_id,
                    RefreshRecord {
                        phase: RefreshPhase::Queued,
                        stats: None,
                        error: None,
                    },
                )
                .await;
                lock.lock().await
            }
        };

        self.set_state(
            portal_id,
            RefreshRecord {
                phase: RefreshPhase::Running,
                stats: None,
                error: None,
            },
        )
        .await;

        let result = self
            .refresh_portal_locked(portal_id, entry, rules, directory, match_floor)
            .await;

        match &result {
            Ok(stats) => {
                self.set_state(
                    portal_id,
                    RefreshRecord {
                        phase: RefreshPhase::Completed,
                        stats: Some(stats.clone()),
                        error: None,
                    },
                )
                .await;
            }
            Err(err) => {
                self.set_state(
                    portal_id,
                    RefreshRecord {
                        phase: RefreshPhase::Failed,
                        stats: None,
                        error: Some(err.to_string()),
                    },
                )
                .await;
            }
        }

        drop(guard);
        result
    }

    async fn refresh_portal_locked(
        &self,
        portal_id: &str,
        entry: &PortalEntry,
        rules: &RuleSet,
        directory: &MatchDirectory,
        match_floor: f64,
    ) -> AppResult<RefreshStats> {
        let today = Utc::now().date_naive();
        let macs = self.portal_repo.list_non_expired_macs(portal_id, today).await?;
        if macs.is_empty() {
            return Err(CatalogError::PortalNotFound(portal_id.to_string()).into());
        }

        // Step 1: pick a reference MAC via the same scoring the Scheduler
        // uses for playback, but over every non-expired MAC regardless of
        // live session state.
        let candidates: Vec<MacCandidate> = macs
            .iter()
            .map(|m| MacCandidate::from_model(m, 0))
            .collect();
        let ordered = scheduler::select(candidates, &SchedulerWeights::default(), today);
        let reference_mac = ordered
            .first()
            .ok_or_else(|| CatalogError::PortalNotFound(portal_id.to_string()))?
            .mac_address
            .clone();

        let reference_client = PortalClient::new(&entry.url, &reference_mac, entry.proxy.as_deref())
            .map_err(crate::errors::AppError::Portal)?;

        // Step 2: fetch groups and raw channels through the reference MAC.
        let genres = reference_client
            .get_genres()
            .await
            .map_err(crate::errors::AppError::Portal)?;
        let raw_channels = reference_client
            .get_all_channels()
            .await
            .map_err(crate::errors::AppError::Portal)?;

        for genre in &genres {
            self.portal_repo
                .upsert_group(portal_id, &genre.genre_id, &genre.name, 0)
                .await?;
        }

        let mut stats = RefreshStats {
            channels_seen: raw_channels.len(),
            ..Default::default()
        };
        let mut seen_channel_ids: HashSet<String> = HashSet::new();

        // Steps 3 & 5: upsert raw fields, re-run C/D only on hash change.
        for raw in &raw_channels {
            seen_channel_ids.insert(raw.channel_id.clone());
            let (_model, outcome) = self.channel_repo.upsert_raw(portal_id, raw).await?;
            // Reappearance can happen independent of whether the raw fields
            // changed, so this runs for every hash outcome (§8 item 3).
            self.channel_repo.reenable(portal_id, &raw.channel_id).await?;

            match outcome {
                HashOutcome::New => stats.channels_new += 1,
                HashOutcome::Changed => stats.channels_changed += 1,
                HashOutcome::Unchanged => {
                    stats.channels_unchanged += 1;
                    continue;
                }
            }

            if entry.auto_normalize_names {
                let normalized = normalize::normalize(&raw.name, rules);
                self.channel_repo
                    .apply_normalization(portal_id, &raw.channel_id, &normalized)
                    .await?;

                if entry.auto_match {
                    if let Some(matched) = crate::match_resolver::resolve(
                        &normalized.display_name,
                        normalized.tags.country.as_deref(),
                        directory,
                        match_floor,
                    ) {
                        self.channel_repo
                            .apply_match(portal_id, &raw.channel_id, &matched)
                            .await?;
                    }
                }
            }
        }

        // Step 4: per-MAC availability fan-out. A MAC whose whole listing
        // fails with PortalUnreachable is skipped and logged; it never
        // clears availability it already holds.
        for mac in &macs {
            let client = match PortalClient::new(&entry.url, &mac.mac_address, entry.proxy.as_deref()) {
                Ok(client) => client,
                Err(err) => {
                    warn!(portal_id, mac = %mac.mac_address, %err, "skipping mac for availability fan-out");
                    stats.macs_failed.push(mac.mac_address.clone());
                    continue;
                }
            };

            let listing = match client.get_all_channels().await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(portal_id, mac = %mac.mac_address, %err, "whole-listing failure, skipping mac");
                    stats.macs_failed.push(mac.mac_address.clone());
                    continue;
                }
            };

            let mut present: HashMap<String, bool> = HashMap::new();
            for raw in &listing {
                seen_channel_ids.insert(raw.channel_id.clone());
                let has_cmd = raw.cmd.as_deref().map(|cmd| !cmd.trim().is_empty()).unwrap_or(false);
                present.insert(raw.channel_id.clone(), has_cmd);
            }

            for channel_id in &seen_channel_ids {
                let is_present = present.get(channel_id).copied().unwrap_or(false);
                self.channel_repo
                    .set_mac_availability(portal_id, channel_id, &mac.mac_address, is_present)
                    .await?;
            }
        }

        // Steps 6 & 7 commit atomically in one transaction (§5): soft-delete
        // channels absent from every non-failing MAC, hard-delete rows past
        // the configured TTL, then recompute group_stats from the
        // post-delete row set — a crash partway through must never leave
        // the catalog in a state where only some of these landed.
        let txn = self.channel_repo.begin().await?;

        let disabled = self
            .channel_repo
            .soft_delete_missing_in_txn(&txn, portal_id, &seen_channel_ids)
            .await?;
        stats.channels_disabled = disabled.len();
        stats.channels_hard_deleted = self
            .channel_repo
            .hard_delete_expired_in_txn(
                &txn,
                portal_id,
                chrono::Duration::hours(DEFAULT_SOFT_DELETE_TTL_HOURS),
            )
            .await?;

        let all_channels = self.channel_repo.list_for_portal_in_txn(&txn, portal_id).await?;
        let mut counts: HashMap<String, i32> = HashMap::new();
        for channel in &all_channels {
            if channel.enabled {
                if let Some(genre_id) = &channel.genre_id {
                    *counts.entry(genre_id.clone()).or_insert(0) += 1;
                }
            }
        }
        for genre in &genres {
            let count = counts.get(&genre.genre_id).copied().unwrap_or(0);
            self.portal_repo
                .upsert_group_in_txn(&txn, portal_id, &genre.genre_id, &genre.name, count)
                .await?;
        }

        txn.commit().await?;

        info!(
            portal_id,
            channels_seen = stats.channels_seen,
            channels_new = stats.channels_new,
            channels_changed = stats.channels_changed,
            channels_disabled = stats.channels_disabled,
            macs_failed = stats.macs_failed.len(),
            "portal refresh completed"
        );

        Ok(stats)
    }

    /// Best-effort opportunistic MAC profile refresh (§3 MAC lifecycle),
    /// driven explicitly by `/api/portal/macs/refresh` rather than as part
    /// of the catalog refresh cycle.
    pub async fn refresh_mac_profiles(&self, portal_id: &str, entry: &PortalEntry) -> AppResult<usize> {
        let macs = self.portal_repo.list_macs(portal_id).await?;
        let mut updated = 0usize;
        for mac in &macs {
            let mut client = match PortalClient::new(&entry.url, &mac.mac_address, entry.proxy.as_deref()) {
                Ok(client) => client,
                Err(_) => continue,
            };
            if client.get_token().await.is_err() {
                continue;
            }
            let profile = client.get_profile().await.unwrap_or_default();
            let expiry: Option<NaiveDate> = client.get_expiry().await.unwrap_or(None);
            self.portal_repo
                .update_mac_profile(
                    portal_id,
                    &mac.mac_address,
                    profile.watchdog_timeout_seconds,
                    profile.playback_limit,
                    expiry,
                )
                .await?;
            updated += 1;
        }
        Ok(updated)
    }
}
