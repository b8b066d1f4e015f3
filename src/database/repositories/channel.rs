//! Repository for `channels` — the incremental-refresh-aware store (§4.B).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};

use crate::entities::channel::{self, Model as ChannelModel};
use crate::errors::AppResult;
use crate::portal::protocol::RawChannel;

#[derive(Clone)]
pub struct ChannelRepository {
    db: Arc<DatabaseConnection>,
}

/// Whether an upsert changed the stored `channel_hash`, i.e. whether the
/// raw fields differ from the prior refresh (§4.B step 3, §8 item 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashOutcome {
    Unchanged,
    Changed,
    New,
}

impl ChannelRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// The shared connection, for ambient needs (e.g. a `/health` liveness
    /// probe) that don't belong on any specific repository method.
    pub fn connection(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Starts a transaction on the shared connection. Used by
    /// [`crate::catalog::CatalogStore`] to wrap §4.B steps 6/7 (soft/hard
    /// delete plus group-stat recompute) atomically, the same `begin`/
    /// `commit` shape [`crate::epg::store::ProgrammeStore::insert_batched`]
    /// uses for its own batched writes.
    pub async fn begin(&self) -> AppResult<DatabaseTransaction> {
        Ok(self.db.begin().await?)
    }

    pub async fn get(&self, portal_id: &str, channel_id: &str) -> AppResult<Option<ChannelModel>> {
        Ok(channel::Entity::find_by_id((portal_id.to_string(), channel_id.to_string()))
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn list_for_portal(&self, portal_id: &str) -> AppResult<Vec<ChannelModel>> {
        Ok(channel::Entity::find()
            .filter(channel::Column::PortalId.eq(portal_id.to_string()))
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_enabled(&self) -> AppResult<Vec<ChannelModel>> {
        Ok(channel::Entity::find()
            .filter(channel::Column::Enabled.eq(true))
            .all(self.db.as_ref())
            .await?)
    }

    /// Upsert the raw fields of a channel, computing the content-addressed
    /// `channel_hash` and reporting whether it changed so callers can skip
    /// re-running tag extraction / matching when it didn't (§8 item 2).
    pub async fn upsert_raw(
        &self,
        portal_id: &str,
        raw: &RawChannel,
    ) -> AppResult<(ChannelModel, HashOutcome)> {
        let hash = compute_channel_hash(raw);
        let existing = self.get(portal_id, &raw.channel_id).await?;
        let now = Utc::now();

        if let Some(existing) = existing {
            if existing.channel_hash == hash {
                return Ok((existing, HashOutcome::Unchanged));
            }
            let mut active: channel::ActiveModel = existing.into();
            active.name = Set(raw.name.clone());
            active.number = Set(raw.number.clone());
            active.genre = Set(raw.genre.clone());
            active.genre_id = Set(raw.genre_id.clone());
            active.logo = Set(raw.logo.clone());
            active.cmd = Set(raw.cmd.clone());
            active.channel_hash = Set(hash);
            active.updated_at = Set(now);
            let model = active.update(self.db.as_ref()).await?;
            Ok((model, HashOutcome::Changed))
        } else {
            let active = channel::ActiveModel {
                portal_id: Set(portal_id.to_string()),
                channel_id: Set(raw.channel_id.clone()),
                name: Set(raw.name.clone()),
                number: Set(raw.number.clone()),
                genre: Set(raw.genre.clone()),
                genre_id: Set(raw.genre_id.clone()),
                logo: Set(raw.logo.clone()),
                cmd: Set(raw.cmd.clone()),
                auto_name: Set(None),
                display_name: Set(None),
                tag_resolution: Set(None),
                tag_video_codec: Set(None),
                tag_country: Set(None),
                tag_event_tags: Set(None),
                tag_misc_tags: Set(None),
                is_header: Set(false),
                is_event: Set(false),
                is_raw: Set(false),
                custom_name: Set(None),
                custom_number: Set(None),
                custom_genre: Set(None),
                custom_epg_id: Set(None),
                enabled: Set(true),
                matched_name: Set(None),
                matched_source: Set(None),
                matched_station_id: Set(None),
                matched_call_sign: Set(None),
                matched_logo: Set(None),
                matched_score: Set(None),
                available_macs: Set("[]".to_string()),
                alternate_ids: Set("[]".to_string()),
                channel_hash: Set(hash),
                created_at: Set(now),
                updated_at: Set(now),
            };
            let model = active.insert(self.db.as_ref()).await?;
            Ok((model, HashOutcome::New))
        }
    }

    /// Persist the normalizer output (component C) for a channel.
    pub async fn apply_normalization(
        &self,
        portal_id: &str,
        channel_id: &str,
        normalized: &crate::normalize::NormalizedName,
    ) -> AppResult<()> {
        let Some(existing) = self.get(portal_id, channel_id).await? else {
            return Ok(());
        };
        let mut active: channel::ActiveModel = existing.into();
        active.auto_name = Set(Some(normalized.display_name.clone()));
        active.tag_resolution = Set(normalized.tags.resolution.clone());
        active.tag_video_codec = Set(normalized.tags.video_codec.clone());
        active.tag_country = Set(normalized.tags.country.clone());
        active.tag_event_tags = Set(non_empty_joined(&normalized.tags.event_tags));
        active.tag_misc_tags = Set(non_empty_joined(&normalized.tags.misc_tags));
        active.is_header = Set(normalized.is_header);
        active.is_event = Set(normalized.is_event);
        active.is_raw = Set(normalized.is_raw);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Persist the match/EPG-id resolver output (component D).
    pub async fn apply_match(
        &self,
        portal_id: &str,
        channel_id: &str,
        matched: &crate::match_resolver::MatchResult,
    ) -> AppResult<()> {
        let Some(existing) = self.get(portal_id, channel_id).await? else {
            return Ok(());
        };
        let mut active: channel::ActiveModel = existing.into();
        active.matched_name = Set(Some(matched.name.clone()));
        active.matched_source = Set(Some(matched.source.clone()));
        active.matched_station_id = Set(Some(matched.station_id.clone()));
        active.matched_call_sign = Set(matched.call_sign.clone());
        active.matched_logo = Set(matched.logo.clone());
        active.matched_score = Set(Some(matched.score));
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Union a MAC's per-channel availability into `available_macs` (§4.B
    /// step 4). `present` is whether this specific MAC returned a non-empty
    /// `cmd` for the channel in its listing.
    pub async fn set_mac_availability(
        &self,
        portal_id: &str,
        channel_id: &str,
        mac_address: &str,
        present: bool,
    ) -> AppResult<()> {
        let Some(existing) = self.get(portal_id, channel_id).await? else {
            return Ok(());
        };
        let mut macs: HashSet<String> = existing.available_macs_vec().into_iter().collect();
        if present {
            macs.insert(mac_address.to_string());
        } else {
            macs.remove(mac_address);
        }
        let mut sorted: Vec<String> = macs.into_iter().collect();
        sorted.sort();
        let mut active: channel::ActiveModel = existing.into();
        active.available_macs = Set(serde_json::to_string(&sorted).unwrap_or_else(|_| "[]".into()));
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Soft-delete channels present in the store but absent from the fresh
    /// listing across all non-failing MACs (§4.B step 6). Returns the
    /// channel ids that were toggled to `enabled=0`.
    pub async fn soft_delete_missing(
        &self,
        portal_id: &str,
        seen_channel_ids: &HashSet<String>,
    ) -> AppResult<Vec<String>> {
        self.soft_delete_missing_on(self.db.as_ref(), portal_id, seen_channel_ids).await
    }

    /// As [`Self::soft_delete_missing`], but runs against an open
    /// transaction so the caller can commit it together with the hard-delete
    /// and group-stat recompute that follow (§5's single-transaction
    /// requirement around §4.B steps 6/7).
    pub async fn soft_delete_missing_in_txn(
        &self,
        txn: &DatabaseTransaction,
        portal_id: &str,
        seen_channel_ids: &HashSet<String>,
    ) -> AppResult<Vec<String>> {
        self.soft_delete_missing_on(txn, portal_id, seen_channel_ids).await
    }

    async fn soft_delete_missing_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        portal_id: &str,
        seen_channel_ids: &HashSet<String>,
    ) -> AppResult<Vec<String>> {
        let existing = channel::Entity::find()
            .filter(channel::Column::PortalId.eq(portal_id.to_string()))
            .all(conn)
            .await?;
        let mut disabled = Vec::new();
        for row in existing {
            if row.enabled && !seen_channel_ids.contains(&row.channel_id) {
                let channel_id = row.channel_id.clone();
                let mut active: channel::ActiveModel = row.into();
                active.enabled = Set(false);
                active.updated_at = Set(Utc::now());
                active.update(conn).await?;
                disabled.push(channel_id);
            }
        }
        Ok(disabled)
    }

    /// Re-enable channels that reappeared in a later refresh, restoring
    /// their prior `enabled` state (§8 item 3).
    pub async fn reenable(&self, portal_id: &str, channel_id: &str) -> AppResult<()> {
        let Some(existing) = self.get(portal_id, channel_id).await? else {
            return Ok(());
        };
        if existing.enabled {
            return Ok(());
        }
        let mut active: channel::ActiveModel = existing.into();
        active.enabled = Set(true);
        active.updated_at = Set(Utc::now());
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Hard-delete soft-deleted rows past the TTL.
    pub async fn hard_delete_expired(&self, portal_id: &str, ttl: chrono::Duration) -> AppResult<u64> {
        self.hard_delete_expired_on(self.db.as_ref(), portal_id, ttl).await
    }

    /// As [`Self::hard_delete_expired`], scoped to an open transaction; see
    /// [`Self::soft_delete_missing_in_txn`].
    pub async fn hard_delete_expired_in_txn(
        &self,
        txn: &DatabaseTransaction,
        portal_id: &str,
        ttl: chrono::Duration,
    ) -> AppResult<u64> {
        self.hard_delete_expired_on(txn, portal_id, ttl).await
    }

    async fn hard_delete_expired_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        portal_id: &str,
        ttl: chrono::Duration,
    ) -> AppResult<u64> {
        let cutoff = Utc::now() - ttl;
        let rows = channel::Entity::find()
            .filter(channel::Column::PortalId.eq(portal_id.to_string()))
            .filter(channel::Column::Enabled.eq(false))
            .filter(channel::Column::UpdatedAt.lt(cutoff))
            .all(conn)
            .await?;
        let count = rows.len() as u64;
        for row in rows {
            channel::Entity::delete_by_id((row.portal_id, row.channel_id))
                .exec(conn)
                .await?;
        }
        Ok(count)
    }

    /// As [`Self::list_for_portal`], scoped to an open transaction; used by
    /// the group-stat recompute in §4.B step 7 so it reads the rows as they
    /// stand after the same transaction's soft/hard delete.
    pub async fn list_for_portal_in_txn(
        &self,
        txn: &DatabaseTransaction,
        portal_id: &str,
    ) -> AppResult<Vec<ChannelModel>> {
        Ok(channel::Entity::find()
            .filter(channel::Column::PortalId.eq(portal_id.to_string()))
            .all(txn)
            .await?)
    }
}

fn non_empty_joined(tags: &[String]) -> Option<String> {
    if tags.is_empty() {
        None
    } else {
        Some(tags.join(","))
    }
}

/// Content-addressed fingerprint over the raw fields named in §4.B step 3.
pub fn compute_channel_hash(raw: &RawChannel) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(raw.name.as_bytes());
    hasher.update([0]);
    hasher.update(raw.number.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(raw.genre.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(raw.genre_id.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(raw.logo.as_deref().unwrap_or("").as_bytes());
    hasher.update([0]);
    hasher.update(raw.cmd.as_deref().unwrap_or("").as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(name: &str) -> RawChannel {
        RawChannel {
            channel_id: "c1".into(),
            name: name.into(),
            number: Some("101".into()),
            genre: Some("News".into()),
            genre_id: Some("5".into()),
            logo: None,
            cmd: Some("ffmpeg http://x".into()),
        }
    }

    #[test]
    fn hash_is_stable_for_identical_input() {
        assert_eq!(compute_channel_hash(&raw("CNN")), compute_channel_hash(&raw("CNN")));
    }

    #[test]
    fn hash_changes_when_name_changes() {
        assert_ne!(compute_channel_hash(&raw("CNN")), compute_channel_hash(&raw("CNN HD")));
    }
}
