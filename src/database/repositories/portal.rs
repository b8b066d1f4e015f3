//! Repository for `portals`, `macs` and `groups` (§4.B contract:
//! `upsert_portal`, `delete_portal` cascading to MACs/channels/groups).

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, QueryFilter, Set,
};

use crate::config::PortalEntry;
use crate::entities::{group, mac, portal};
use crate::errors::{AppResult, CatalogError};

#[derive(Clone)]
pub struct PortalRepository {
    db: Arc<DatabaseConnection>,
}

impl PortalRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create or update a portal row and reconcile its MAC rows against the
    /// config-supplied set. MACs absent from `entry.macs` are removed
    /// (they're exclusively owned by their portal, per the data model).
    pub async fn upsert_portal(&self, portal_id: &str, entry: &PortalEntry) -> AppResult<()> {
        let now = Utc::now();
        let existing = portal::Entity::find_by_id(portal_id.to_string())
            .one(self.db.as_ref())
            .await?;

        let model = portal::ActiveModel {
            portal_id: Set(portal_id.to_string()),
            name: Set(entry.name.clone()),
            url: Set(entry.url.clone()),
            proxy: Set(entry.proxy.clone()),
            streams_per_mac: Set(entry.streams_per_mac as i32),
            epg_offset: Set(entry.epg_offset),
            enabled: Set(entry.enabled),
            auto_normalize_names: Set(entry.auto_normalize_names),
            auto_match: Set(entry.auto_match),
            fetch_epg: Set(entry.fetch_epg),
            created_at: Set(existing.as_ref().map(|m| m.created_at).unwrap_or(now)),
            updated_at: Set(now),
        };

        if existing.is_some() {
            model.update(self.db.as_ref()).await?;
        } else {
            model.insert(self.db.as_ref()).await?;
        }

        self.reconcile_macs(portal_id, entry).await?;
        Ok(())
    }

    async fn reconcile_macs(&self, portal_id: &str, entry: &PortalEntry) -> AppResult<()> {
        let existing = mac::Entity::find()
            .filter(mac::Column::PortalId.eq(portal_id.to_string()))
            .all(self.db.as_ref())
            .await?;

        for row in &existing {
            if !entry.macs.contains_key(&row.mac_address) {
                mac::Entity::delete_by_id((portal_id.to_string(), row.mac_address.clone()))
                    .exec(self.db.as_ref())
                    .await?;
            }
        }

        for (mac_address, mac_entry) in &entry.macs {
            let found = existing.iter().find(|m| &m.mac_address == mac_address);
            let active = mac::ActiveModel {
                portal_id: Set(portal_id.to_string()),
                mac_address: Set(mac_address.clone()),
                expires_at: Set(mac_entry.expiry),
                watchdog_timeout_seconds: Set(mac_entry.watchdog_timeout),
                playback_limit: Set(mac_entry.playback_limit),
                last_profile_fetch_at: Set(found.and_then(|m| m.last_profile_fetch_at)),
            };
            if found.is_some() {
                active.update(self.db.as_ref()).await?;
            } else {
                active.insert(self.db.as_ref()).await?;
            }
        }
        Ok(())
    }

    /// Cascades to MACs, channels and groups via the foreign-key `ON DELETE
    /// CASCADE` declared in the migration.
    pub async fn delete_portal(&self, portal_id: &str) -> AppResult<()> {
        let res = portal::Entity::delete_by_id(portal_id.to_string())
            .exec(self.db.as_ref())
            .await?;
        if res.rows_affected == 0 {
            return Err(CatalogError::PortalNotFound(portal_id.to_string()).into());
        }
        Ok(())
    }

    pub async fn get_portal(&self, portal_id: &str) -> AppResult<Option<portal::Model>> {
        Ok(portal::Entity::find_by_id(portal_id.to_string())
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn list_enabled_portals(&self) -> AppResult<Vec<portal::Model>> {
        Ok(portal::Entity::find()
            .filter(portal::Column::Enabled.eq(true))
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_macs(&self, portal_id: &str) -> AppResult<Vec<mac::Model>> {
        Ok(mac::Entity::find()
            .filter(mac::Column::PortalId.eq(portal_id.to_string()))
            .all(self.db.as_ref())
            .await?)
    }

    /// Non-expired MACs for the portal, as of `today`.
    pub async fn list_non_expired_macs(
        &self,
        portal_id: &str,
        today: NaiveDate,
    ) -> AppResult<Vec<mac::Model>> {
        let all = self.list_macs(portal_id).await?;
        Ok(all
            .into_iter()
            .filter(|m| match m.expires_at {
                Some(expiry) => expiry >= today,
                None => true,
            })
            .collect())
    }

    pub async fn delete_mac(&self, portal_id: &str, mac_address: &str) -> AppResult<()> {
        mac::Entity::delete_by_id((portal_id.to_string(), mac_address.to_string()))
            .exec(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Opportunistic profile update from `get_profile`/`get_expiry` (§3 MAC
    /// lifecycle). Only touches the fields the portal actually reported.
    pub async fn update_mac_profile(
        &self,
        portal_id: &str,
        mac_address: &str,
        watchdog_timeout_seconds: Option<i64>,
        playback_limit: Option<i64>,
        expires_at: Option<NaiveDate>,
    ) -> AppResult<()> {
        let Some(existing) = mac::Entity::find_by_id((portal_id.to_string(), mac_address.to_string()))
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(());
        };
        let mut active: mac::ActiveModel = existing.into();
        if let Some(wd) = watchdog_timeout_seconds {
            active.watchdog_timeout_seconds = Set(wd);
        }
        if let Some(limit) = playback_limit {
            active.playback_limit = Set(limit);
        }
        if let Some(expiry) = expires_at {
            active.expires_at = Set(Some(expiry));
        }
        active.last_profile_fetch_at = Set(Some(Utc::now()));
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    /// Upserts a group row, enforcing invariant (ii): every genre_id
    /// referenced by a channel has a matching `groups` row for the portal.
    pub async fn upsert_group(
        &self,
        portal_id: &str,
        genre_id: &str,
        name: &str,
        channel_count: i32,
    ) -> AppResult<()> {
        self.upsert_group_on(self.db.as_ref(), portal_id, genre_id, name, channel_count).await
    }

    /// As [`Self::upsert_group`], scoped to an open transaction; used by
    /// [`crate::catalog::CatalogStore`] to commit §4.B step 7's group-stat
    /// recompute atomically with step 6's soft/hard delete.
    pub async fn upsert_group_in_txn(
        &self,
        txn: &DatabaseTransaction,
        portal_id: &str,
        genre_id: &str,
        name: &str,
        channel_count: i32,
    ) -> AppResult<()> {
        self.upsert_group_on(txn, portal_id, genre_id, name, channel_count).await
    }

    async fn upsert_group_on<C: ConnectionTrait>(
        &self,
        conn: &C,
        portal_id: &str,
        genre_id: &str,
        name: &str,
        channel_count: i32,
    ) -> AppResult<()> {
        let existing = group::Entity::find_by_id((portal_id.to_string(), genre_id.to_string()))
            .one(conn)
            .await?;
        let active = group::ActiveModel {
            portal_id: Set(portal_id.to_string()),
            genre_id: Set(genre_id.to_string()),
            name: Set(name.to_string()),
            channel_count: Set(channel_count),
            active: Set(existing.as_ref().map(|g| g.active).unwrap_or(true)),
        };
        if existing.is_some() {
            active.update(conn).await?;
        } else {
            active.insert(conn).await?;
        }
        Ok(())
    }

    /// Toggle `groups.active`. Invariant (v): never deletes channels.
    pub async fn set_groups_active(
        &self,
        portal_id: &str,
        genre_ids: &[String],
        active: bool,
    ) -> AppResult<()> {
        let rows = group::Entity::find()
            .filter(group::Column::PortalId.eq(portal_id.to_string()))
            .filter(group::Column::GenreId.is_in(genre_ids.to_vec()))
            .all(self.db.as_ref())
            .await?;
        for row in rows {
            let mut m: group::ActiveModel = row.into();
            m.active = Set(active);
            m.update(self.db.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn list_groups(&self, portal_id: &str) -> AppResult<Vec<group::Model>> {
        Ok(group::Entity::find()
            .filter(group::Column::PortalId.eq(portal_id.to_string()))
            .all(self.db.as_ref())
            .await?)
    }
}
