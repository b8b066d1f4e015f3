//! Repository for `epg_sources` and `epg_channels`.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};

use crate::entities::{epg_channel, epg_source};
use crate::errors::AppResult;

#[derive(Clone)]
pub struct EpgSourceRepository {
    db: Arc<DatabaseConnection>,
}

impl EpgSourceRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn list_enabled(&self) -> AppResult<Vec<epg_source::Model>> {
        Ok(epg_source::Entity::find()
            .filter(epg_source::Column::Enabled.eq(true))
            .all(self.db.as_ref())
            .await?)
    }

    pub async fn list_all(&self) -> AppResult<Vec<epg_source::Model>> {
        Ok(epg_source::Entity::find().all(self.db.as_ref()).await?)
    }

    pub async fn get(&self, source_id: &str) -> AppResult<Option<epg_source::Model>> {
        Ok(epg_source::Entity::find_by_id(source_id.to_string())
            .one(self.db.as_ref())
            .await?)
    }

    pub async fn upsert(
        &self,
        source_id: &str,
        name: &str,
        url: &str,
        source_type: epg_source::EpgSourceType,
        interval_hours: i32,
        enabled: bool,
    ) -> AppResult<()> {
        let existing = self.get(source_id).await?;
        let active = epg_source::ActiveModel {
            source_id: Set(source_id.to_string()),
            name: Set(name.to_string()),
            url: Set(url.to_string()),
            source_type: Set(source_type),
            enabled: Set(enabled),
            interval_hours: Set(interval_hours),
            last_fetch: Set(existing.as_ref().and_then(|m| m.last_fetch)),
            last_refresh: Set(existing.as_ref().and_then(|m| m.last_refresh)),
        };
        if existing.is_some() {
            active.update(self.db.as_ref()).await?;
        } else {
            active.insert(self.db.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn mark_fetched(&self, source_id: &str, committed_anything: bool) -> AppResult<()> {
        let Some(existing) = self.get(source_id).await? else {
            return Ok(());
        };
        let mut active: epg_source::ActiveModel = existing.into();
        let now = Utc::now();
        active.last_fetch = Set(Some(now));
        if committed_anything {
            active.last_refresh = Set(Some(now));
        }
        active.update(self.db.as_ref()).await?;
        Ok(())
    }

    pub async fn upsert_channel(
        &self,
        source_id: &str,
        channel_id: &str,
        display_name: Option<&str>,
        icon: Option<&str>,
        lcn: Option<&str>,
        aliases: &[String],
    ) -> AppResult<()> {
        let existing = epg_channel::Entity::find_by_id((source_id.to_string(), channel_id.to_string()))
            .one(self.db.as_ref())
            .await?;
        let active = epg_channel::ActiveModel {
            source_id: Set(source_id.to_string()),
            channel_id: Set(channel_id.to_string()),
            display_name: Set(display_name.map(str::to_string)),
            icon: Set(icon.map(str::to_string)),
            lcn: Set(lcn.map(str::to_string)),
            display_name_aliases: Set(serde_json::to_string(aliases).unwrap_or_else(|_| "[]".into())),
        };
        if existing.is_some() {
            active.update(self.db.as_ref()).await?;
        } else {
            active.insert(self.db.as_ref()).await?;
        }
        Ok(())
    }

    pub async fn find_by_channel_id(&self, channel_id: &str) -> AppResult<Option<epg_channel::Model>> {
        Ok(epg_channel::Entity::find()
            .filter(epg_channel::Column::ChannelId.eq(channel_id.to_string()))
            .one(self.db.as_ref())
            .await?)
    }

    /// Resolution order step (ii): case-folded alias match across all
    /// sources' `epg_channels`.
    pub async fn find_by_alias(&self, candidate: &str) -> AppResult<Option<epg_channel::Model>> {
        let all = epg_channel::Entity::find().all(self.db.as_ref()).await?;
        Ok(all.into_iter().find(|row| row.matches_alias(candidate)))
    }
}
