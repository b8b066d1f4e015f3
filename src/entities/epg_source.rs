//! `epg_sources` table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
pub enum EpgSourceType {
    #[sea_orm(string_value = "portal")]
    Portal,
    #[sea_orm(string_value = "custom")]
    Custom,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "epg_sources")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_id: String,
    pub name: String,
    pub url: String,
    pub source_type: EpgSourceType,
    pub enabled: bool,
    pub interval_hours: i32,
    pub last_fetch: Option<ChronoDateTimeUtc>,
    pub last_refresh: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::epg_channel::Entity")]
    EpgChannels,
}

impl Related<super::epg_channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EpgChannels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
