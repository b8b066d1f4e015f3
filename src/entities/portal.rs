//! `portals` table — one row per configured Stalker/MAC portal.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "portals")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub portal_id: String,
    pub name: String,
    pub url: String,
    pub proxy: Option<String>,
    pub streams_per_mac: i32,
    pub epg_offset: i32,
    pub enabled: bool,
    pub auto_normalize_names: bool,
    pub auto_match: bool,
    pub fetch_epg: bool,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::mac::Entity")]
    Macs,
    #[sea_orm(has_many = "super::group::Entity")]
    Groups,
    #[sea_orm(has_many = "super::channel::Entity")]
    Channels,
}

impl Related<super::mac::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Macs.def()
    }
}

impl Related<super::group::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Groups.def()
    }
}

impl Related<super::channel::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Channels.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
