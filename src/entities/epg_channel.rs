//! `epg_channels` table — `(source_id, channel_id)` with display-name
//! aliases (multiple `<display-name>` elements per XMLTV `<channel>`), stored
//! as a JSON-encoded string array for the same reason `channels.available_macs`
//! is JSON-encoded.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "epg_channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub source_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: String,
    pub display_name: Option<String>,
    pub icon: Option<String>,
    pub lcn: Option<String>,
    /// JSON-encoded `Vec<String>` of all `<display-name>` aliases, case-fold
    /// matched during XMLTV emission's resolution order step (ii).
    pub display_name_aliases: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::epg_source::Entity",
        from = "Column::SourceId",
        to = "super::epg_source::Column::SourceId",
        on_delete = "Cascade"
    )]
    EpgSource,
}

impl Related<super::epg_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::EpgSource.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn aliases_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.display_name_aliases).unwrap_or_default()
    }

    /// Resolution step (ii): case-folded alias match.
    pub fn matches_alias(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.aliases_vec()
            .iter()
            .any(|alias| alias.to_lowercase() == candidate)
    }
}
