//! `channels` table — identity `(portal_id, channel_id)`.
//!
//! `available_macs` and `alternate_ids` are stored as JSON-encoded string
//! arrays (`Vec<String>` via `serde_json`); SQLite has no native array type
//! and the teacher's repositories use the same JSON-text-column convention
//! for similarly shaped multi-valued fields (see `data_mapping` rule storage).

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "channels")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub portal_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub channel_id: String,

    // Raw fields from the portal.
    pub name: String,
    pub number: Option<String>,
    pub genre: Option<String>,
    pub genre_id: Option<String>,
    pub logo: Option<String>,
    pub cmd: Option<String>,

    // Derived fields (Tag & Name Normalizer output).
    pub auto_name: Option<String>,
    pub display_name: Option<String>,
    pub tag_resolution: Option<String>,
    pub tag_video_codec: Option<String>,
    pub tag_country: Option<String>,
    pub tag_event_tags: Option<String>,
    pub tag_misc_tags: Option<String>,
    pub is_header: bool,
    pub is_event: bool,
    pub is_raw: bool,

    // User overrides.
    pub custom_name: Option<String>,
    pub custom_number: Option<String>,
    pub custom_genre: Option<String>,
    pub custom_epg_id: Option<String>,
    pub enabled: bool,

    // Match/EPG-ID resolution.
    pub matched_name: Option<String>,
    pub matched_source: Option<String>,
    pub matched_station_id: Option<String>,
    pub matched_call_sign: Option<String>,
    pub matched_logo: Option<String>,
    pub matched_score: Option<f64>,

    /// JSON-encoded `Vec<String>` of MAC addresses.
    pub available_macs: String,
    /// JSON-encoded `Vec<String>` of merged-away channel ids.
    pub alternate_ids: String,

    /// Content-addressed fingerprint over the raw fields (§4.B step 3).
    pub channel_hash: String,

    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::portal::Entity",
        from = "Column::PortalId",
        to = "super::portal::Column::PortalId",
        on_delete = "Cascade"
    )]
    Portal,
}

impl Related<super::portal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Portal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Invariant (i): `effective_display_name = custom_name ?: auto_name ?: name`.
    pub fn effective_display_name(&self) -> &str {
        self.custom_name
            .as_deref()
            .or(self.auto_name.as_deref())
            .unwrap_or(&self.name)
    }

    /// Invariant (ii): `effective_epg_id = custom_epg_id ?: matched_station_id
    /// ?: derived_fallback(portal_id, channel_id)`.
    pub fn effective_epg_id(&self) -> String {
        self.custom_epg_id
            .clone()
            .or_else(|| self.matched_station_id.clone())
            .unwrap_or_else(|| derived_fallback_epg_id(&self.portal_id, &self.channel_id))
    }

    pub fn available_macs_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.available_macs).unwrap_or_default()
    }

    pub fn alternate_ids_vec(&self) -> Vec<String> {
        serde_json::from_str(&self.alternate_ids).unwrap_or_default()
    }
}

/// Deterministic fallback EPG id used when no custom id and no match exist.
pub fn derived_fallback_epg_id(portal_id: &str, channel_id: &str) -> String {
    format!("{portal_id}.{channel_id}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample() -> Model {
        Model {
            portal_id: "p1".into(),
            channel_id: "c1".into(),
            name: "Raw Name".into(),
            number: None,
            genre: None,
            genre_id: None,
            logo: None,
            cmd: None,
            auto_name: Some("Clean Name".into()),
            display_name: None,
            tag_resolution: None,
            tag_video_codec: None,
            tag_country: None,
            tag_event_tags: None,
            tag_misc_tags: None,
            is_header: false,
            is_event: false,
            is_raw: false,
            custom_name: None,
            custom_number: None,
            custom_genre: None,
            custom_epg_id: None,
            enabled: true,
            matched_name: None,
            matched_source: None,
            matched_station_id: None,
            matched_call_sign: None,
            matched_logo: None,
            matched_score: None,
            available_macs: "[]".into(),
            alternate_ids: "[]".into(),
            channel_hash: "deadbeef".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn effective_display_name_prefers_custom_then_auto_then_raw() {
        let mut m = sample();
        assert_eq!(m.effective_display_name(), "Clean Name");
        m.custom_name = Some("Custom".into());
        assert_eq!(m.effective_display_name(), "Custom");
        m.auto_name = None;
        m.custom_name = None;
        assert_eq!(m.effective_display_name(), "Raw Name");
    }

    #[test]
    fn effective_epg_id_falls_back_to_derived() {
        let mut m = sample();
        assert_eq!(m.effective_epg_id(), "p1.c1");
        m.matched_station_id = Some("STATION.US".into());
        assert_eq!(m.effective_epg_id(), "STATION.US");
        m.custom_epg_id = Some("CUSTOM.ID".into());
        assert_eq!(m.effective_epg_id(), "CUSTOM.ID");
    }
}
