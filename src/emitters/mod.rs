//! M3U (G) and XMLTV (F) emitters.
//!
//! Both emitters consume the same "eligible channel" set — enabled rows
//! whose group (if any) is still active — so [`eligible_channels`] is
//! shared rather than duplicated, the way the teacher keeps one filtering
//! pass ahead of its playlist/EPG generators instead of re-deriving it
//! twice.

pub mod m3u;
pub mod xmltv;

use std::collections::HashSet;

use crate::entities::{channel, group};

/// Channels eligible for playlist/XMLTV emission: `enabled=1` and, when the
/// channel has a `genre_id`, the matching `groups.active=1` (§8 scenario
/// S6 — toggling a group off hides its channels from both emitters without
/// any re-import).
pub fn eligible_channels(channels: Vec<channel::Model>, groups: &[group::Model]) -> Vec<channel::Model> {
    let inactive: HashSet<(String, String)> = groups
        .iter()
        .filter(|g| !g.active)
        .map(|g| (g.portal_id.clone(), g.genre_id.clone()))
        .collect();

    let mut eligible: Vec<channel::Model> = channels
        .into_iter()
        .filter(|c| c.enabled)
        .filter(|c| match &c.genre_id {
            Some(genre_id) => !inactive.contains(&(c.portal_id.clone(), genre_id.clone())),
            None => true,
        })
        .collect();

    // §4.G / §8 item 7: stable order by effective_display_name, tie-broken
    // by (portal_id, channel_id) for byte-identical repeat emissions.
    eligible.sort_by(|a, b| {
        a.effective_display_name()
            .cmp(b.effective_display_name())
            .then_with(|| a.portal_id.cmp(&b.portal_id))
            .then_with(|| a.channel_id.cmp(&b.channel_id))
    });

    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn channel(portal_id: &str, channel_id: &str, name: &str, genre_id: Option<&str>) -> channel::Model {
        channel::Model {
            portal_id: portal_id.to_string(),
            channel_id: channel_id.to_string(),
            name: name.to_string(),
            number: None,
            genre: None,
            genre_id: genre_id.map(str::to_string),
            logo: None,
            cmd: None,
            auto_name: None,
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
            available_macs: "[]".to_string(),
            alternate_ids: "[]".to_string(),
            channel_hash: "h".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn group(portal_id: &str, genre_id: &str, active: bool) -> group::Model {
        group::Model {
            portal_id: portal_id.to_string(),
            genre_id: genre_id.to_string(),
            name: genre_id.to_string(),
            channel_count: 1,
            active,
        }
    }

    #[test]
    fn disabled_channels_are_excluded() {
        let mut c = channel("p1", "c1", "News", None);
        c.enabled = false;
        let result = eligible_channels(vec![c], &[]);
        assert!(result.is_empty());
    }

    #[test]
    fn channels_in_inactive_group_are_excluded_without_deletion() {
        let c = channel("p1", "c1", "News", Some("g1"));
        let groups = vec![group("p1", "g1", false)];
        assert!(eligible_channels(vec![c], &groups).is_empty());
    }

    #[test]
    fn stable_sort_by_name_then_portal_then_channel() {
        let a = channel("p1", "c2", "Zeta", None);
        let b = channel("p1", "c1", "Alpha", None);
        let result = eligible_channels(vec![a, b], &[]);
        assert_eq!(
            result.iter().map(|c| c.channel_id.clone()).collect::<Vec<_>>(),
            vec!["c1".to_string(), "c2".to_string()]
        );
    }
}
