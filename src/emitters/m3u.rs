//! M3U Emitter (§4.G).

use std::collections::HashMap;
use std::fmt::Write as _;

use crate::entities::{channel, group};

/// Renders the full playlist for `channels` (already filtered/ordered by
/// [`super::eligible_channels`]). `base_url` is `scheme://host` with no
/// trailing slash — `PUBLIC_HOST` when configured, otherwise the request's
/// Host header, per §4.G.
pub fn render(channels: &[channel::Model], groups: &[group::Model], base_url: &str) -> String {
    let group_names: HashMap<(&str, &str), &str> = groups
        .iter()
        .map(|g| ((g.portal_id.as_str(), g.genre_id.as_str()), g.name.as_str()))
        .collect();

    let mut out = String::from("#EXTM3U\n");
    for channel in channels {
        let name = channel.effective_display_name();
        let epg_id = channel.effective_epg_id();
        let logo = channel.matched_logo.as_deref().or(channel.logo.as_deref()).unwrap_or("");
        let number = channel
            .custom_number
            .as_deref()
            .or(channel.number.as_deref())
            .unwrap_or("");
        let group_title = channel
            .genre_id
            .as_deref()
            .and_then(|genre_id| group_names.get(&(channel.portal_id.as_str(), genre_id)))
            .copied()
            .or(channel.genre.as_deref())
            .unwrap_or("");

        let _ = writeln!(
            out,
            "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" tvg-chno=\"{}\" group-title=\"{}\",{}",
            escape_attr(&epg_id),
            escape_attr(name),
            escape_attr(logo),
            escape_attr(number),
            escape_attr(group_title),
            name
        );
        let _ = writeln!(
            out,
            "{}/play/{}/{}",
            base_url.trim_end_matches('/'),
            channel.portal_id,
            channel.channel_id
        );
    }
    out
}

fn escape_attr(value: &str) -> String {
    value.replace('"', "'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_channel() -> channel::Model {
        channel::Model {
            portal_id: "p1".to_string(),
            channel_id: "c1".to_string(),
            name: "News Raw".to_string(),
            number: Some("101".to_string()),
            genre: Some("News".to_string()),
            genre_id: Some("5".to_string()),
            logo: Some("http://logo".to_string()),
            cmd: None,
            auto_name: Some("News".to_string()),
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
            custom_epg_id: Some("X".to_string()),
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

    #[test]
    fn renders_extinf_and_play_url() {
        let rendered = render(&[sample_channel()], &[], "http://host:8080");
        assert!(rendered.starts_with("#EXTM3U\n"));
        assert!(rendered.contains("tvg-id=\"X\""));
        assert!(rendered.contains("tvg-name=\"News\""));
        assert!(rendered.contains("group-title=\"News\""));
        assert!(rendered.contains("http://host:8080/play/p1/c1"));
    }

    #[test]
    fn repeated_emission_is_byte_identical() {
        let channels = vec![sample_channel()];
        assert_eq!(
            render(&channels, &[], "http://host"),
            render(&channels, &[], "http://host")
        );
    }
}
