//! XMLTV Emitter (§4.F).
//!
//! Distinct from [`crate::epg::xmltv`], which only *ingests* inbound XMLTV
//! feeds — this module *emits* one merged document joining the catalog's
//! effective EPG ids against the per-source programme DBs. Built as an
//! incremental `futures::Stream` of XML chunks rather than one materialized
//! `String`, so a several-hour EPG never has to sit fully in memory before
//! the first byte reaches the client.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Duration;
use futures::Stream;

use crate::database::repositories::EpgSourceRepository;
use crate::entities::channel;
use crate::epg::EpgSourceManager;
use crate::errors::EpgError;

/// One distinct channel id to emit, carrying just what the `<channel>`
/// element and programme lookup need.
#[derive(Debug, Clone)]
struct EmitChannel {
    epg_id: String,
    display_name: String,
    icon: Option<String>,
    lcn: Option<String>,
    epg_offset_minutes: i32,
}

/// Collapses `channels` (already filtered/ordered by [`super::eligible_channels`])
/// to one [`EmitChannel`] per distinct `effective_epg_id`, keeping the first
/// occurrence — consistent with the stable ordering the M3U emitter uses.
fn distinct_emit_channels(channels: &[channel::Model], portal_epg_offsets: &HashMap<String, i32>) -> Vec<EmitChannel> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for channel in channels {
        let epg_id = channel.effective_epg_id();
        if !seen.insert(epg_id.clone()) {
            continue;
        }
        out.push(EmitChannel {
            epg_id,
            display_name: channel.effective_display_name().to_string(),
            icon: channel.matched_logo.clone().or_else(|| channel.logo.clone()),
            lcn: channel.custom_number.clone().or_else(|| channel.number.clone()),
            epg_offset_minutes: portal_epg_offsets.get(&channel.portal_id).copied().unwrap_or(0),
        });
    }
    out
}

enum State {
    Header,
    Channels(std::vec::IntoIter<EmitChannel>, Vec<EmitChannel>),
    Programmes(std::vec::IntoIter<EmitChannel>, EpgSourceRepository, Arc<EpgSourceManager>),
    Footer,
    Done,
}

/// Builds the incremental chunk stream for `/xmltv`. `portal_epg_offsets`
/// maps `portal_id -> epg_offset` (minutes) for the time-shift in §4.F.
pub fn render_stream(
    channels: Vec<channel::Model>,
    portal_epg_offsets: HashMap<String, i32>,
    epg_repo: EpgSourceRepository,
    epg_manager: Arc<EpgSourceManager>,
) -> impl Stream<Item = Result<Bytes, EpgError>> {
    let emit_channels = distinct_emit_channels(&channels, &portal_epg_offsets);
    let state = State::Header;
    let channels_for_programmes = emit_channels.clone();

    futures::stream::unfold(
        (state, emit_channels, channels_for_programmes, epg_repo, epg_manager),
        move |(state, pending_channels, pending_programmes, epg_repo, epg_manager)| async move {
            match state {
                State::Header => {
                    let chunk = Bytes::from_static(b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<tv>\n");
                    let iter = pending_channels.clone().into_iter();
                    Some((
                        Ok(chunk),
                        (State::Channels(iter, pending_channels), Vec::new(), pending_programmes, epg_repo, epg_manager),
                    ))
                }
                State::Channels(mut iter, carry) => {
                    if let Some(emit) = iter.next() {
                        let chunk = render_channel_element(&emit);
                        Some((
                            Ok(Bytes::from(chunk)),
                            (State::Channels(iter, carry), Vec::new(), pending_programmes, epg_repo, epg_manager),
                        ))
                    } else {
                        let programme_iter = pending_programmes.clone().into_iter();
                        Some((
                            Ok(Bytes::new()),
                            (
                                State::Programmes(programme_iter, epg_repo.clone(), epg_manager.clone()),
                                Vec::new(),
                                pending_programmes,
                                epg_repo,
                                epg_manager,
                            ),
                        ))
                    }
                }
                State::Programmes(mut iter, repo, manager) => {
                    if let Some(emit) = iter.next() {
                        let chunk = match render_programme_elements(&emit, &repo, &manager).await {
                            Ok(chunk) => chunk,
                            Err(err) => {
                                return Some((
                                    Err(err),
                                    (State::Programmes(iter, repo, manager), Vec::new(), pending_programmes, epg_repo, epg_manager),
                                ))
                            }
                        };
                        Some((
                            Ok(Bytes::from(chunk)),
                            (State::Programmes(iter, repo, manager), Vec::new(), pending_programmes, epg_repo, epg_manager),
                        ))
                    } else {
                        Some((
                            Ok(Bytes::new()),
                            (State::Footer, Vec::new(), pending_programmes, epg_repo, epg_manager),
                        ))
                    }
                }
                State::Footer => Some((
                    Ok(Bytes::from_static(b"</tv>\n")),
                    (State::Done, Vec::new(), pending_programmes, epg_repo, epg_manager),
                )),
                State::Done => None,
            }
        },
    )
}

fn render_channel_element(emit: &EmitChannel) -> String {
    let mut out = format!(
        "  <channel id=\"{}\">\n    <display-name>{}</display-name>\n",
        escape_xml(&emit.epg_id),
        escape_xml(&emit.display_name)
    );
    if let Some(icon) = &emit.icon {
        out.push_str(&format!("    <icon src=\"{}\"/>\n", escape_xml(icon)));
    }
    if let Some(lcn) = &emit.lcn {
        out.push_str(&format!("    <lcn>{}</lcn>\n", escape_xml(lcn)));
    }
    out.push_str("  </channel>\n");
    out
}

/// Resolution order (§4.F): (i) exact `epg_channels` match on the effective
/// id; (ii) case-folded display-name-alias match; (iii) no programmes.
async fn render_programme_elements(
    emit: &EmitChannel,
    epg_repo: &EpgSourceRepository,
    epg_manager: &EpgSourceManager,
) -> Result<String, EpgError> {
    let matched = match epg_repo.find_by_channel_id(&emit.epg_id).await {
        Ok(Some(row)) => Some(row),
        Ok(None) => epg_repo.find_by_alias(&emit.epg_id).await.unwrap_or(None),
        Err(_) => None,
    };
    let Some(matched) = matched else {
        return Ok(String::new());
    };

    let store = epg_manager.store_handle(&matched.source_id).await?;
    let programmes = store.programmes_for_channel(&matched.channel_id).await?;
    let offset = Duration::minutes(emit.epg_offset_minutes as i64);

    let mut out = String::new();
    for programme in programmes {
        let start = programme.start_ts + offset;
        let stop = programme.stop_ts + offset;
        out.push_str(&format!(
            "  <programme channel=\"{}\" start=\"{}\" stop=\"{}\">\n",
            escape_xml(&emit.epg_id),
            format_xmltv_time(start),
            format_xmltv_time(stop)
        ));
        out.push_str(&format!("    <title>{}</title>\n", escape_xml(&programme.title)));
        if let Some(sub_title) = &programme.sub_title {
            out.push_str(&format!("    <sub-title>{}</sub-title>\n", escape_xml(sub_title)));
        }
        if let Some(description) = &programme.description {
            out.push_str(&format!("    <desc>{}</desc>\n", escape_xml(description)));
        }
        for category in serde_json::from_str::<Vec<String>>(&programme.categories).unwrap_or_default() {
            out.push_str(&format!("    <category>{}</category>\n", escape_xml(&category)));
        }
        out.push_str("  </programme>\n");
    }
    Ok(out)
}

fn format_xmltv_time(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y%m%d%H%M%S +0000").to_string()
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn channel_element_includes_icon_and_lcn() {
        let emit = EmitChannel {
            epg_id: "X".to_string(),
            display_name: "BBC One".to_string(),
            icon: Some("http://logo".to_string()),
            lcn: Some("101".to_string()),
            epg_offset_minutes: 0,
        };
        let rendered = render_channel_element(&emit);
        assert!(rendered.contains("<channel id=\"X\">"));
        assert!(rendered.contains("<display-name>BBC One</display-name>"));
        assert!(rendered.contains("<icon src=\"http://logo\"/>"));
        assert!(rendered.contains("<lcn>101</lcn>"));
    }

    #[test]
    fn escapes_reserved_xml_characters() {
        assert_eq!(escape_xml("A & B < C"), "A &amp; B &lt; C");
    }

    #[tokio::test]
    async fn stream_starts_with_header_and_ends_with_footer() {
        let repo_db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        sea_orm_migration::MigratorTrait::up(&crate::database::migrations::Migrator, &repo_db, None)
            .await
            .unwrap();
        let repo = EpgSourceRepository::new(std::sync::Arc::new(repo_db));
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(EpgSourceManager::new(repo.clone(), dir.path().to_path_buf()));

        let stream = render_stream(Vec::new(), HashMap::new(), repo, manager);
        let chunks: Vec<_> = stream.collect().await;
        let body: Vec<u8> = chunks
            .into_iter()
            .filter_map(|c| c.ok())
            .flat_map(|b| b.to_vec())
            .collect();
        let text = String::from_utf8(body).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.trim_end().ends_with("</tv>"));
    }
}
